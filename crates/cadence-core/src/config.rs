//! Configuration loading
//!
//! Layout:
//! - Default config embedded in the binary
//! - Override at `~/.local/share/cadence/config.toml` (or `--config <path>`)
//!
//! Keys missing from the override keep their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::cashflow::CashFlowConfig;
use crate::classify::Classifier;
use crate::error::{Error, Result};
use crate::ingest::{IngestOptions, SignConvention};
use crate::models::RuleDefinition;
use crate::recurrence::{RecurrenceConfig, MIN_CONFIDENCE, MIN_OCCURRENCES};

/// Default configuration embedded at compile time
const DEFAULT_CONFIG: &str = include_str!("../../../config/cadence.toml");

/// Fully resolved configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CadenceConfig {
    pub ingest: IngestOptions,
    pub recurrence: RecurrenceConfig,
    pub cashflow: CashFlowConfig,
    pub rules: Vec<RuleDefinition>,
}

impl CadenceConfig {
    /// Classifier loaded with the configured rules
    pub fn classifier(&self) -> Result<Classifier> {
        Classifier::from_definitions(self.rules.clone())
    }
}

/// Get the default override config path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("cadence").join("config.toml"))
}

/// Load configuration: explicit path, else the user override if present,
/// else the embedded default
pub fn load_config(path: Option<&Path>) -> Result<CadenceConfig> {
    let content = match path {
        Some(path) => read_config(path)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => read_config(&path)?,
            None => DEFAULT_CONFIG.to_string(),
        },
    };
    parse_config(&content)
}

fn read_config(path: &Path) -> Result<String> {
    debug!("Loading config from {}", path.display());
    fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    ingest: Option<RawIngest>,
    recurrence: Option<RawRecurrence>,
    cashflow: Option<RawCashFlow>,
    #[serde(default)]
    rules: Vec<RuleDefinition>,
}

#[derive(Debug, Deserialize)]
struct RawIngest {
    sign_convention: Option<SignConvention>,
}

#[derive(Debug, Deserialize)]
struct RawRecurrence {
    min_occurrences: Option<usize>,
    weekly_range: Option<(f64, f64)>,
    monthly_range: Option<(f64, f64)>,
    yearly_range: Option<(f64, f64)>,
    interval_tolerance: Option<f64>,
    min_confidence: Option<f64>,
    default_lookback_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawCashFlow {
    transfer_tolerance: Option<f64>,
    daily_net_threshold: Option<f64>,
    large_transaction_multiplier: Option<f64>,
    weekend_multiplier: Option<f64>,
}

/// Parse config from TOML content, applying it over the defaults
pub fn parse_config(content: &str) -> Result<CadenceConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = CadenceConfig::default();

    if let Some(ingest) = raw.ingest {
        if let Some(convention) = ingest.sign_convention {
            config.ingest.sign_convention = convention;
        }
    }

    if let Some(r) = raw.recurrence {
        let c = &mut config.recurrence;
        if let Some(v) = r.min_occurrences {
            c.min_occurrences = v;
        }
        if let Some(v) = r.weekly_range {
            c.weekly_range = v;
        }
        if let Some(v) = r.monthly_range {
            c.monthly_range = v;
        }
        if let Some(v) = r.yearly_range {
            c.yearly_range = v;
        }
        if let Some(v) = r.interval_tolerance {
            c.interval_tolerance = v;
        }
        if let Some(v) = r.min_confidence {
            c.min_confidence = v;
        }
        if let Some(v) = r.default_lookback_days {
            c.default_lookback_days = v;
        }
    }

    if let Some(cf) = raw.cashflow {
        let c = &mut config.cashflow;
        if let Some(v) = cf.transfer_tolerance {
            c.transfer_tolerance = v;
        }
        if let Some(v) = cf.daily_net_threshold {
            c.daily_net_threshold = v;
        }
        if let Some(v) = cf.large_transaction_multiplier {
            c.large_transaction_multiplier = v;
        }
        if let Some(v) = cf.weekend_multiplier {
            c.weekend_multiplier = v;
        }
    }

    config.rules = raw.rules;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &CadenceConfig) -> Result<()> {
    let r = &config.recurrence;
    if r.min_occurrences < MIN_OCCURRENCES {
        return Err(Error::Config(format!(
            "recurrence.min_occurrences must be at least {}, got {}",
            MIN_OCCURRENCES, r.min_occurrences
        )));
    }
    for (name, (low, high)) in [
        ("weekly_range", r.weekly_range),
        ("monthly_range", r.monthly_range),
        ("yearly_range", r.yearly_range),
    ] {
        if !(low.is_finite() && high.is_finite() && 0.0 < low && low <= high) {
            return Err(Error::Config(format!(
                "recurrence.{} must be an increasing positive range, got [{}, {}]",
                name, low, high
            )));
        }
    }
    if !(0.0..1.0).contains(&r.interval_tolerance) {
        return Err(Error::Config(format!(
            "recurrence.interval_tolerance must be in [0, 1), got {}",
            r.interval_tolerance
        )));
    }
    if !(MIN_CONFIDENCE..1.0).contains(&r.min_confidence) {
        return Err(Error::Config(format!(
            "recurrence.min_confidence must be in [{}, 1), got {}",
            MIN_CONFIDENCE, r.min_confidence
        )));
    }
    if r.default_lookback_days <= 0 {
        return Err(Error::Config(format!(
            "recurrence.default_lookback_days must be positive, got {}",
            r.default_lookback_days
        )));
    }

    let c = &config.cashflow;
    for (name, value) in [
        ("transfer_tolerance", c.transfer_tolerance),
        ("daily_net_threshold", c.daily_net_threshold),
        ("large_transaction_multiplier", c.large_transaction_multiplier),
        ("weekend_multiplier", c.weekend_multiplier),
    ] {
        if !(value.is_finite() && value > 0.0) {
            return Err(Error::Config(format!(
                "cashflow.{} must be a positive number, got {}",
                name, value
            )));
        }
    }

    Ok(())
}
