//! Shared command setup: configuration, classifier, and transaction loading

use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{load_config, parse_transactions_file, CadenceConfig, Classifier, Transaction};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Everything a command needs besides its own arguments
pub struct Session {
    pub config: CadenceConfig,
    pub classifier: Classifier,
    /// Print JSON instead of tables
    pub json: bool,
}

pub fn open_session(config_path: Option<&Path>, json: bool) -> Result<Session> {
    let config = load_config(config_path).context("Failed to load configuration")?;
    let classifier = config
        .classifier()
        .context("Invalid rule in configuration")?;
    debug!("Loaded {} rules", classifier.rules().len());

    Ok(Session {
        config,
        classifier,
        json,
    })
}

/// Read an export; rejected records are reported and skipped
pub fn load_transactions(session: &Session, file: &Path) -> Result<Vec<Transaction>> {
    let report = parse_transactions_file(file, &session.config.ingest)
        .with_context(|| format!("Failed to read transactions from {}", file.display()))?;

    for error in &report.errors {
        warn!(
            "Skipped record #{}{}: {}",
            error.index,
            error
                .id
                .as_ref()
                .map(|id| format!(" ({})", id))
                .unwrap_or_default(),
            error.reason
        );
    }

    Ok(report.transactions)
}

pub fn parse_date_arg(value: &str, flag: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid {} '{}' (use YYYY-MM-DD)", flag, value))
}
