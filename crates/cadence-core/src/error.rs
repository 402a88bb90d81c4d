//! Error types for Cadence

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid pattern in rule '{rule_id}': {source}")]
    Regex {
        rule_id: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
