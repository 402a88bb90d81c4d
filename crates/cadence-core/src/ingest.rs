//! Ingestion of ledger exports
//!
//! The ledger hands over a JSON array of transaction records. Each record is
//! validated on its own; bad records are reported and skipped so one
//! malformed row never sinks the batch.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{Classification, Transaction};

/// Which sign the source uses for money going out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    /// Expenses are negative (canonical form)
    #[default]
    NegativeIsExpense,
    /// Expenses are positive; amounts are negated on the way in
    PositiveIsExpense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestOptions {
    pub sign_convention: SignConvention,
}

/// A record that could not be ingested
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemError {
    /// Position in the input array
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub transactions: Vec<Transaction>,
    pub errors: Vec<ItemError>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse a JSON array of transaction records
pub fn parse_transactions(json: &str, options: &IngestOptions) -> Result<IngestReport> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(records) = value else {
        return Err(Error::InvalidData(
            "expected a JSON array of transactions".into(),
        ));
    };

    let mut report = IngestReport::default();
    for (index, record) in records.iter().enumerate() {
        match parse_record(record, options) {
            Ok(tx) => report.transactions.push(tx),
            Err(reason) => {
                let id = record.get("id").and_then(id_string);
                warn!("Skipping transaction #{} ({:?}): {}", index, id, reason);
                report.errors.push(ItemError { index, id, reason });
            }
        }
    }

    info!(
        "Ingested {} transactions ({} rejected)",
        report.transactions.len(),
        report.errors.len()
    );
    Ok(report)
}

/// Read and parse a transaction export from disk
pub fn parse_transactions_file(path: &Path, options: &IngestOptions) -> Result<IngestReport> {
    let json = std::fs::read_to_string(path)?;
    parse_transactions(&json, options)
}

fn parse_record(
    record: &Value,
    options: &IngestOptions,
) -> std::result::Result<Transaction, String> {
    let obj = record
        .as_object()
        .ok_or_else(|| "record is not an object".to_string())?;

    let id = obj
        .get("id")
        .and_then(id_string)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| "missing id".to_string())?;

    let date = match obj.get("date") {
        Some(Value::String(s)) => parse_date(s)?,
        Some(other) => return Err(format!("invalid date: {}", other)),
        None => return Err("missing date".to_string()),
    };

    let mut amount = match obj.get("amount") {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| format!("invalid amount: {}", n))?,
        Some(Value::String(s)) => parse_amount(s)?,
        Some(other) => return Err(format!("invalid amount: {}", other)),
        None => return Err("missing amount".to_string()),
    };
    if !amount.is_finite() {
        return Err(format!("amount is not finite: {}", amount));
    }
    if options.sign_convention == SignConvention::PositiveIsExpense {
        amount = -amount;
    }

    let classification = match optional_str(obj, "classification")? {
        Some(s) => s.parse::<Classification>()?,
        None if amount < 0.0 => Classification::Expense,
        None => Classification::Income,
    };
    if !classification.agrees_with(amount) {
        return Err(format!(
            "classification '{}' disagrees with amount {:.2}",
            classification, amount
        ));
    }

    let description = optional_str(obj, "description")?
        .or(optional_str(obj, "name")?)
        .unwrap_or_default();

    let tags = match obj.get("tags") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|t| {
                t.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("invalid tag: {}", t))
            })
            .collect::<std::result::Result<_, _>>()?,
        Some(other) => return Err(format!("invalid tags: {}", other)),
    };

    let excluded = match obj.get("excluded") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => return Err(format!("invalid excluded flag: {}", other)),
    };

    Ok(Transaction {
        id,
        date,
        amount,
        currency: optional_str(obj, "currency")?.unwrap_or_default(),
        merchant: optional_str(obj, "merchant")?.filter(|m| !m.trim().is_empty()),
        description,
        account: optional_str(obj, "account")?,
        classification,
        category: optional_str(obj, "category")?.filter(|c| !c.trim().is_empty()),
        tags,
        excluded,
    })
}

/// Ids may arrive as strings or numbers
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_str(
    obj: &Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<String>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("invalid {}: {}", key, other)),
    }
}

/// `YYYY-MM-DD`, ignoring any trailing time component
fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    let s = s.trim();
    let day = s.split(['T', ' ']).next().unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| format!("invalid date: {}", s))
}

/// Numeric string, tolerating currency symbols and thousands separators
fn parse_amount(s: &str) -> std::result::Result<f64, String> {
    let cleaned: String = s
        .trim()
        .replace(['$', '€', '£', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .map_err(|_| format!("invalid amount: {}", s))
}
