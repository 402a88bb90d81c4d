//! Test utilities for cadence-core
//!
//! Builders for transactions and rules so tests can describe only the fields
//! they care about.

use chrono::{Duration, NaiveDate};

use crate::models::{Classification, RuleConditions, RuleDefinition, Transaction};

/// Parse a `YYYY-MM-DD` literal, panicking on typos in test data
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|_| panic!("bad test date {}", s))
}

/// Fluent builder for [`Transaction`]
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    tx: Transaction,
}

impl TransactionBuilder {
    /// Amount in canonical form; classification follows the sign
    pub fn new(id: impl Into<String>, date: NaiveDate, amount: f64) -> Self {
        let id = id.into();
        Self {
            tx: Transaction {
                description: id.clone(),
                id,
                date,
                amount,
                currency: "EUR".to_string(),
                merchant: None,
                account: None,
                classification: if amount < 0.0 {
                    Classification::Expense
                } else {
                    Classification::Income
                },
                category: None,
                tags: Vec::new(),
                excluded: false,
            },
        }
    }

    pub fn merchant(mut self, merchant: &str) -> Self {
        self.tx.merchant = Some(merchant.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.tx.description = description.to_string();
        self
    }

    pub fn account(mut self, account: &str) -> Self {
        self.tx.account = Some(account.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.tx.category = Some(category.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tx.tags.push(tag.to_string());
        self
    }

    pub fn transfer(mut self) -> Self {
        self.tx.classification = Classification::Transfer;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.tx.excluded = true;
        self
    }

    pub fn build(self) -> Transaction {
        self.tx
    }
}

/// Expense at `merchant` on `date`
pub fn expense(id: &str, merchant: &str, amount: f64, date: NaiveDate) -> Transaction {
    TransactionBuilder::new(id, date, -amount.abs())
        .merchant(merchant)
        .build()
}

/// Income on `date`
pub fn income(id: &str, description: &str, amount: f64, date: NaiveDate) -> Transaction {
    TransactionBuilder::new(id, date, amount.abs())
        .description(description)
        .build()
}

/// Charges of `amount` at `merchant`, one per entry in `gaps` after `start`
/// (so `gaps.len() + 1` transactions)
pub fn charge_series(
    merchant: &str,
    amount: f64,
    start: NaiveDate,
    gaps: &[i64],
) -> Vec<Transaction> {
    let mut dates = vec![start];
    for gap in gaps {
        let last = dates[dates.len() - 1];
        dates.push(last + Duration::days(*gap));
    }
    dates
        .into_iter()
        .enumerate()
        .map(|(i, d)| expense(&format!("{}-{}", merchant, i), merchant, amount, d))
        .collect()
}

/// Rule with only merchant patterns set
pub fn merchant_rule(id: &str, pattern: &str, category: &str, priority: i64) -> RuleDefinition {
    RuleDefinition {
        id: id.to_string(),
        name: id.to_string(),
        category: category.to_string(),
        priority,
        conditions: RuleConditions {
            merchant_patterns: vec![pattern.to_string()],
            ..Default::default()
        },
    }
}
