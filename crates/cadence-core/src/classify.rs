//! Transaction classifier
//!
//! Assigns a planning category to a transaction.
//! Priority: user rules (by priority, then registration order) → grocery
//! heuristic → subscription heuristic → no category.
//!
//! The classifier never guesses beyond the two fixed heuristics; callers that
//! want a catch-all bucket apply it themselves.

use std::collections::HashSet;
use std::sync::RwLock;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::models::{
    RuleDefinition, Subscription, Transaction, FALLBACK_CATEGORIES, REQUIRED_PURCHASES,
    SUBSCRIPTIONS,
};
use crate::rules::{merchant_key, MatchContext, RuleSet};

/// Merchant/description keywords that mark a grocery or market purchase
const GROCERY_KEYWORDS: &[&str] = &[
    "albert heijn",
    "jumbo",
    "lidl",
    "aldi",
    "grocery",
    "groceries",
    "supermarket",
    "market",
    "whole foods",
    "trader joe",
    "safeway",
    "kroger",
    "costco",
];

/// Absolute amounts eligible for the grocery heuristic (inclusive)
const GROCERY_AMOUNT_RANGE: (f64, f64) = (10.0, 300.0);

/// Keywords that mark a subscription charge regardless of amount
const SUBSCRIPTION_KEYWORDS: &[&str] = &["subscription", "monthly"];

/// Common subscription prices are N.99 for N in this range (inclusive)
const PRICE_POINT_WHOLE_UNITS: (u32, u32) = (4, 29);

/// How a category was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    Rule,
    GroceryHeuristic,
    SubscriptionHeuristic,
}

/// Result of classifying one transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Categorization {
    pub transaction_id: String,
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CategorySource>,
    /// Id of the rule that fired, when `source` is `Rule`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

/// Rule-driven classifier with fixed fallback heuristics
#[derive(Debug, Default)]
pub struct Classifier {
    rules: RuleSet,
    recurring_merchants: RwLock<HashSet<String>>,
}

impl Classifier {
    /// Create a classifier with no rules (only the fallback heuristics apply)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: RuleSet) -> Self {
        Self {
            rules,
            recurring_merchants: RwLock::new(HashSet::new()),
        }
    }

    pub fn from_definitions(definitions: Vec<RuleDefinition>) -> Result<Self> {
        Ok(Self::with_rules(RuleSet::from_definitions(definitions)?))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn add_rule(&self, definition: RuleDefinition) -> Result<()> {
        self.rules.add_rule(definition)
    }

    pub fn remove_rule(&self, id: &str) -> Result<RuleDefinition> {
        self.rules.remove_rule(id)
    }

    /// Remember merchants of detected subscriptions so `isRecurring` rule
    /// conditions can see them. Replaces any previously marked set.
    pub fn mark_recurring(&self, subscriptions: &[Subscription]) {
        let merchants: HashSet<String> = subscriptions
            .iter()
            .map(|s| merchant_key(&s.merchant))
            .collect();
        debug!("Marked {} recurring merchants", merchants.len());
        *self
            .recurring_merchants
            .write()
            .unwrap_or_else(|e| e.into_inner()) = merchants;
    }

    /// Every category this classifier can return
    pub fn categories(&self) -> Vec<String> {
        let mut categories = self.rules.categories();
        for fallback in FALLBACK_CATEGORIES {
            if !categories.iter().any(|c| c == fallback) {
                categories.push(fallback.to_string());
            }
        }
        categories
    }

    /// Category for a transaction, or None when nothing applies
    pub fn categorize(&self, tx: &Transaction) -> Option<String> {
        self.classify(tx).category
    }

    /// Classify a transaction, reporting how the category was chosen
    pub fn classify(&self, tx: &Transaction) -> Categorization {
        let recurring = self
            .recurring_merchants
            .read()
            .unwrap_or_else(|e| e.into_inner());
        let ctx = MatchContext {
            recurring_merchants: Some(&*recurring),
        };

        // 1. User rules, first match wins
        let rules = self.rules.snapshot();
        if let Some(rule) = rules.iter().find(|r| r.matches(tx, &ctx)) {
            debug!(
                "Rule '{}' matched '{}': {}",
                rule.id(),
                tx.merchant_or_name(),
                rule.category()
            );
            return Categorization {
                transaction_id: tx.id.clone(),
                category: Some(rule.category().to_string()),
                source: Some(CategorySource::Rule),
                rule_id: Some(rule.id().to_string()),
            };
        }

        // 2. Fixed heuristics
        let source = if looks_like_groceries(tx) {
            Some(CategorySource::GroceryHeuristic)
        } else if looks_like_subscription(tx) {
            Some(CategorySource::SubscriptionHeuristic)
        } else {
            None
        };

        let category = source.map(|s| match s {
            CategorySource::GroceryHeuristic => REQUIRED_PURCHASES.to_string(),
            _ => SUBSCRIPTIONS.to_string(),
        });
        if let Some(ref c) = category {
            debug!("Heuristic matched '{}': {}", tx.merchant_or_name(), c);
        }

        Categorization {
            transaction_id: tx.id.clone(),
            category,
            source,
            rule_id: None,
        }
    }

    /// Every rule that matches, in evaluation order
    pub fn matching_rules(&self, tx: &Transaction) -> Vec<RuleDefinition> {
        let recurring = self
            .recurring_merchants
            .read()
            .unwrap_or_else(|e| e.into_inner());
        let ctx = MatchContext {
            recurring_merchants: Some(&*recurring),
        };

        self.rules
            .snapshot()
            .iter()
            .filter(|r| r.matches(tx, &ctx))
            .map(|r| r.definition().clone())
            .collect()
    }

    /// Classify a batch, preserving input order
    pub fn categorize_all(&self, transactions: &[Transaction]) -> Vec<Categorization> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            transactions.par_iter().map(|tx| self.classify(tx)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            transactions.iter().map(|tx| self.classify(tx)).collect()
        }
    }

    /// Copy of the batch with categories assigned. Existing categories are
    /// kept unless `overwrite` is set; a None result never clears one.
    pub fn apply(&self, transactions: &[Transaction], overwrite: bool) -> Vec<Transaction> {
        let results = self.categorize_all(transactions);
        transactions
            .iter()
            .zip(results)
            .map(|(tx, result)| {
                let mut tx = tx.clone();
                if overwrite || tx.category.is_none() {
                    if let Some(category) = result.category {
                        tx.category = Some(category);
                    }
                }
                tx
            })
            .collect()
    }
}

fn looks_like_groceries(tx: &Transaction) -> bool {
    let amount = tx.amount.abs();
    if !(GROCERY_AMOUNT_RANGE.0..=GROCERY_AMOUNT_RANGE.1).contains(&amount) {
        return false;
    }
    let merchant = tx.merchant_or_name().to_lowercase();
    let description = tx.description.to_lowercase();
    GROCERY_KEYWORDS
        .iter()
        .any(|k| merchant.contains(k) || description.contains(k))
}

fn looks_like_subscription(tx: &Transaction) -> bool {
    if is_subscription_price_point(tx.amount.abs()) {
        return true;
    }
    let merchant = tx.merchant_or_name().to_lowercase();
    let description = tx.description.to_lowercase();
    SUBSCRIPTION_KEYWORDS
        .iter()
        .any(|k| merchant.contains(k) || description.contains(k))
}

/// True for amounts like 4.99, 9.99 ... 29.99 (within half a cent)
pub fn is_subscription_price_point(amount: f64) -> bool {
    let (low, high) = PRICE_POINT_WHOLE_UNITS;
    (low..=high).any(|n| (amount - (n as f64 + 0.99)).abs() < 0.005)
}
