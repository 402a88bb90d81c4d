//! Categorize command implementation

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::models::UNCATEGORIZED;
use cadence_core::{CategorySource, LookbackWindow, RecurrenceDetector};

use super::{load_transactions, truncate, Session};

pub fn cmd_categorize(session: &Session, file: &Path, overwrite: bool) -> Result<()> {
    let transactions = load_transactions(session, file)?;

    // Recurring merchants feed `isRecurring` rule conditions
    let detector = RecurrenceDetector::with_config(session.config.recurrence.clone());
    let subscriptions = detector.detect_subscriptions(
        &transactions,
        LookbackWindow::days(session.config.recurrence.default_lookback_days),
    )?;
    session.classifier.mark_recurring(&subscriptions);

    if session.json {
        let categorized = session.classifier.apply(&transactions, overwrite);
        println!(
            "{}",
            serde_json::to_string_pretty(&categorized).context("Failed to serialize results")?
        );
        return Ok(());
    }

    if transactions.is_empty() {
        println!("No transactions in {}", file.display());
        return Ok(());
    }

    let results = session.classifier.categorize_all(&transactions);
    let mut totals: BTreeMap<String, (usize, f64)> = BTreeMap::new();

    println!();
    println!("🏷️  Categorized Transactions");
    println!("   ─────────────────────────────────────────────────────────────────────");

    for (tx, result) in transactions.iter().zip(results) {
        let (category, source) = match (&tx.category, overwrite) {
            (Some(existing), false) => (existing.clone(), "ledger"),
            _ => (
                result
                    .category
                    .clone()
                    .unwrap_or_else(|| UNCATEGORIZED.to_string()),
                match result.source {
                    Some(CategorySource::Rule) => "rule",
                    Some(CategorySource::GroceryHeuristic) => "grocery",
                    Some(CategorySource::SubscriptionHeuristic) => "subscription",
                    None => "-",
                },
            ),
        };

        println!(
            "   {} │ {:>10.2} │ {:24} │ {:22} │ {}",
            tx.date,
            tx.amount,
            truncate(tx.merchant_or_name(), 24),
            truncate(&category, 22),
            source
        );

        let entry = totals.entry(category).or_default();
        entry.0 += 1;
        entry.1 += tx.amount;
    }

    println!();
    println!("   By category:");
    for (category, (count, amount)) in &totals {
        println!("   {:24} {:>4} txns {:>12.2}", category, count, amount);
    }

    Ok(())
}
