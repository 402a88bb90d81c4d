//! Subscription command implementation

use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{total_monthly_cost, LookbackWindow, RecurrenceDetector};

use super::{load_transactions, parse_date_arg, truncate, Session};

pub fn cmd_subscriptions(
    session: &Session,
    file: &Path,
    lookback_days: Option<i64>,
    as_of: Option<&str>,
) -> Result<()> {
    let transactions = load_transactions(session, file)?;

    let window = LookbackWindow {
        days: lookback_days.unwrap_or(session.config.recurrence.default_lookback_days),
        as_of: as_of.map(|s| parse_date_arg(s, "--as-of")).transpose()?,
    };
    let subscriptions = RecurrenceDetector::with_config(session.config.recurrence.clone())
        .detect_subscriptions(&transactions, window)?;

    if session.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&subscriptions)
                .context("Failed to serialize subscriptions")?
        );
        return Ok(());
    }

    if subscriptions.is_empty() {
        println!(
            "No recurring payments found in the last {} days.",
            window.days
        );
        return Ok(());
    }

    println!();
    println!("📋 Detected Subscriptions");
    println!("   ─────────────────────────────────────────────────────────────────────");

    for sub in &subscriptions {
        println!(
            "   {:22} │ {:>8.2}/{:<7} │ last {} │ next {} │ {:>3.0}% ({} charges)",
            truncate(&sub.merchant, 22),
            sub.amount,
            sub.frequency.as_str(),
            sub.last_date,
            sub.next_expected_date,
            sub.confidence * 100.0,
            sub.transaction_count
        );
    }

    println!();
    println!(
        "   💸 {} subscriptions, about {:.2} per month",
        subscriptions.len(),
        total_monthly_cost(&subscriptions)
    );

    Ok(())
}
