//! Rule command implementations

use anyhow::{Context, Result};
use cadence_core::{Classification, RuleConditions, Transaction};

use super::{parse_date_arg, truncate, Session};

pub fn cmd_rules_list(session: &Session) -> Result<()> {
    let rules = session.classifier.rules().rules();

    if session.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rules).context("Failed to serialize rules")?
        );
        return Ok(());
    }

    if rules.is_empty() {
        println!("No rules configured. Add [[rules]] entries to your config file:");
        if let Some(path) = cadence_core::default_config_path() {
            println!("  {}", path.display());
        }
        return Ok(());
    }

    println!();
    println!("📋 Categorization Rules (evaluation order)");
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {:>4} │ {:16} │ {:22} │ {}",
        "Pri", "ID", "Category", "Conditions"
    );
    println!("   ─────┼──────────────────┼────────────────────────┼─────────────────");

    for rule in rules {
        println!(
            "   {:>4} │ {:16} │ {:22} │ {}",
            rule.priority,
            truncate(&rule.id, 16),
            truncate(&rule.category, 22),
            describe_conditions(&rule.conditions)
        );
    }

    Ok(())
}

pub fn cmd_rules_test(
    session: &Session,
    merchant: Option<&str>,
    description: &str,
    amount: f64,
    date: Option<&str>,
    recurring: bool,
) -> Result<()> {
    let date = match date {
        Some(s) => parse_date_arg(s, "--date")?,
        None => chrono::Local::now().date_naive(),
    };
    let sample = Transaction {
        id: "sample".to_string(),
        date,
        amount,
        currency: String::new(),
        merchant: merchant.map(str::to_string),
        description: description.to_string(),
        account: None,
        classification: if amount < 0.0 {
            Classification::Expense
        } else {
            Classification::Income
        },
        category: None,
        tags: if recurring {
            vec!["recurring".to_string()]
        } else {
            Vec::new()
        },
        excluded: false,
    };

    let matching = session.classifier.matching_rules(&sample);
    let result = session.classifier.classify(&sample);

    if session.json {
        let output = serde_json::json!({
            "matchingRules": matching,
            "result": result,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!(
        "🔍 \"{}\" {:.2} on {}",
        sample.merchant_or_name(),
        amount,
        date
    );
    println!("   ─────────────────────────────────────────────────────────────");

    if matching.is_empty() {
        println!("   No rules match");
    }
    for (i, rule) in matching.iter().enumerate() {
        println!(
            "   {} Rule '{}' (priority {}) -> {}",
            if i == 0 { "✅" } else { "  " },
            rule.id,
            rule.priority,
            rule.category
        );
    }

    match result.category {
        Some(category) => println!("   Category: {}", category),
        None => println!("   Category: none"),
    }

    Ok(())
}

/// One-line summary of a rule's conditions
pub fn describe_conditions(conditions: &RuleConditions) -> String {
    let mut parts = Vec::new();
    if !conditions.merchant_patterns.is_empty() {
        parts.push(format!("merchant ~ {}", conditions.merchant_patterns.join("|")));
    }
    if !conditions.description_patterns.is_empty() {
        parts.push(format!(
            "description ~ {}",
            conditions.description_patterns.join("|")
        ));
    }
    if let Some(range) = &conditions.amount_range {
        let bound = |b: Option<f64>| b.map(|v| format!("{}", v)).unwrap_or_default();
        parts.push(format!("amount {}..{}", bound(range.min), bound(range.max)));
    }
    if let Some(days) = &conditions.day_of_week {
        parts.push(format!("weekday {:?}", days));
    }
    if let Some(days) = &conditions.day_of_month {
        parts.push(format!("day {:?}", days));
    }
    if let Some(recurring) = conditions.is_recurring {
        parts.push(if recurring { "recurring" } else { "one-off" }.to_string());
    }

    if parts.is_empty() {
        "(always)".to_string()
    } else {
        parts.join(", ")
    }
}
