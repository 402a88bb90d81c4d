//! Cash flow command implementation

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{CashFlowAggregator, FlowTotals, SummaryOptions};

use super::{load_transactions, parse_date_arg, truncate, Session};

/// Filtering and grouping flags for `cadence cashflow`
#[derive(Debug, Default)]
pub struct CashflowArgs {
    pub accounts: Vec<String>,
    pub include_transfers: bool,
    pub by_category: bool,
    pub by_account: bool,
    pub as_of: Option<String>,
}

pub fn cmd_cashflow(session: &Session, file: &Path, days: i64, args: CashflowArgs) -> Result<()> {
    let transactions = load_transactions(session, file)?;

    let options = SummaryOptions {
        accounts: args.accounts,
        exclude_transfers: !args.include_transfers,
        group_by_category: args.by_category,
        group_by_account: args.by_account,
        as_of: args
            .as_of
            .as_deref()
            .map(|s| parse_date_arg(s, "--as-of"))
            .transpose()?,
    };

    let summary = CashFlowAggregator::with_config(session.config.cashflow.clone())
        .with_classifier(&session.classifier)
        .summarize(&transactions, days, &options)?;

    if session.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
        return Ok(());
    }

    println!();
    match (summary.period.from, summary.period.to) {
        (Some(from), Some(to)) => println!(
            "📊 Cash Flow: {} to {} ({} days)",
            from, to, summary.period.days
        ),
        _ => println!("📊 Cash Flow: last {} days", summary.period.days),
    }
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Income:   {:>12.2}   ({:.2}/day)",
        summary.inflow, summary.avg_daily_inflow
    );
    println!(
        "   Spending: {:>12.2}   ({:.2}/day)",
        summary.outflow, summary.avg_daily_outflow
    );
    println!(
        "   Net:      {:>12.2}   ({:.2}/day)",
        summary.net_flow, summary.avg_daily_net
    );

    let counts = &summary.counts;
    println!(
        "   {} of {} transactions counted ({} transfer pair members, {} outside period)",
        counts.included, counts.total, counts.transfer_pair_members, counts.outside_period
    );

    if let Some(by_category) = &summary.by_category {
        print_breakdown("By category", by_category);
    }
    if let Some(by_account) = &summary.by_account {
        print_breakdown("By account", by_account);
    }

    if !summary.insights.is_empty() {
        println!();
        println!("   💡 Insights");
        for insight in &summary.insights {
            println!("   • {}", insight);
        }
    }

    Ok(())
}

fn print_breakdown(title: &str, buckets: &BTreeMap<String, FlowTotals>) {
    println!();
    println!("   {}:", title);
    println!(
        "   {:24} │ {:>10} │ {:>10} │ {:>10}",
        "", "Income", "Spending", "Net"
    );
    for (name, totals) in buckets {
        println!(
            "   {:24} │ {:>10.2} │ {:>10.2} │ {:>10.2}",
            truncate(name, 24),
            totals.inflow,
            totals.outflow,
            totals.net
        );
    }
}
