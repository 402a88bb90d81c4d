//! Cadence CLI - Transaction categorization and cash-flow analysis
//!
//! Usage:
//!   cadence categorize --file export.json         Assign categories
//!   cadence subscriptions --file export.json      Detect recurring payments
//!   cadence cashflow --file export.json --days 30 Summarize cash flow
//!   cadence rules test --merchant X --amount -9.99

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let session = commands::open_session(cli.config.as_deref(), cli.json)?;

    match cli.command {
        Commands::Categorize { file, overwrite } => {
            commands::cmd_categorize(&session, &file, overwrite)
        }
        Commands::Subscriptions {
            file,
            lookback_days,
            as_of,
        } => commands::cmd_subscriptions(&session, &file, lookback_days, as_of.as_deref()),
        Commands::Cashflow {
            file,
            days,
            account,
            include_transfers,
            by_category,
            by_account,
            as_of,
        } => commands::cmd_cashflow(
            &session,
            &file,
            days,
            commands::CashflowArgs {
                accounts: account,
                include_transfers,
                by_category,
                by_account,
                as_of,
            },
        ),
        Commands::Rules { action } => match action {
            None | Some(RulesAction::List) => commands::cmd_rules_list(&session),
            Some(RulesAction::Test {
                merchant,
                description,
                amount,
                date,
                recurring,
            }) => commands::cmd_rules_test(
                &session,
                merchant.as_deref(),
                &description,
                amount,
                date.as_deref(),
                recurring,
            ),
        },
    }
}
