//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cadence - Categorize transactions, spot subscriptions, track cash flow
#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Transaction categorization and cash-flow analysis", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the user config, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assign a category to every transaction in an export
    Categorize {
        /// JSON transaction export
        #[arg(short, long)]
        file: PathBuf,

        /// Replace categories already present in the export
        #[arg(long)]
        overwrite: bool,
    },

    /// Detect recurring payments
    Subscriptions {
        /// JSON transaction export
        #[arg(short, long)]
        file: PathBuf,

        /// Days of history to consider (defaults to the configured lookback)
        #[arg(long)]
        lookback_days: Option<i64>,

        /// End of the lookback window, YYYY-MM-DD (defaults to the latest transaction)
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Summarize income and spending over a period
    Cashflow {
        /// JSON transaction export
        #[arg(short, long)]
        file: PathBuf,

        /// Period length in days
        #[arg(short, long, default_value = "30")]
        days: i64,

        /// Only include these accounts (repeatable)
        #[arg(short, long)]
        account: Vec<String>,

        /// Count same-day transfers between own accounts as income/spending
        #[arg(long)]
        include_transfers: bool,

        /// Break totals down by category
        #[arg(long)]
        by_category: bool,

        /// Break totals down by account
        #[arg(long)]
        by_account: bool,

        /// Last day of the period, YYYY-MM-DD (defaults to the latest transaction)
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Inspect categorization rules
    Rules {
        #[command(subcommand)]
        action: Option<RulesAction>,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// List configured rules in evaluation order
    List,

    /// Show which rules match a sample transaction
    Test {
        /// Merchant name
        #[arg(short, long)]
        merchant: Option<String>,

        /// Description or payee
        #[arg(short, long, default_value = "")]
        description: String,

        /// Amount (negative = expense)
        #[arg(short, long, allow_hyphen_values = true)]
        amount: f64,

        /// Transaction date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Tag the sample as recurring
        #[arg(long)]
        recurring: bool,
    },
}
