//! Cadence Core Library
//!
//! Transaction analysis for personal budgeting:
//! - Rule-based categorization with grocery/subscription fallbacks
//! - Recurring payment (subscription) detection
//! - Cash flow summaries with transfer-pair exclusion and insights
//! - Ingestion of ledger JSON exports
//! - TOML configuration with an embedded default
//!
//! Everything here is synchronous and pure apart from the rule set, which can
//! be updated while other threads classify.

pub mod cashflow;
pub mod classify;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod recurrence;
pub mod rules;

/// Transaction and rule builders for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cashflow::{summarize, CashFlowAggregator, CashFlowConfig, Insight, SummaryOptions};
pub use classify::{is_subscription_price_point, Categorization, CategorySource, Classifier};
pub use config::{default_config_path, load_config, parse_config, CadenceConfig};
pub use error::{Error, Result};
pub use ingest::{
    parse_transactions, parse_transactions_file, IngestOptions, IngestReport, ItemError,
    SignConvention,
};
pub use models::{
    AmountRange, CashFlowSummary, Classification, DailyFlow, FlowTotals, Frequency,
    ReportPeriod, RuleConditions, RuleDefinition, Subscription, Transaction, TransactionCounts,
};
pub use recurrence::{
    detect_subscriptions, total_monthly_cost, LookbackWindow, RecurrenceConfig,
    RecurrenceDetector, MIN_CONFIDENCE, MIN_OCCURRENCES,
};
pub use rules::{CompiledRule, MatchContext, RuleSet};
