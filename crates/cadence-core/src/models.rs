//! Domain models for Cadence

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Category assigned when merchant text looks like a grocery or market run
pub const REQUIRED_PURCHASES: &str = "Required Purchases";
/// Category assigned to recurring service charges
pub const SUBSCRIPTIONS: &str = "Subscriptions";
pub const DISCRETIONARY_SPENDING: &str = "Discretionary Spending";
pub const SPENDING_BUT_ASSETS: &str = "Spending but Assets";
/// Bucket name used by breakdowns for transactions without a category
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Categories the classifier can produce without any rules configured
pub const FALLBACK_CATEGORIES: [&str; 2] = [REQUIRED_PURCHASES, SUBSCRIPTIONS];

/// How a transaction moves money
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Income,
    Expense,
    Transfer,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }

    /// Whether a canonical (negative = expense) amount agrees with this tag
    pub fn agrees_with(&self, amount: f64) -> bool {
        match self {
            Self::Income => amount >= 0.0,
            Self::Expense => amount <= 0.0,
            Self::Transfer => true,
        }
    }
}

impl std::str::FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" | "credit" => Ok(Self::Income),
            "expense" | "debit" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!("Unknown classification: {}", s)),
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction supplied by the external ledger
///
/// Amounts use the canonical sign convention: negative = expense,
/// positive = income. `classification` must agree with the sign
/// (see [`Classification::agrees_with`]); the ingestion boundary enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Opaque identifier from the ledger
    pub id: String,
    pub date: NaiveDate,
    /// Negative = expense, positive = income
    pub amount: f64,
    #[serde(default)]
    pub currency: String,
    pub merchant: Option<String>,
    /// Description or payee name
    pub description: String,
    /// Account the transaction belongs to (id or name)
    #[serde(default)]
    pub account: Option<String>,
    pub classification: Classification,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Excluded transactions are ignored by detection and aggregation
    #[serde(default)]
    pub excluded: bool,
}

impl Transaction {
    /// Merchant if present and non-empty, otherwise the description
    pub fn merchant_or_name(&self) -> &str {
        match self.merchant.as_deref() {
            Some(m) if !m.trim().is_empty() => m,
            _ => &self.description,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Subscription billing frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Nominal period length in days
    pub fn nominal_days(&self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Yearly => 365,
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recurring payment surfaced by the recurrence detector
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Merchant key the group was formed on
    pub merchant: String,
    pub amount: f64,
    pub frequency: Frequency,
    pub last_date: NaiveDate,
    pub next_expected_date: NaiveDate,
    /// Fraction of intervals consistent with `frequency`
    pub confidence: f64,
    pub transaction_count: usize,
    pub transaction_ids: Vec<String>,
    /// Contributing transactions, oldest first
    #[serde(skip)]
    pub transactions: Vec<Transaction>,
}

impl Subscription {
    /// Cost normalized to one month
    pub fn monthly_cost(&self) -> f64 {
        match self.frequency {
            Frequency::Weekly => self.amount * 52.0 / 12.0,
            Frequency::Monthly => self.amount,
            Frequency::Yearly => self.amount / 12.0,
        }
    }
}

// ========== Rule Definitions ==========

/// Inclusive range checked against the absolute amount
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AmountRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl AmountRange {
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Conditions of a categorization rule; every supplied group must hold
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConditions {
    /// Matched against the lower-cased merchant (or description); any may match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merchant_patterns: Vec<String>,
    /// Matched against the lower-cased description; any may match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub description_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_range: Option<AmountRange>,
    /// 0 = Sunday .. 6 = Saturday
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<Vec<u8>>,
    /// 1..=31
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<bool>,
}

/// A categorization rule as supplied by configuration or at runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Higher priority rules are checked first
    pub priority: i64,
    #[serde(default)]
    pub conditions: RuleConditions,
}

// ========== Cash Flow ==========

/// Period a summary covers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPeriod {
    pub days: i64,
    /// None when the batch was empty and no end date was given
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Inflow/outflow split for one bucket
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowTotals {
    pub inflow: f64,
    /// Reported as a positive number
    pub outflow: f64,
    pub net: f64,
    pub transaction_count: usize,
}

impl FlowTotals {
    /// Add a canonical-sign amount of the given classification
    pub fn record(&mut self, classification: Classification, amount: f64) {
        match classification {
            Classification::Income => self.inflow += amount,
            Classification::Expense => self.outflow += amount.abs(),
            Classification::Transfer => return,
        }
        self.net = self.inflow - self.outflow;
        self.transaction_count += 1;
    }
}

/// Totals for a single calendar day
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyFlow {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: FlowTotals,
}

/// Where each input transaction ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCounts {
    /// Transactions supplied
    pub total: usize,
    /// Counted toward inflow or outflow
    pub included: usize,
    pub income: usize,
    pub expense: usize,
    /// Classified as transfer by the ledger
    pub transfer: usize,
    /// Members of detected same-day transfer pairs
    pub transfer_pair_members: usize,
    pub excluded: usize,
    pub outside_period: usize,
    pub filtered_by_account: usize,
    /// Non-finite amounts skipped
    pub invalid: usize,
}

/// Aggregated cash flow for a period
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowSummary {
    pub period: ReportPeriod,
    pub inflow: f64,
    pub outflow: f64,
    pub net_flow: f64,
    pub avg_daily_inflow: f64,
    pub avg_daily_outflow: f64,
    pub avg_daily_net: f64,
    pub daily: Vec<DailyFlow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_category: Option<BTreeMap<String, FlowTotals>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_account: Option<BTreeMap<String, FlowTotals>>,
    pub counts: TransactionCounts,
    pub insights: Vec<String>,
}
