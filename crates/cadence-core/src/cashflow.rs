//! Cash flow aggregation
//!
//! Turns a batch of transactions into period totals, per-day buckets,
//! optional category/account breakdowns, and a short list of insights.
//!
//! Same-day income/expense pairs with matching amounts are treated as
//! transfers between the user's own accounts and left out of every total.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::{debug, info, warn};

use crate::classify::Classifier;
use crate::error::{Error, Result};
use crate::models::{
    CashFlowSummary, Classification, DailyFlow, FlowTotals, ReportPeriod, Transaction,
    TransactionCounts, UNCATEGORIZED,
};

/// Bucket name for transactions without an account
pub const UNKNOWN_ACCOUNT: &str = "Unknown";

/// Aggregation thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct CashFlowConfig {
    /// Maximum absolute-amount difference (exclusive) for a transfer pair
    pub transfer_tolerance: f64,
    /// Average daily net beyond this magnitude produces a pace insight
    pub daily_net_threshold: f64,
    /// Expenses above this multiple of average daily outflow count as large
    pub large_transaction_multiplier: f64,
    /// Weekend daily outflow above this multiple of the overall average is flagged
    pub weekend_multiplier: f64,
}

impl Default for CashFlowConfig {
    fn default() -> Self {
        Self {
            transfer_tolerance: 0.01,
            daily_net_threshold: 50.0,
            large_transaction_multiplier: 3.0,
            weekend_multiplier: 1.5,
        }
    }
}

/// Filtering and grouping for a summary
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOptions {
    /// Only these accounts; empty means all
    pub accounts: Vec<String>,
    pub exclude_transfers: bool,
    pub group_by_category: bool,
    pub group_by_account: bool,
    /// Last day of the period; defaults to the latest transaction date
    pub as_of: Option<NaiveDate>,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            exclude_transfers: true,
            group_by_category: false,
            group_by_account: false,
            as_of: None,
        }
    }
}

/// Observation derived from summary totals
#[derive(Debug, Clone, PartialEq)]
pub enum Insight {
    /// Outflow exceeded inflow over the period
    Deficit { shortfall: f64, days: i64 },
    DailySurplus { average: f64 },
    DailyDeficit { average: f64 },
    /// Expenses above the large-transaction threshold
    LargeExpenses {
        count: usize,
        threshold: f64,
        multiplier: f64,
    },
    WeekendSpending { weekend_average: f64, overall_average: f64 },
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deficit { shortfall, days } => write!(
                f,
                "Spending exceeded income by {:.2} over the last {} days",
                shortfall, days
            ),
            Self::DailySurplus { average } => {
                write!(f, "Average daily surplus of {:.2}", average)
            }
            Self::DailyDeficit { average } => write!(
                f,
                "Average daily deficit of {:.2}; spending is outpacing income",
                average
            ),
            Self::LargeExpenses {
                count,
                threshold,
                multiplier,
            } => write!(
                f,
                "{} large expense{} above {:.2} ({}x the average daily outflow)",
                count,
                if *count == 1 { "" } else { "s" },
                threshold,
                multiplier
            ),
            Self::WeekendSpending {
                weekend_average,
                overall_average,
            } => write!(
                f,
                "Weekend spending averages {:.2} per day versus {:.2} overall",
                weekend_average, overall_average
            ),
        }
    }
}

/// Totals the insight rules look at
#[derive(Debug, Clone, Default)]
struct InsightInputs {
    days: i64,
    net: f64,
    avg_daily_net: f64,
    avg_daily_outflow: f64,
    /// Absolute amounts of included expenses
    expense_amounts: Vec<f64>,
    weekend_outflow: f64,
    weekend_days: i64,
}

/// Produces cash flow summaries, optionally using a classifier to fill in
/// categories for the category breakdown
#[derive(Debug, Default)]
pub struct CashFlowAggregator<'a> {
    config: CashFlowConfig,
    classifier: Option<&'a Classifier>,
}

impl<'a> CashFlowAggregator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CashFlowConfig) -> Self {
        Self {
            config,
            classifier: None,
        }
    }

    /// Use a classifier for transactions that arrive without a category
    pub fn with_classifier(mut self, classifier: &'a Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn config(&self) -> &CashFlowConfig {
        &self.config
    }

    /// Summarize `period_days` of cash flow ending at `options.as_of`
    pub fn summarize(
        &self,
        transactions: &[Transaction],
        period_days: i64,
        options: &SummaryOptions,
    ) -> Result<CashFlowSummary> {
        if period_days <= 0 {
            return Err(Error::InvalidParameter(format!(
                "period must be at least one day, got {}",
                period_days
            )));
        }

        let mut counts = TransactionCounts {
            total: transactions.len(),
            ..Default::default()
        };

        // 1. Drop unusable, excluded, and other-account transactions
        let mut eligible: Vec<&Transaction> = Vec::with_capacity(transactions.len());
        for tx in transactions {
            if !tx.amount.is_finite() {
                warn!("Skipping transaction {} with non-finite amount", tx.id);
                counts.invalid += 1;
            } else if tx.excluded {
                counts.excluded += 1;
            } else if !self.account_selected(tx, options) {
                counts.filtered_by_account += 1;
            } else {
                eligible.push(tx);
            }
        }

        // 2. Restrict to the period window
        let to = options
            .as_of
            .or_else(|| eligible.iter().map(|t| t.date).max());
        let span = Duration::try_days(period_days - 1).ok_or_else(|| too_long(period_days))?;
        let from = match to {
            Some(to) => Some(
                to.checked_sub_signed(span)
                    .ok_or_else(|| too_long(period_days))?,
            ),
            None => None,
        };
        let period = ReportPeriod {
            days: period_days,
            from,
            to,
        };

        let in_period: Vec<&Transaction> = match (from, to) {
            (Some(from), Some(to)) => eligible
                .into_iter()
                .filter(|t| {
                    let inside = t.date >= from && t.date <= to;
                    if !inside {
                        counts.outside_period += 1;
                    }
                    inside
                })
                .collect(),
            _ => eligible,
        };

        // 3. Same-day transfer pairs
        let pair_members = if options.exclude_transfers {
            find_transfer_pairs(&in_period, self.config.transfer_tolerance)
        } else {
            HashSet::new()
        };
        counts.transfer_pair_members = pair_members.len();

        // 4. Totals and buckets
        let mut totals = FlowTotals::default();
        let mut daily: BTreeMap<NaiveDate, FlowTotals> = BTreeMap::new();
        let mut by_category: BTreeMap<String, FlowTotals> = BTreeMap::new();
        let mut by_account: BTreeMap<String, FlowTotals> = BTreeMap::new();
        let mut expense_amounts = Vec::new();

        for (index, tx) in in_period.iter().enumerate() {
            if pair_members.contains(&index) {
                continue;
            }
            match tx.classification {
                Classification::Transfer => {
                    counts.transfer += 1;
                    continue;
                }
                Classification::Income => counts.income += 1,
                Classification::Expense => {
                    counts.expense += 1;
                    expense_amounts.push(tx.amount.abs());
                }
            }
            counts.included += 1;

            totals.record(tx.classification, tx.amount);
            daily
                .entry(tx.date)
                .or_default()
                .record(tx.classification, tx.amount);
            if options.group_by_category {
                by_category
                    .entry(self.category_for(tx))
                    .or_default()
                    .record(tx.classification, tx.amount);
            }
            if options.group_by_account {
                let account = tx.account.as_deref().unwrap_or(UNKNOWN_ACCOUNT);
                by_account
                    .entry(account.to_string())
                    .or_default()
                    .record(tx.classification, tx.amount);
            }
        }

        let days = period_days as f64;
        let avg_daily_inflow = totals.inflow / days;
        let avg_daily_outflow = totals.outflow / days;
        let avg_daily_net = totals.net / days;

        // 5. Insights from the computed totals
        let weekend_outflow: f64 = daily
            .iter()
            .filter(|(date, _)| is_weekend(**date))
            .map(|(_, t)| t.outflow)
            .sum();
        let inputs = InsightInputs {
            days: period_days,
            net: totals.net,
            avg_daily_net,
            avg_daily_outflow,
            expense_amounts,
            weekend_outflow,
            weekend_days: match (from, to) {
                (Some(from), Some(to)) => count_weekend_days(from, to),
                _ => 0,
            },
        };
        let insights = generate_insights(&inputs, &self.config);

        info!(
            "Cash flow over {} days: inflow {:.2}, outflow {:.2}, net {:.2} ({} of {} transactions)",
            period_days, totals.inflow, totals.outflow, totals.net, counts.included, counts.total
        );

        Ok(CashFlowSummary {
            period,
            inflow: totals.inflow,
            outflow: totals.outflow,
            net_flow: totals.net,
            avg_daily_inflow,
            avg_daily_outflow,
            avg_daily_net,
            daily: daily
                .into_iter()
                .map(|(date, totals)| DailyFlow { date, totals })
                .collect(),
            by_category: options.group_by_category.then_some(by_category),
            by_account: options.group_by_account.then_some(by_account),
            counts,
            insights: insights.iter().map(|i| i.to_string()).collect(),
        })
    }

    fn account_selected(&self, tx: &Transaction, options: &SummaryOptions) -> bool {
        if options.accounts.is_empty() {
            return true;
        }
        tx.account
            .as_ref()
            .is_some_and(|a| options.accounts.iter().any(|wanted| wanted == a))
    }

    fn category_for(&self, tx: &Transaction) -> String {
        if let Some(category) = tx.category.as_deref().filter(|c| !c.trim().is_empty()) {
            return category.to_string();
        }
        self.classifier
            .and_then(|c| c.categorize(tx))
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }
}

/// Summarize with default thresholds and no classifier
pub fn summarize(
    transactions: &[Transaction],
    period_days: i64,
    options: &SummaryOptions,
) -> Result<CashFlowSummary> {
    CashFlowAggregator::new().summarize(transactions, period_days, options)
}

/// Indices of every transaction that belongs to a same-day transfer pair
///
/// A pair is one income and one expense on the same date whose absolute
/// amounts differ by less than `tolerance`. A transaction may pair with
/// several others; it is reported once. Expenses are bucketed by date and
/// sorted by amount so each income only scans its near neighbours.
pub fn find_transfer_pairs(transactions: &[&Transaction], tolerance: f64) -> HashSet<usize> {
    let mut by_date: BTreeMap<NaiveDate, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for (index, tx) in transactions.iter().enumerate() {
        match tx.classification {
            Classification::Income => by_date.entry(tx.date).or_default().0.push(index),
            Classification::Expense => by_date.entry(tx.date).or_default().1.push(index),
            Classification::Transfer => {}
        }
    }

    let abs = |i: usize| transactions[i].amount.abs();
    let mut members = HashSet::new();

    for (date, (incomes, mut expenses)) in by_date {
        if incomes.is_empty() || expenses.is_empty() {
            continue;
        }
        expenses.sort_by(|a, b| abs(*a).total_cmp(&abs(*b)));

        for income in incomes {
            let amount = abs(income);
            // Scan a widened window, then apply the exact predicate
            let start = expenses.partition_point(|e| abs(*e) <= amount - 2.0 * tolerance);
            let mut paired = false;
            for &expense in &expenses[start..] {
                let other = abs(expense);
                if other >= amount + 2.0 * tolerance {
                    break;
                }
                if (other - amount).abs() < tolerance {
                    members.insert(expense);
                    paired = true;
                }
            }
            if paired {
                debug!(
                    "Transfer pair on {}: {} ({:.2})",
                    date, transactions[income].id, amount
                );
                members.insert(income);
            }
        }
    }

    members
}

fn generate_insights(inputs: &InsightInputs, config: &CashFlowConfig) -> Vec<Insight> {
    let mut insights = Vec::new();

    if inputs.net < 0.0 {
        insights.push(Insight::Deficit {
            shortfall: -inputs.net,
            days: inputs.days,
        });
    }

    if inputs.avg_daily_net > config.daily_net_threshold {
        insights.push(Insight::DailySurplus {
            average: inputs.avg_daily_net,
        });
    } else if inputs.avg_daily_net < -config.daily_net_threshold {
        insights.push(Insight::DailyDeficit {
            average: -inputs.avg_daily_net,
        });
    }

    if inputs.avg_daily_outflow > 0.0 {
        let threshold = inputs.avg_daily_outflow * config.large_transaction_multiplier;
        let count = inputs
            .expense_amounts
            .iter()
            .filter(|a| **a > threshold)
            .count();
        if count > 0 {
            insights.push(Insight::LargeExpenses {
                count,
                threshold,
                multiplier: config.large_transaction_multiplier,
            });
        }
    }

    if inputs.avg_daily_outflow > 0.0 && inputs.weekend_days > 0 {
        let weekend_average = inputs.weekend_outflow / inputs.weekend_days as f64;
        if weekend_average > inputs.avg_daily_outflow * config.weekend_multiplier {
            insights.push(Insight::WeekendSpending {
                weekend_average,
                overall_average: inputs.avg_daily_outflow,
            });
        }
    }

    insights
}

fn too_long(period_days: i64) -> Error {
    Error::InvalidParameter(format!(
        "period of {} days reaches past the earliest supported date",
        period_days
    ))
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn count_weekend_days(from: NaiveDate, to: NaiveDate) -> i64 {
    let days = (to - from).num_days() + 1;
    if days <= 0 {
        return 0;
    }
    let full_weeks = days / 7;
    let tail = (from + Duration::days(full_weeks * 7))
        .iter_days()
        .take((days % 7) as usize)
        .filter(|d| is_weekend(*d))
        .count() as i64;
    full_weeks * 2 + tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RuleConditions, RuleDefinition};
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(id: &str, amount: f64, date: NaiveDate) -> Transaction {
        Transaction {
            id: id.to_string(),
            date,
            amount,
            currency: "EUR".to_string(),
            merchant: None,
            description: id.to_string(),
            account: Some("checking".to_string()),
            classification: if amount < 0.0 {
                Classification::Expense
            } else {
                Classification::Income
            },
            category: None,
            tags: vec![],
            excluded: false,
        }
    }

    /// All-pairs reference for the transfer predicate
    fn naive_pairs(transactions: &[&Transaction], tolerance: f64) -> HashSet<usize> {
        let mut members = HashSet::new();
        for i in 0..transactions.len() {
            for j in 0..transactions.len() {
                let (a, b) = (transactions[i], transactions[j]);
                if a.date == b.date
                    && a.classification == Classification::Income
                    && b.classification == Classification::Expense
                    && (a.amount.abs() - b.amount.abs()).abs() < tolerance
                {
                    members.insert(i);
                    members.insert(j);
                }
            }
        }
        members
    }

    #[test]
    fn test_zero_period_rejected() {
        let txs = vec![tx("a", -10.0, date(2024, 1, 1))];
        let err = summarize(&txs, 0, &SummaryOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert!(summarize(&txs, -3, &SummaryOptions::default()).is_err());
    }

    #[test]
    fn test_empty_batch() {
        let summary = summarize(&[], 30, &SummaryOptions::default()).unwrap();
        assert_eq!(summary.inflow, 0.0);
        assert_eq!(summary.outflow, 0.0);
        assert_eq!(summary.net_flow, 0.0);
        assert_eq!(summary.avg_daily_net, 0.0);
        assert!(summary.daily.is_empty());
        assert!(summary.insights.is_empty());
        assert_eq!(summary.period.from, None);
    }

    #[test]
    fn test_totals_and_averages() {
        let d = date(2024, 3, 13); // Wednesday
        let txs = vec![
            tx("salary", 3000.0, d),
            tx("rent", -1200.0, d - Duration::days(1)),
            tx("food", -300.0, d - Duration::days(2)),
        ];
        let summary = summarize(&txs, 30, &SummaryOptions::default()).unwrap();

        assert_relative_eq!(summary.inflow, 3000.0);
        assert_relative_eq!(summary.outflow, 1500.0);
        assert_relative_eq!(summary.net_flow, 1500.0);
        assert_relative_eq!(summary.avg_daily_inflow, 100.0);
        assert_relative_eq!(summary.avg_daily_outflow, 50.0);
        assert_relative_eq!(summary.avg_daily_net, 50.0);
        assert_eq!(summary.daily.len(), 3);
        assert_eq!(summary.period.to, Some(d));
        assert_eq!(summary.period.from, Some(d - Duration::days(29)));
        assert_eq!(summary.counts.included, 3);
    }

    #[test]
    fn test_transfer_pair_excluded() {
        let d = date(2024, 3, 13);
        let txs = vec![
            tx("in", 50.0, d),
            tx("out", -50.0, d),
            tx("coffee", -20.0, d),
        ];
        let summary = summarize(&txs, 7, &SummaryOptions::default()).unwrap();

        assert_relative_eq!(summary.inflow, 0.0);
        assert_relative_eq!(summary.outflow, 20.0);
        assert_eq!(summary.daily.len(), 1);
        assert_relative_eq!(summary.daily[0].totals.net, -20.0);
        assert_eq!(summary.counts.transfer_pair_members, 2);

        let options = SummaryOptions {
            exclude_transfers: false,
            ..Default::default()
        };
        let summary = summarize(&txs, 7, &options).unwrap();
        assert_relative_eq!(summary.inflow, 50.0);
        assert_relative_eq!(summary.outflow, 70.0);
    }

    #[test]
    fn test_transfer_tolerance_is_exclusive() {
        let d = date(2024, 3, 13);
        let near = vec![tx("in", 100.0, d), tx("out", -100.005, d)];
        let refs: Vec<&Transaction> = near.iter().collect();
        assert_eq!(find_transfer_pairs(&refs, 0.01).len(), 2);

        let far = vec![tx("in", 100.0, d), tx("out", -100.02, d)];
        let refs: Vec<&Transaction> = far.iter().collect();
        assert!(find_transfer_pairs(&refs, 0.01).is_empty());
    }

    #[test]
    fn test_transfer_pairs_need_same_day_and_opposite_kind() {
        let d = date(2024, 3, 13);
        let txs = vec![
            tx("in", 75.0, d),
            tx("out-next-day", -75.0, d + Duration::days(1)),
            tx("out-a", -30.0, d),
            tx("out-b", -30.0, d),
        ];
        let refs: Vec<&Transaction> = txs.iter().collect();
        assert!(find_transfer_pairs(&refs, 0.01).is_empty());
    }

    #[test]
    fn test_every_pair_member_excluded() {
        let d = date(2024, 3, 13);
        let txs = vec![
            tx("in", 40.0, d),
            tx("out-1", -40.0, d),
            tx("out-2", -40.0, d),
            tx("other", -12.0, d),
        ];
        let refs: Vec<&Transaction> = txs.iter().collect();
        let pairs = find_transfer_pairs(&refs, 0.01);
        assert_eq!(pairs, naive_pairs(&refs, 0.01));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_ledger_transfers_never_counted() {
        let d = date(2024, 3, 13);
        let mut moved = tx("to-savings", -500.0, d);
        moved.classification = Classification::Transfer;
        let txs = vec![moved, tx("lunch", -15.0, d)];
        let summary = summarize(&txs, 1, &SummaryOptions::default()).unwrap();
        assert_relative_eq!(summary.outflow, 15.0);
        assert_eq!(summary.counts.transfer, 1);
    }

    #[test]
    fn test_excluded_account_and_period_filters() {
        let d = date(2024, 3, 13);
        let mut hidden = tx("hidden", -99.0, d);
        hidden.excluded = true;
        let mut savings = tx("savings-interest", 5.0, d);
        savings.account = Some("savings".to_string());
        let old = tx("old", -40.0, d - Duration::days(10));
        let txs = vec![hidden, savings, old, tx("groceries", -60.0, d)];

        let options = SummaryOptions {
            accounts: vec!["checking".to_string()],
            ..Default::default()
        };
        let summary = summarize(&txs, 7, &options).unwrap();

        assert_relative_eq!(summary.outflow, 60.0);
        assert_relative_eq!(summary.inflow, 0.0);
        assert_eq!(summary.counts.excluded, 1);
        assert_eq!(summary.counts.filtered_by_account, 1);
        assert_eq!(summary.counts.outside_period, 1);
        assert_eq!(summary.counts.included, 1);
    }

    #[test]
    fn test_breakdowns() {
        let d = date(2024, 3, 13);
        let mut groceries = tx("ah", -45.0, d);
        groceries.merchant = Some("Albert Heijn".to_string());
        let mut fun = tx("cinema", -12.0, d);
        fun.category = Some("Discretionary Spending".to_string());
        let mut card = tx("misc", -87.0, d);
        card.account = None;
        let txs = vec![groceries, fun, card, tx("salary", 2000.0, d)];

        let classifier = Classifier::from_definitions(vec![RuleDefinition {
            id: "ah".to_string(),
            name: "Albert Heijn".to_string(),
            category: "Required Purchases".to_string(),
            priority: 1,
            conditions: RuleConditions {
                merchant_patterns: vec!["albert heijn".to_string()],
                ..Default::default()
            },
        }])
        .unwrap();
        let aggregator = CashFlowAggregator::new().with_classifier(&classifier);
        let options = SummaryOptions {
            group_by_category: true,
            group_by_account: true,
            ..Default::default()
        };
        let summary = aggregator.summarize(&txs, 30, &options).unwrap();

        let by_category = summary.by_category.unwrap();
        assert_relative_eq!(by_category["Required Purchases"].outflow, 45.0);
        assert_relative_eq!(by_category["Discretionary Spending"].outflow, 12.0);
        assert_relative_eq!(by_category[UNCATEGORIZED].outflow, 87.0);
        assert_relative_eq!(by_category[UNCATEGORIZED].inflow, 2000.0);

        let by_account = summary.by_account.unwrap();
        assert_relative_eq!(by_account["checking"].net, 2000.0 - 57.0);
        assert_relative_eq!(by_account[UNKNOWN_ACCOUNT].outflow, 87.0);
    }

    #[test]
    fn test_breakdowns_omitted_by_default() {
        let txs = vec![tx("a", -1.0, date(2024, 1, 1))];
        let summary = summarize(&txs, 1, &SummaryOptions::default()).unwrap();
        assert!(summary.by_category.is_none());
        assert!(summary.by_account.is_none());
    }

    #[test]
    fn test_deficit_insights() {
        let d = date(2024, 3, 13); // Wednesday
        let txs = vec![tx("rent", -1500.0, d), tx("pay", 100.0, d)];
        let summary = summarize(&txs, 10, &SummaryOptions::default()).unwrap();

        assert_eq!(
            summary.insights[0],
            "Spending exceeded income by 1400.00 over the last 10 days"
        );
        assert!(summary.insights[1].starts_with("Average daily deficit of 140.00"));
        // 1500 > 3 * 150
        assert!(summary.insights[2].starts_with("1 large expense above 450.00"));
        assert_eq!(summary.insights.len(), 3);
    }

    #[test]
    fn test_surplus_insight_only() {
        let d = date(2024, 3, 13);
        let mut txs = vec![tx("pay", 3000.0, d)];
        for i in 0..10 {
            txs.push(tx(&format!("e{}", i), -10.0, d - Duration::days(i)));
        }
        let summary = summarize(&txs, 10, &SummaryOptions::default()).unwrap();
        assert_eq!(summary.insights, vec!["Average daily surplus of 290.00"]);
    }

    #[test]
    fn test_weekend_insight() {
        // 2024-03-16/17 is a weekend; period Mar 11 (Mon) - Mar 17 (Sun)
        let txs = vec![
            tx("pay", 1000.0, date(2024, 3, 11)),
            tx("weekday", -10.0, date(2024, 3, 12)),
            tx("sat", -60.0, date(2024, 3, 16)),
            tx("sun", -70.0, date(2024, 3, 17)),
        ];
        let summary = summarize(&txs, 7, &SummaryOptions::default()).unwrap();
        // overall 140 / 7 = 20 per day; weekend 130 / 2 = 65 per day
        assert!(summary
            .insights
            .iter()
            .any(|i| i == "Weekend spending averages 65.00 per day versus 20.00 overall"));
    }

    #[test]
    fn test_insights_do_not_alter_totals() {
        let d = date(2024, 3, 13);
        let txs = vec![tx("big", -1000.0, d), tx("small", -1.0, d)];
        let summary = summarize(&txs, 2, &SummaryOptions::default()).unwrap();
        assert!(!summary.insights.is_empty());
        assert_relative_eq!(summary.outflow, 1001.0);
        assert_relative_eq!(summary.net_flow, -1001.0);
    }

    #[test]
    fn test_summarize_idempotent() {
        let d = date(2024, 3, 13);
        let txs = vec![
            tx("a", 120.5, d),
            tx("b", -120.5, d),
            tx("c", -33.3, d - Duration::days(2)),
            tx("d", 10.0, d - Duration::days(3)),
        ];
        let options = SummaryOptions {
            group_by_category: true,
            group_by_account: true,
            ..Default::default()
        };
        let first = summarize(&txs, 14, &options).unwrap();
        let second = summarize(&txs, 14, &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_weekend_day_count() {
        assert_eq!(count_weekend_days(date(2024, 3, 11), date(2024, 3, 17)), 2);
        assert_eq!(count_weekend_days(date(2024, 3, 11), date(2024, 3, 15)), 0);
        assert_eq!(count_weekend_days(date(2024, 3, 1), date(2024, 3, 31)), 10);
        assert_eq!(count_weekend_days(date(2024, 3, 16), date(2024, 3, 16)), 1);
        assert_eq!(count_weekend_days(date(2024, 1, 1), date(2024, 12, 31)), 104);
    }

    #[test]
    fn test_huge_period_is_an_error() {
        let txs = vec![tx("a", -10.0, date(2024, 3, 13))];
        for days in [i64::MAX, 1_000_000_000_000] {
            assert!(matches!(
                summarize(&txs, days, &SummaryOptions::default()),
                Err(Error::InvalidParameter(_))
            ));
        }

        let options = SummaryOptions {
            as_of: Some(date(2024, 3, 13)),
            ..Default::default()
        };
        assert!(matches!(
            summarize(&[], i64::MAX, &options),
            Err(Error::InvalidParameter(_))
        ));

        // Long but representable periods still summarize
        let summary = summarize(&txs, 1_000_000, &SummaryOptions::default()).unwrap();
        assert_relative_eq!(summary.outflow, 10.0);
    }

    #[test]
    fn test_large_expense_insight_ignores_income() {
        let d = date(2024, 3, 13); // Wednesday
        let txs = vec![tx("bonus", 5000.0, d), tx("lunch", -30.0, d)];
        let summary = summarize(&txs, 10, &SummaryOptions::default()).unwrap();
        // Threshold 9.00: the lunch counts, the bonus does not
        assert!(summary
            .insights
            .iter()
            .any(|i| i.starts_with("1 large expense above 9.00")));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_tx() -> impl Strategy<Value = Transaction> {
            (0i64..5, -300i64..300, 0u8..3).prop_map(|(day, cents, kind)| {
                let amount = cents as f64 / 4.0;
                let mut t = tx("p", amount, date(2024, 1, 1) + Duration::days(day));
                if kind == 0 {
                    t.classification = Classification::Transfer;
                }
                t
            })
        }

        proptest! {
            #[test]
            fn bucketed_pairs_match_all_pairs(txs in prop::collection::vec(arb_tx(), 0..40)) {
                let refs: Vec<&Transaction> = txs.iter().collect();
                prop_assert_eq!(find_transfer_pairs(&refs, 0.01), naive_pairs(&refs, 0.01));
            }

            #[test]
            fn pair_members_never_counted(txs in prop::collection::vec(arb_tx(), 0..40)) {
                let summary = summarize(&txs, 5, &SummaryOptions::default()).unwrap();
                let refs: Vec<&Transaction> = txs.iter().collect();
                let members = naive_pairs(&refs, 0.01);
                let inflow: f64 = txs.iter().enumerate()
                    .filter(|(i, t)| !members.contains(i) && t.classification == Classification::Income)
                    .map(|(_, t)| t.amount)
                    .sum();
                prop_assert!((summary.inflow - inflow).abs() < 1e-6);
            }

            #[test]
            fn summary_is_idempotent(txs in prop::collection::vec(arb_tx(), 0..40), days in 1i64..10) {
                let options = SummaryOptions { group_by_category: true, ..Default::default() };
                prop_assert_eq!(
                    summarize(&txs, days, &options).unwrap(),
                    summarize(&txs, days, &options).unwrap()
                );
            }
        }
    }
}
