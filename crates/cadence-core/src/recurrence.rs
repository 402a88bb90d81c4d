//! Recurring payment detection
//!
//! Groups expenses by merchant and exact amount, then looks at the spacing
//! between charges:
//! - at least 3 charges are needed (2 could be coincidence)
//! - the mean interval picks the frequency (weekly, monthly, yearly)
//! - confidence is the share of intervals close to that frequency's period

use std::collections::HashMap;

use chrono::{Duration, Months, NaiveDate};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Classification, Frequency, Subscription, Transaction};
use crate::rules::merchant_key;

/// Fewest charges that can form a recurring pattern; configuration may only raise it
pub const MIN_OCCURRENCES: usize = 3;

/// Confidence a pattern must exceed; configuration may only raise it
pub const MIN_CONFIDENCE: f64 = 0.7;

/// Detection thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceConfig {
    /// Minimum charges in a group before a pattern is considered
    /// (never below [`MIN_OCCURRENCES`])
    pub min_occurrences: usize,
    /// Mean-interval ranges (inclusive, in days) for each frequency
    pub weekly_range: (f64, f64),
    pub monthly_range: (f64, f64),
    pub yearly_range: (f64, f64),
    /// An interval is consistent when within this fraction of the nominal period
    pub interval_tolerance: f64,
    /// Groups must score strictly above this confidence
    /// (never below [`MIN_CONFIDENCE`])
    pub min_confidence: f64,
    /// Default lookback in days when the caller does not pick one
    pub default_lookback_days: i64,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            min_occurrences: MIN_OCCURRENCES,
            weekly_range: (6.0, 8.0),
            monthly_range: (25.0, 35.0),
            yearly_range: (350.0, 380.0),
            interval_tolerance: 0.15,
            min_confidence: MIN_CONFIDENCE,
            default_lookback_days: 365,
        }
    }
}

/// Trailing span of history considered for detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub days: i64,
    /// End of the window; defaults to the latest transaction date in the batch
    pub as_of: Option<NaiveDate>,
}

impl LookbackWindow {
    pub fn days(days: i64) -> Self {
        Self { days, as_of: None }
    }

    pub fn ending(days: i64, as_of: NaiveDate) -> Self {
        Self {
            days,
            as_of: Some(as_of),
        }
    }
}

/// Merchant key plus amount in cents
type GroupKey = (String, i64);

/// Detects subscription-like charges in a batch of transactions
#[derive(Debug, Clone, Default)]
pub struct RecurrenceDetector {
    config: RecurrenceConfig,
}

impl RecurrenceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RecurrenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecurrenceConfig {
        &self.config
    }

    /// Find recurring payments, most confident first
    ///
    /// Transactions that cannot contribute (non-finite or zero amounts) are
    /// skipped rather than failing the call. Only a non-positive window
    /// length is an error.
    pub fn detect_subscriptions(
        &self,
        transactions: &[Transaction],
        window: LookbackWindow,
    ) -> Result<Vec<Subscription>> {
        if window.days <= 0 {
            return Err(Error::InvalidParameter(format!(
                "lookback window must be positive, got {} days",
                window.days
            )));
        }

        let as_of = match window.as_of.or_else(|| latest_date(transactions)) {
            Some(date) => date,
            None => return Ok(Vec::new()),
        };
        let start = Duration::try_days(window.days)
            .and_then(|span| as_of.checked_sub_signed(span))
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "lookback window of {} days reaches past the earliest supported date",
                    window.days
                ))
            })?;

        let mut groups: HashMap<GroupKey, Vec<&Transaction>> = HashMap::new();
        for tx in transactions {
            if tx.excluded || tx.classification != Classification::Expense {
                continue;
            }
            if tx.date < start || tx.date > as_of {
                continue;
            }
            if !tx.amount.is_finite() || tx.amount == 0.0 {
                warn!("Skipping transaction {} with unusable amount {}", tx.id, tx.amount);
                continue;
            }

            let cents = (tx.amount.abs() * 100.0).round() as i64;
            groups
                .entry((merchant_key(tx.merchant_or_name()), cents))
                .or_default()
                .push(tx);
        }

        let mut subscriptions: Vec<Subscription> = groups
            .into_iter()
            .filter_map(|((merchant, cents), txs)| self.analyze_group(merchant, cents, txs))
            .collect();

        subscriptions.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.merchant.cmp(&b.merchant))
                .then_with(|| a.amount.total_cmp(&b.amount))
        });

        info!(
            "Recurrence detection: {} subscriptions from {} transactions",
            subscriptions.len(),
            transactions.len()
        );
        Ok(subscriptions)
    }

    fn analyze_group(
        &self,
        merchant: String,
        cents: i64,
        mut txs: Vec<&Transaction>,
    ) -> Option<Subscription> {
        if txs.len() < self.config.min_occurrences.max(MIN_OCCURRENCES) {
            return None;
        }

        txs.sort_by_key(|t| t.date);

        let intervals: Vec<i64> = txs
            .windows(2)
            .map(|w| (w[1].date - w[0].date).num_days())
            .collect();
        let mean = intervals.iter().sum::<i64>() as f64 / intervals.len() as f64;

        let frequency = match self.classify_interval(mean) {
            Some(f) => f,
            None => {
                debug!(
                    "Discarding {} @ {:.2}: mean interval {:.1} days fits no frequency",
                    merchant,
                    cents as f64 / 100.0,
                    mean
                );
                return None;
            }
        };

        let confidence = self.confidence(&intervals, frequency);
        if confidence <= self.config.min_confidence.max(MIN_CONFIDENCE) {
            debug!(
                "Discarding {} @ {:.2}: confidence {:.2} too low for {}",
                merchant,
                cents as f64 / 100.0,
                confidence,
                frequency
            );
            return None;
        }

        let last_date = txs.last()?.date;
        let subscription = Subscription {
            merchant,
            amount: cents as f64 / 100.0,
            frequency,
            last_date,
            next_expected_date: next_expected(last_date, frequency),
            confidence,
            transaction_count: txs.len(),
            transaction_ids: txs.iter().map(|t| t.id.clone()).collect(),
            transactions: txs.into_iter().cloned().collect(),
        };
        debug!(
            "Found subscription: {} @ {:.2}/{} (confidence {:.2})",
            subscription.merchant, subscription.amount, subscription.frequency, confidence
        );
        Some(subscription)
    }

    fn classify_interval(&self, mean: f64) -> Option<Frequency> {
        let within = |(low, high): (f64, f64)| mean >= low && mean <= high;
        if within(self.config.weekly_range) {
            Some(Frequency::Weekly)
        } else if within(self.config.monthly_range) {
            Some(Frequency::Monthly)
        } else if within(self.config.yearly_range) {
            Some(Frequency::Yearly)
        } else {
            None
        }
    }

    /// Share of intervals within tolerance of the nominal period
    fn confidence(&self, intervals: &[i64], frequency: Frequency) -> f64 {
        let nominal = frequency.nominal_days() as f64;
        let allowed = nominal * self.config.interval_tolerance;
        let consistent = intervals
            .iter()
            .filter(|&&interval| (interval as f64 - nominal).abs() <= allowed)
            .count();
        consistent as f64 / intervals.len() as f64
    }
}

/// Detect subscriptions with default thresholds
pub fn detect_subscriptions(
    transactions: &[Transaction],
    window: LookbackWindow,
) -> Result<Vec<Subscription>> {
    RecurrenceDetector::new().detect_subscriptions(transactions, window)
}

/// Sum of monthly-normalized subscription costs
pub fn total_monthly_cost(subscriptions: &[Subscription]) -> f64 {
    subscriptions.iter().map(Subscription::monthly_cost).sum()
}

/// Date the next charge is expected. Monthly and yearly charges advance by
/// calendar months so billing days stay put (Jan 31 -> Feb 29 -> Mar 29).
pub fn next_expected(last: NaiveDate, frequency: Frequency) -> NaiveDate {
    let advanced = match frequency {
        Frequency::Weekly => None,
        Frequency::Monthly => last.checked_add_months(Months::new(1)),
        Frequency::Yearly => last.checked_add_months(Months::new(12)),
    };
    advanced.unwrap_or_else(|| last + Duration::days(frequency.nominal_days()))
}

fn latest_date(transactions: &[Transaction]) -> Option<NaiveDate> {
    transactions.iter().map(|t| t.date).max()
}
