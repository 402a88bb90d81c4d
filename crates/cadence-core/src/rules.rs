//! Categorization rules and the ordered rule set
//!
//! Each [`RuleDefinition`] is compiled once into a [`CompiledRule`] whose
//! conditions are ready-to-run predicates. The [`RuleSet`] keeps compiled rules
//! ordered by priority (descending), then registration order.
//!
//! Mutations never edit the live list in place: a new ordered list is built and
//! swapped in as a whole, so concurrent readers always see a complete snapshot.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Datelike;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{AmountRange, RuleDefinition, Transaction};

/// Facts about a transaction that come from outside the transaction itself
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchContext<'a> {
    /// Lower-cased merchant keys known to recur
    pub recurring_merchants: Option<&'a HashSet<String>>,
}

impl MatchContext<'_> {
    /// Whether a transaction looks like part of a recurring series
    pub fn looks_recurring(&self, tx: &Transaction) -> bool {
        if tx.has_tag("recurring") {
            return true;
        }
        self.recurring_merchants
            .is_some_and(|set| set.contains(&merchant_key(tx.merchant_or_name())))
    }
}

/// Normalized key used to compare merchants across transactions
pub fn merchant_key(merchant: &str) -> String {
    merchant.trim().to_lowercase()
}

/// A single compiled condition group
#[derive(Debug, Clone)]
enum Condition {
    /// Any pattern matching the lower-cased merchant-or-name
    Merchant(Vec<Regex>),
    /// Any pattern matching the lower-cased description
    Description(Vec<Regex>),
    Amount(AmountRange),
    /// Weekdays as days from Sunday (0..=6)
    DayOfWeek(Vec<u8>),
    DayOfMonth(Vec<u8>),
    Recurring(bool),
}

impl Condition {
    fn matches(&self, tx: &Transaction, ctx: &MatchContext<'_>) -> bool {
        match self {
            Self::Merchant(patterns) => {
                let text = tx.merchant_or_name().to_lowercase();
                patterns.iter().any(|re| re.is_match(&text))
            }
            Self::Description(patterns) => {
                let text = tx.description.to_lowercase();
                patterns.iter().any(|re| re.is_match(&text))
            }
            Self::Amount(range) => range.contains(tx.amount.abs()),
            Self::DayOfWeek(days) => {
                let weekday = tx.date.weekday().num_days_from_sunday() as u8;
                days.contains(&weekday)
            }
            Self::DayOfMonth(days) => days.contains(&(tx.date.day() as u8)),
            Self::Recurring(expected) => ctx.looks_recurring(tx) == *expected,
        }
    }
}

/// A rule with its conditions compiled into predicates
#[derive(Debug, Clone)]
pub struct CompiledRule {
    definition: RuleDefinition,
    conditions: Vec<Condition>,
    /// Registration order, used to break priority ties
    sequence: u64,
}

impl CompiledRule {
    /// Validate and compile a rule definition
    pub fn compile(definition: RuleDefinition, sequence: u64) -> Result<Self> {
        validate_definition(&definition)?;

        let conds = &definition.conditions;
        let mut conditions = Vec::new();

        if !conds.merchant_patterns.is_empty() {
            conditions.push(Condition::Merchant(compile_patterns(
                &definition.id,
                &conds.merchant_patterns,
            )?));
        }
        if !conds.description_patterns.is_empty() {
            conditions.push(Condition::Description(compile_patterns(
                &definition.id,
                &conds.description_patterns,
            )?));
        }
        if let Some(range) = conds.amount_range {
            conditions.push(Condition::Amount(range));
        }
        if let Some(days) = &conds.day_of_week {
            conditions.push(Condition::DayOfWeek(days.clone()));
        }
        if let Some(days) = &conds.day_of_month {
            conditions.push(Condition::DayOfMonth(days.clone()));
        }
        if let Some(recurring) = conds.is_recurring {
            conditions.push(Condition::Recurring(recurring));
        }

        Ok(Self {
            definition,
            conditions,
            sequence,
        })
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn category(&self) -> &str {
        &self.definition.category
    }

    pub fn priority(&self) -> i64 {
        self.definition.priority
    }

    pub fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    /// True when every condition group holds. A rule without conditions
    /// matches everything.
    pub fn matches(&self, tx: &Transaction, ctx: &MatchContext<'_>) -> bool {
        self.conditions.iter().all(|c| c.matches(tx, ctx))
    }
}

fn validate_definition(def: &RuleDefinition) -> Result<()> {
    if def.id.trim().is_empty() {
        return Err(Error::InvalidRule("rule id must not be empty".to_string()));
    }
    if def.category.trim().is_empty() {
        return Err(Error::InvalidRule(format!(
            "rule '{}' has an empty category",
            def.id
        )));
    }

    let conds = &def.conditions;
    if let Some(range) = conds.amount_range {
        let bounds = [range.min, range.max];
        if bounds.iter().flatten().any(|b| !b.is_finite()) {
            return Err(Error::InvalidRule(format!(
                "rule '{}' has a non-finite amount bound",
                def.id
            )));
        }
        if let (Some(min), Some(max)) = (range.min, range.max) {
            if min > max {
                return Err(Error::InvalidRule(format!(
                    "rule '{}' has amount range min {} above max {}",
                    def.id, min, max
                )));
            }
        }
    }
    if let Some(days) = &conds.day_of_week {
        if let Some(bad) = days.iter().find(|d| **d > 6) {
            return Err(Error::InvalidRule(format!(
                "rule '{}' has day of week {} (expected 0-6)",
                def.id, bad
            )));
        }
    }
    if let Some(days) = &conds.day_of_month {
        if let Some(bad) = days.iter().find(|d| !(1..=31).contains(*d)) {
            return Err(Error::InvalidRule(format!(
                "rule '{}' has day of month {} (expected 1-31)",
                def.id, bad
            )));
        }
    }

    Ok(())
}

fn compile_patterns(rule_id: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|source| Error::Regex {
                    rule_id: rule_id.to_string(),
                    source,
                })
        })
        .collect()
}

fn sort_rules(rules: &mut [CompiledRule]) {
    rules.sort_by(|a, b| {
        b.priority()
            .cmp(&a.priority())
            .then_with(|| a.sequence.cmp(&b.sequence))
    });
}

#[derive(Debug, Default)]
struct RuleSetState {
    rules: Arc<Vec<CompiledRule>>,
    next_sequence: u64,
}

/// Ordered, instance-owned collection of compiled rules
#[derive(Debug, Default)]
pub struct RuleSet {
    state: RwLock<RuleSetState>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a rule set from definitions; fails on the first invalid rule
    pub fn from_definitions(definitions: Vec<RuleDefinition>) -> Result<Self> {
        let set = Self::new();
        set.replace_all(definitions)?;
        Ok(set)
    }

    /// Current ordered rules. The snapshot is unaffected by later mutations.
    pub fn snapshot(&self) -> Arc<Vec<CompiledRule>> {
        Arc::clone(&self.read().rules)
    }

    /// Register a rule. Rejects duplicate ids and rules whose patterns fail
    /// to compile; nothing is inserted on failure.
    pub fn add_rule(&self, definition: RuleDefinition) -> Result<()> {
        let mut state = self.write();

        if state.rules.iter().any(|r| r.id() == definition.id) {
            return Err(Error::InvalidRule(format!(
                "rule id '{}' already exists",
                definition.id
            )));
        }

        let compiled = CompiledRule::compile(definition, state.next_sequence)?;
        debug!(
            "Adding rule '{}' -> {} (priority {})",
            compiled.id(),
            compiled.category(),
            compiled.priority()
        );

        let mut rules: Vec<CompiledRule> = state.rules.as_ref().clone();
        rules.push(compiled);
        sort_rules(&mut rules);

        state.next_sequence += 1;
        state.rules = Arc::new(rules);
        Ok(())
    }

    /// Remove a rule by id, returning its definition
    pub fn remove_rule(&self, id: &str) -> Result<RuleDefinition> {
        let mut state = self.write();

        let position = state
            .rules
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| Error::RuleNotFound(id.to_string()))?;

        let mut rules: Vec<CompiledRule> = state.rules.as_ref().clone();
        let removed = rules.remove(position);
        debug!("Removed rule '{}'", removed.id());

        state.rules = Arc::new(rules);
        Ok(removed.definition)
    }

    /// Replace every rule at once. All definitions are validated first;
    /// on any failure the current rules stay untouched.
    pub fn replace_all(&self, definitions: Vec<RuleDefinition>) -> Result<()> {
        let mut seen = HashSet::new();
        for def in &definitions {
            if !seen.insert(def.id.as_str()) {
                return Err(Error::InvalidRule(format!(
                    "rule id '{}' already exists",
                    def.id
                )));
            }
        }

        let mut state = self.write();
        let start = state.next_sequence;
        let count = definitions.len() as u64;

        let mut rules = definitions
            .into_iter()
            .enumerate()
            .map(|(i, def)| CompiledRule::compile(def, start + i as u64))
            .collect::<Result<Vec<_>>>()?;
        sort_rules(&mut rules);

        state.next_sequence = start + count;
        state.rules = Arc::new(rules);
        Ok(())
    }

    /// Rule definitions in evaluation order
    pub fn rules(&self) -> Vec<RuleDefinition> {
        self.snapshot()
            .iter()
            .map(|r| r.definition.clone())
            .collect()
    }

    /// Distinct target categories, in evaluation order
    pub fn categories(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.snapshot()
            .iter()
            .filter(|r| seen.insert(r.category().to_string()))
            .map(|r| r.category().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A poisoned lock still guards a complete list: writers only ever
    // assign a fully built Arc.
    fn read(&self) -> RwLockReadGuard<'_, RuleSetState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RuleSetState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, RuleConditions};
    use chrono::NaiveDate;

    fn rule(id: &str, category: &str, priority: i64, merchants: &[&str]) -> RuleDefinition {
        RuleDefinition {
            id: id.to_string(),
            name: id.to_string(),
            category: category.to_string(),
            priority,
            conditions: RuleConditions {
                merchant_patterns: merchants.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        }
    }

    fn tx(merchant: &str, amount: f64, date: NaiveDate) -> Transaction {
        Transaction {
            id: "t1".to_string(),
            date,
            amount,
            currency: "EUR".to_string(),
            merchant: Some(merchant.to_string()),
            description: merchant.to_string(),
            account: None,
            classification: Classification::Expense,
            category: None,
            tags: vec![],
            excluded: false,
        }
    }

    fn ids(set: &RuleSet) -> Vec<String> {
        set.rules().into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_priority_then_registration_order() {
        let set = RuleSet::new();
        set.add_rule(rule("a", "A", 1, &[])).unwrap();
        set.add_rule(rule("b", "B", 5, &[])).unwrap();
        set.add_rule(rule("c", "C", 1, &[])).unwrap();
        set.add_rule(rule("d", "D", 5, &[])).unwrap();

        assert_eq!(ids(&set), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_order_preserved_after_removal() {
        let set = RuleSet::new();
        set.add_rule(rule("a", "A", 3, &[])).unwrap();
        set.add_rule(rule("b", "B", 3, &[])).unwrap();
        set.add_rule(rule("c", "C", 3, &[])).unwrap();

        set.remove_rule("b").unwrap();
        set.add_rule(rule("b", "B", 3, &[])).unwrap();

        // Re-added rule is registered last
        assert_eq!(ids(&set), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let set = RuleSet::new();
        set.add_rule(rule("a", "A", 1, &[])).unwrap();
        let err = set.add_rule(rule("a", "Other", 9, &[])).unwrap_err();
        assert!(matches!(err, Error::InvalidRule(_)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.rules()[0].category, "A");
    }

    #[test]
    fn test_bad_pattern_rejects_whole_rule() {
        let set = RuleSet::new();
        let err = set
            .add_rule(rule("bad", "A", 1, &["netflix", "spotify("]))
            .unwrap_err();
        assert!(matches!(err, Error::Regex { ref rule_id, .. } if rule_id == "bad"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_invalid_days_rejected() {
        let mut def = rule("days", "A", 1, &[]);
        def.conditions.day_of_week = Some(vec![7]);
        assert!(CompiledRule::compile(def, 0).is_err());

        let mut def = rule("dom", "A", 1, &[]);
        def.conditions.day_of_month = Some(vec![0]);
        assert!(CompiledRule::compile(def, 0).is_err());
    }

    #[test]
    fn test_inverted_amount_range_rejected() {
        let mut def = rule("range", "A", 1, &[]);
        def.conditions.amount_range = Some(AmountRange {
            min: Some(300.0),
            max: Some(10.0),
        });
        assert!(matches!(
            CompiledRule::compile(def, 0),
            Err(Error::InvalidRule(_))
        ));
    }

    #[test]
    fn test_remove_unknown_rule() {
        let set = RuleSet::new();
        assert!(matches!(
            set.remove_rule("missing"),
            Err(Error::RuleNotFound(_))
        ));
    }

    #[test]
    fn test_replace_all_is_atomic() {
        let set = RuleSet::new();
        set.add_rule(rule("keep", "Keep", 1, &[])).unwrap();

        let result = set.replace_all(vec![
            rule("x", "X", 1, &["ok"]),
            rule("y", "Y", 2, &["broken["]),
        ]);
        assert!(result.is_err());
        assert_eq!(ids(&set), vec!["keep"]);

        let result = set.replace_all(vec![rule("x", "X", 1, &[]), rule("x", "X", 2, &[])]);
        assert!(result.is_err());
        assert_eq!(ids(&set), vec!["keep"]);

        set.replace_all(vec![rule("x", "X", 1, &[]), rule("y", "Y", 2, &[])])
            .unwrap();
        assert_eq!(ids(&set), vec!["y", "x"]);
    }

    #[test]
    fn test_snapshot_isolated_from_mutation() {
        let set = RuleSet::new();
        set.add_rule(rule("a", "A", 1, &[])).unwrap();
        let snapshot = set.snapshot();

        set.add_rule(rule("b", "B", 2, &[])).unwrap();
        set.remove_rule("a").unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), "a");
        assert_eq!(ids(&set), vec!["b"]);
    }

    #[test]
    fn test_condition_groups_are_anded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(); // Friday
        let mut def = rule("combo", "Required Purchases", 1, &["albert heijn", "jumbo"]);
        def.conditions.amount_range = Some(AmountRange {
            min: Some(10.0),
            max: Some(300.0),
        });
        def.conditions.day_of_week = Some(vec![5]);
        def.conditions.day_of_month = Some(vec![15]);
        let compiled = CompiledRule::compile(def, 0).unwrap();
        let ctx = MatchContext::default();

        assert!(compiled.matches(&tx("Albert Heijn 1234", -45.0, date), &ctx));
        assert!(compiled.matches(&tx("JUMBO Utrecht", -10.0, date), &ctx));
        assert!(!compiled.matches(&tx("Albert Heijn", -5.0, date), &ctx));
        assert!(!compiled.matches(&tx("Lidl", -45.0, date), &ctx));
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
        assert!(!compiled.matches(&tx("Albert Heijn", -45.0, saturday), &ctx));
    }

    #[test]
    fn test_merchant_falls_back_to_description() {
        let compiled = CompiledRule::compile(rule("r", "A", 1, &["^coffee"]), 0).unwrap();
        let mut t = tx("", -4.0, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        t.merchant = None;
        t.description = "COFFEE CORNER".to_string();
        assert!(compiled.matches(&t, &MatchContext::default()));
    }

    #[test]
    fn test_description_patterns() {
        let mut def = rule("desc", "A", 1, &[]);
        def.conditions.description_patterns = vec!["rent\\s+\\w+".to_string()];
        let compiled = CompiledRule::compile(def, 0).unwrap();
        let mut t = tx("Landlord BV", -900.0, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        t.description = "Rent March".to_string();
        assert!(compiled.matches(&t, &MatchContext::default()));
        t.description = "Deposit".to_string();
        assert!(!compiled.matches(&t, &MatchContext::default()));
    }

    #[test]
    fn test_recurring_condition() {
        let mut def = rule("rec", "Subscriptions", 1, &[]);
        def.conditions.is_recurring = Some(true);
        let compiled = CompiledRule::compile(def, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let plain = tx("Netflix", -11.99, date);
        assert!(!compiled.matches(&plain, &MatchContext::default()));

        let mut tagged = plain.clone();
        tagged.tags = vec!["Recurring".to_string()];
        assert!(compiled.matches(&tagged, &MatchContext::default()));

        let known: HashSet<String> = ["netflix".to_string()].into_iter().collect();
        let ctx = MatchContext {
            recurring_merchants: Some(&known),
        };
        assert!(compiled.matches(&plain, &ctx));
    }

    #[test]
    fn test_categories_distinct() {
        let set = RuleSet::from_definitions(vec![
            rule("a", "Groceries", 1, &[]),
            rule("b", "Fun", 2, &[]),
            rule("c", "Groceries", 3, &[]),
        ])
        .unwrap();
        assert_eq!(set.categories(), vec!["Groceries", "Fun"]);
    }

    #[test]
    fn test_concurrent_reads_see_complete_lists() {
        let set = Arc::new(RuleSet::new());
        let writer = {
            let set = Arc::clone(&set);
            std::thread::spawn(move || {
                for i in 0..50 {
                    set.add_rule(rule(&format!("r{}", i), "A", i % 5, &[]))
                        .unwrap();
                }
            })
        };

        for _ in 0..50 {
            let snapshot = set.snapshot();
            let ordered = snapshot.windows(2).all(|w| {
                w[0].priority() > w[1].priority()
                    || (w[0].priority() == w[1].priority() && w[0].sequence < w[1].sequence)
            });
            assert!(ordered);
        }

        writer.join().unwrap();
        assert_eq!(set.len(), 50);
    }
}
