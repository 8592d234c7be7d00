//! Statement evaluator.
//!
//! Runs every enabled rule against one lowered statement. A rule that returns
//! an error or panics is logged and recorded as a non-triggered verdict; the
//! remaining rules still run.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe}
};

use indexmap::IndexMap;
use tracing::warn;

use crate::rules::{Rule, RuleContext, RuleId, RuleVerdict, all_rules};

/// Ordered set of rules applied to each statement.
pub struct Evaluator {
    rules: Vec<Box<dyn Rule>>
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Evaluator with every built-in rule
    pub fn new() -> Self {
        Self::with_rules(all_rules())
    }

    /// Evaluator restricted to the given rule ids, in registration order
    pub fn with_enabled(enabled: &[RuleId]) -> Self {
        let rules = all_rules()
            .into_iter()
            .filter(|rule| enabled.contains(&rule.info().id))
            .collect();
        Self::with_rules(rules)
    }

    /// Evaluator over an explicit rule list
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self {
            rules
        }
    }

    /// Ids of the rules this evaluator runs.
    pub fn rule_ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.rules.iter().map(|rule| rule.info().id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule on one statement.
    ///
    /// `statement` is the source text, used only for log context. The result
    /// holds one verdict per rule, keyed by rule id in rule order.
    pub fn evaluate(&self, ctx: &RuleContext<'_>, statement: &str) -> IndexMap<RuleId, RuleVerdict> {
        self.rules
            .iter()
            .map(|rule| {
                let verdict = run_guarded(rule.as_ref(), ctx, statement);
                (verdict.rule_id, verdict)
            })
            .collect()
    }
}

fn run_guarded(rule: &dyn Rule, ctx: &RuleContext<'_>, statement: &str) -> RuleVerdict {
    let id = rule.info().id;
    match panic::catch_unwind(AssertUnwindSafe(|| rule.check(ctx))) {
        Ok(Ok(verdict)) => RuleVerdict {
            rule_id: id,
            ..verdict
        },
        Ok(Err(error)) => {
            warn!(rule = %id, statement, %error, "rule failed, recording as not triggered");
            RuleVerdict::clear(id)
        }
        Err(payload) => {
            warn!(
                rule = %id,
                statement,
                panic = panic_message(payload.as_ref()),
                "rule panicked, recording as not triggered"
            );
            RuleVerdict::clear(id)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{AppResult, rule_error},
        resolver::resolve,
        rules::{
            RuleInfo, Thresholds,
            test_support::{catalog, now, parse}
        }
    };

    struct Failing;

    impl Rule for Failing {
        fn info(&self) -> RuleInfo {
            RuleInfo {
                id:          RuleId::BigDateRange,
                description: "always fails"
            }
        }

        fn check(&self, _ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
            Err(rule_error("big_date_range", "unsupported shape"))
        }
    }

    struct Panicking;

    impl Rule for Panicking {
        fn info(&self) -> RuleInfo {
            RuleInfo {
                id:          RuleId::RegexpInWhere,
                description: "always panics"
            }
        }

        fn check(&self, _ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
            panic!("unexpected node")
        }
    }

    fn evaluate(evaluator: &Evaluator, sql: &str) -> IndexMap<RuleId, RuleVerdict> {
        let root = parse(sql);
        let catalog = catalog();
        let thresholds = Thresholds::default();
        let symbols = resolve(&root, &catalog, thresholds.large_table_row_count);
        let ctx = RuleContext {
            root: &root,
            symbols: &symbols,
            catalog: &catalog,
            thresholds,
            now: now()
        };
        evaluator.evaluate(&ctx, sql)
    }

    #[test]
    fn test_all_rules_produce_a_verdict() {
        let verdicts = evaluate(&Evaluator::new(), "SELECT * FROM proj.ds.big");
        assert_eq!(verdicts.len(), RuleId::ALL.len());
        assert!(verdicts[&RuleId::SelectStar].triggered);
        assert!(!verdicts[&RuleId::OrderWithoutLimit].triggered);
    }

    #[test]
    fn test_with_enabled_keeps_registration_order() {
        let evaluator =
            Evaluator::with_enabled(&[RuleId::CountDistinctOnBigTable, RuleId::SelectStar]);
        let ids: Vec<_> = evaluator.rule_ids().collect();
        assert_eq!(ids, vec![RuleId::SelectStar, RuleId::CountDistinctOnBigTable]);
    }

    #[test]
    fn test_error_and_panic_become_clear_verdicts() {
        let evaluator = Evaluator::with_rules(vec![
            Box::new(Failing),
            Box::new(Panicking),
            all_rules().remove(0),
        ]);
        let verdicts = evaluate(&evaluator, "SELECT * FROM proj.ds.big WHERE REGEXP_CONTAINS(a, 'x')");
        assert_eq!(verdicts[&RuleId::BigDateRange], RuleVerdict::clear(RuleId::BigDateRange));
        assert_eq!(verdicts[&RuleId::RegexpInWhere], RuleVerdict::clear(RuleId::RegexpInWhere));
        assert!(verdicts[&RuleId::SelectStar].triggered);
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
