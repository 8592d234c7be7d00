// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use bq_antipattern_checker::{
    catalog::{TableCatalog, TableCatalogEntry},
    error::AppResult,
    evaluator::Evaluator,
    job::{EngineOptions, JobAggregator},
    resolver::resolve,
    rules::{Rule, RuleContext, RuleId, RuleInfo, RuleVerdict, all_rules},
    statement::parse_fragment
};
use chrono::NaiveDate;

fn now() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn catalog() -> TableCatalog {
    TableCatalog::from_entries([
        TableCatalogEntry::new("proj.ds.big", 50_000)
            .with_partition("dt")
            .with_datetime_columns(["dt"]),
        TableCatalogEntry::new("proj.ds.events_20240101", 4_000)
            .with_partition("event_date")
            .with_datetime_columns(["event_date"]),
        TableCatalogEntry::new("proj.ds.events_20240102", 6_000)
            .with_partition("event_day")
            .with_datetime_columns(["event_day"]),
    ])
}

struct Exploding;

impl Rule for Exploding {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:          RuleId::SelectStar,
            description: "panics on every statement"
        }
    }

    fn check(&self, _ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        panic!("rule bug")
    }
}

const JOB: &str = "WITH c AS (SELECT * FROM proj.ds.big) \
                   SELECT DISTINCT a FROM c JOIN c AS d ON c.a = d.a ORDER BY a; \
                   SELECT * FROM proj.ds.big WHERE REGEXP_CONTAINS(b, 'x')";

#[test]
fn test_determinism() {
    let aggregator = JobAggregator::new(EngineOptions::new(now()));
    let catalog = catalog();
    let first = aggregator.process(JOB, &catalog);
    let second = aggregator.process(JOB, &catalog);
    for id in RuleId::ALL {
        assert_eq!(first.triggered(id), second.triggered(id), "{}", id);
        assert!(first.evidence(id).eq(second.evidence(id)), "{}", id);
    }
}

#[test]
fn test_monotonicity_across_statements() {
    let aggregator = JobAggregator::new(EngineOptions::new(now()));
    let catalog = catalog();
    let statements = [
        "SELECT * FROM proj.ds.big",
        "SELECT a FROM t ORDER BY a",
        "SELECT a FROM proj.ds.big WHERE dt = '2025-05-01' LIMIT 5",
    ];
    for k in 1..statements.len() {
        let before = aggregator.process(&statements[..k].join(";"), &catalog);
        let after = aggregator.process(&statements[..=k].join(";"), &catalog);
        let single = aggregator.process(statements[k], &catalog);
        for id in RuleId::ALL {
            assert_eq!(
                after.triggered(id),
                before.triggered(id) || single.triggered(id),
                "{} after statement {}",
                id,
                k
            );
        }
    }
}

#[test]
fn test_panicking_rule_is_isolated() {
    let catalog = catalog();
    let baseline = JobAggregator::new(EngineOptions::new(now())).process(JOB, &catalog);

    let mut rules: Vec<Box<dyn Rule>> = vec![Box::new(Exploding)];
    rules.extend(all_rules().into_iter().filter(|r| r.info().id != RuleId::SelectStar));
    let aggregator =
        JobAggregator::with_evaluator(Evaluator::with_rules(rules), EngineOptions::new(now()));
    let guarded = aggregator.process(JOB, &catalog);

    assert!(!guarded.triggered(RuleId::SelectStar));
    for id in RuleId::ALL.into_iter().filter(|id| *id != RuleId::SelectStar) {
        assert_eq!(guarded.triggered(id), baseline.triggered(id), "{}", id);
    }
    assert!(guarded.triggered(RuleId::RegexpInWhere));
    assert!(guarded.triggered(RuleId::MultipleCteReference));
}

#[test]
fn test_cte_never_resolves_to_catalog_entry() {
    let catalog = catalog();
    let sql = "WITH `proj.ds.big` AS (SELECT 1 AS x) SELECT x FROM `proj.ds.big`";
    let roots = parse_fragment(sql).unwrap();
    let symbols = resolve(&roots[0], &catalog, 0);
    assert!(symbols.is_empty());

    let verdict = JobAggregator::new(EngineOptions::new(now())).process(sql, &catalog);
    assert!(!verdict.triggered(RuleId::PartitionNotUsed));
    assert!(!verdict.triggered(RuleId::BigTableNoDate));
}

#[test]
fn test_wildcard_resolution_is_idempotent() {
    let catalog = catalog();
    let roots = parse_fragment("SELECT a FROM `proj.ds.events_*`").unwrap();
    let first = resolve(&roots[0], &catalog, 1_000);
    let second = resolve(&roots[0], &catalog, 1_000);

    let a = first.get("proj.ds.events_*").unwrap();
    let b = second.get("proj.ds.events_*").unwrap();
    assert_eq!(a.entry.total_rows, 10_000);
    assert_eq!(a.entry.total_rows, b.entry.total_rows);
    assert_eq!(a.entry.partition_column.as_deref(), Some("event_day"));
    assert_eq!(a.entry.partition_column, b.entry.partition_column);
    assert_eq!(a.entry.datetime_columns, b.entry.datetime_columns);
}
