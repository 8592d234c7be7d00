//! Antipattern rule set.
//!
//! Each rule is a stateless detector implementing [`Rule`]: it inspects one
//! lowered statement together with the statement's [`SymbolTable`] and the
//! configured [`Thresholds`], and returns a [`RuleVerdict`].
//!
//! # Rules
//!
//! | Id | Module | Needs catalog |
//! |----|--------|---------------|
//! | `select_star` | shape | no |
//! | `semi_join_without_aggregation` | shape | no |
//! | `order_without_limit` | shape | no |
//! | `regexp_in_where` | predicates | no |
//! | `like_before_more_selective` | predicates | no |
//! | `multiple_cte_reference` | shape | no |
//! | `partition_not_used` | catalog_aware | yes |
//! | `big_date_range` | dates | no |
//! | `big_table_no_date` | dates | yes |
//! | `unpartitioned_tables` | catalog_aware | yes |
//! | `distinct_on_big_table` | catalog_aware | yes |
//! | `count_distinct_on_big_table` | catalog_aware | yes |
//!
//! # Failure Model
//!
//! A rule may return an error (or even panic) on a statement shape it cannot
//! reason about. The [`Evaluator`](crate::evaluator::Evaluator) turns both
//! into a non-triggered verdict, so one rule never affects another.
//!
//! # Implementing a Rule
//!
//! ```
//! use bq_antipattern_checker::{
//!     ast::Kind,
//!     error::AppResult,
//!     rules::{Rule, RuleContext, RuleId, RuleInfo, RuleVerdict}
//! };
//!
//! struct HasHaving;
//!
//! impl Rule for HasHaving {
//!     fn info(&self) -> RuleInfo {
//!         RuleInfo {
//!             id:          RuleId::SelectStar,
//!             description: "Flags HAVING clauses"
//!         }
//!     }
//!
//!     fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
//!         Ok(RuleVerdict::flag(self.info().id, ctx.root.contains(Kind::Having)))
//!     }
//! }
//! ```

mod catalog_aware;
mod dates;
mod predicates;
mod shape;
mod types;

use chrono::NaiveDate;
pub use types::{Evidence, RuleId, RuleInfo, RuleVerdict, Thresholds};

use crate::{
    ast::Node,
    catalog::TableCatalog,
    error::AppResult,
    resolver::{SymbolTable, resolve}
};

/// Everything a rule may look at for one statement.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub root:       &'a Node,
    /// Tables admitted at the large-table threshold
    pub symbols:    &'a SymbolTable,
    pub catalog:    &'a TableCatalog,
    pub thresholds: Thresholds,
    /// Reference date for literal date bounds
    pub now:        NaiveDate
}

impl RuleContext<'_> {
    /// Resolve the statement again with a different row-count threshold.
    pub fn resolve_at(&self, min_rows: u64) -> SymbolTable {
        resolve(self.root, self.catalog, min_rows)
    }
}

/// Trait for antipattern detectors.
///
/// Rules are stateless and must be `Send + Sync` so jobs can be evaluated in
/// parallel.
pub trait Rule: Send + Sync {
    /// Returns metadata about this rule.
    fn info(&self) -> RuleInfo;

    /// Inspects one statement.
    ///
    /// # Errors
    ///
    /// Returns a rule error when the statement has a shape the rule cannot
    /// interpret (for example an unknown date unit).
    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict>;
}

/// Every built-in rule in registration order.
pub fn all_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(shape::SelectStar),
        Box::new(shape::SemiJoinWithoutAggregation),
        Box::new(shape::OrderWithoutLimit),
        Box::new(predicates::RegexpInWhere),
        Box::new(predicates::LikeBeforeMoreSelective),
        Box::new(shape::MultipleCteReference),
        Box::new(catalog_aware::PartitionNotUsed),
        Box::new(dates::BigDateRange),
        Box::new(dates::BigTableNoDate),
        Box::new(catalog_aware::UnpartitionedTables),
        Box::new(catalog_aware::DistinctOnBigTable),
        Box::new(catalog_aware::CountDistinctOnBigTable),
    ]
}

/// Metadata of every built-in rule.
pub fn rule_infos() -> Vec<RuleInfo> {
    RuleId::ALL
        .into_iter()
        .map(|id| RuleInfo {
            id,
            description: id.description()
        })
        .collect()
}

/// Identifier names that suggest a date, time or partition column.
pub(crate) fn is_date_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("date") || lower.contains("time") || lower.contains("partition")
}

fn info_for(id: RuleId) -> RuleInfo {
    RuleInfo {
        id,
        description: id.description()
    }
}
