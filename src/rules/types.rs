//! Type definitions for the antipattern rule system.
//!
//! This module defines the core types shared by every rule:
//! - [`RuleId`] - Stable identifiers of the built-in antipatterns
//! - [`Thresholds`] - Row-count limits that make a table "big"
//! - [`Evidence`] - Structured facts attached to a triggered verdict
//! - [`RuleVerdict`] - Outcome of one rule on one statement

use std::{fmt, str::FromStr};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, config_error};

/// Identifier of a built-in antipattern rule.
///
/// Declaration order is the registration order of the rule set and the
/// column order of job output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    SelectStar,
    SemiJoinWithoutAggregation,
    OrderWithoutLimit,
    RegexpInWhere,
    LikeBeforeMoreSelective,
    MultipleCteReference,
    PartitionNotUsed,
    BigDateRange,
    BigTableNoDate,
    UnpartitionedTables,
    DistinctOnBigTable,
    CountDistinctOnBigTable
}

impl RuleId {
    /// Every rule id in registration order.
    pub const ALL: [RuleId; 12] = [
        Self::SelectStar,
        Self::SemiJoinWithoutAggregation,
        Self::OrderWithoutLimit,
        Self::RegexpInWhere,
        Self::LikeBeforeMoreSelective,
        Self::MultipleCteReference,
        Self::PartitionNotUsed,
        Self::BigDateRange,
        Self::BigTableNoDate,
        Self::UnpartitionedTables,
        Self::DistinctOnBigTable,
        Self::CountDistinctOnBigTable
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelectStar => "select_star",
            Self::SemiJoinWithoutAggregation => "semi_join_without_aggregation",
            Self::OrderWithoutLimit => "order_without_limit",
            Self::RegexpInWhere => "regexp_in_where",
            Self::LikeBeforeMoreSelective => "like_before_more_selective",
            Self::MultipleCteReference => "multiple_cte_reference",
            Self::PartitionNotUsed => "partition_not_used",
            Self::BigDateRange => "big_date_range",
            Self::BigTableNoDate => "big_table_no_date",
            Self::UnpartitionedTables => "unpartitioned_tables",
            Self::DistinctOnBigTable => "distinct_on_big_table",
            Self::CountDistinctOnBigTable => "count_distinct_on_big_table"
        }
    }

    /// Default human-readable description used in config and listings.
    pub fn description(self) -> &'static str {
        match self {
            Self::SelectStar => "Check for SELECT * statements",
            Self::SemiJoinWithoutAggregation => "Check for semi-joins without aggregation",
            Self::OrderWithoutLimit => "Check for ORDER BY without LIMIT",
            Self::RegexpInWhere => "Check for REGEXP functions in WHERE clauses",
            Self::LikeBeforeMoreSelective => {
                "Check for LIKE conditions before more selective conditions"
            }
            Self::MultipleCteReference => "Check for CTEs referenced multiple times",
            Self::PartitionNotUsed => "Check if partitioned tables are properly filtered",
            Self::BigDateRange => "Check for date ranges larger than 365 days",
            Self::BigTableNoDate => "Check for queries on large tables without date filters",
            Self::UnpartitionedTables => "Check for queries on large unpartitioned tables",
            Self::DistinctOnBigTable => "Check for DISTINCT on large tables",
            Self::CountDistinctOnBigTable => "Check for COUNT DISTINCT on large tables"
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RuleId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| config_error(format!("Unknown antipattern '{}'", s)))
    }
}

/// Row-count limits consulted by size-sensitive rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Tables below this row count are invisible to the resolver
    pub large_table_row_count:       u64,
    /// Row count at which DISTINCT becomes an antipattern
    pub distinct_function_row_count: u64
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            large_table_row_count:       1000,
            distinct_function_row_count: 10000
        }
    }
}

/// A structured fact explaining why a rule triggered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Evidence {
    /// A table implicated by the rule
    Table {
        table: CompactString
    },
    /// A partitioned table whose partition column was never filtered
    Partition {
        table_name:         CompactString,
        partitioned_column: CompactString
    },
    /// A CTE referenced more than once
    Cte {
        cte: CompactString
    }
}

impl Evidence {
    pub fn table(name: impl Into<CompactString>) -> Self {
        Self::Table {
            table: name.into()
        }
    }

    pub fn partition(table: impl Into<CompactString>, column: impl Into<CompactString>) -> Self {
        Self::Partition {
            table_name:         table.into(),
            partitioned_column: column.into()
        }
    }

    pub fn cte(name: impl Into<CompactString>) -> Self {
        Self::Cte {
            cte: name.into()
        }
    }

    /// Natural key used to de-duplicate evidence across statements.
    pub fn key(&self) -> &str {
        match self {
            Self::Table {
                table
            } => table,
            Self::Partition {
                table_name, ..
            } => table_name,
            Self::Cte {
                cte
            } => cte
        }
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table {
                table
            } => write!(f, "{}", table),
            Self::Partition {
                table_name,
                partitioned_column
            } => write!(f, "{} (partitioned by {})", table_name, partitioned_column),
            Self::Cte {
                cte
            } => write!(f, "CTE {}", cte)
        }
    }
}

/// Outcome of a single rule on a single statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleVerdict {
    pub rule_id:   RuleId,
    pub triggered: bool,
    pub evidence:  Vec<Evidence>
}

impl RuleVerdict {
    /// Verdict for a rule that found nothing.
    pub fn clear(rule_id: RuleId) -> Self {
        Self {
            rule_id,
            triggered: false,
            evidence: Vec::new()
        }
    }

    /// Verdict with a bare boolean outcome.
    pub fn flag(rule_id: RuleId, triggered: bool) -> Self {
        Self {
            rule_id,
            triggered,
            evidence: Vec::new()
        }
    }

    /// Verdict that triggers exactly when evidence was collected.
    pub fn from_evidence(rule_id: RuleId, evidence: Vec<Evidence>) -> Self {
        Self {
            rule_id,
            triggered: !evidence.is_empty(),
            evidence
        }
    }
}

/// Metadata about a rule for identification and configuration.
#[derive(Debug, Clone, Copy)]
pub struct RuleInfo {
    pub id:          RuleId,
    pub description: &'static str
}
