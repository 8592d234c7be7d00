//! Job-level data structures.
//!
//! - [`JobRecord`] - One job read from the jobs file
//! - [`JobVerdict`] - Per-rule state accumulated over a job's statements
//! - [`JobRow`] - Flat output row produced from a finished job

use chrono::NaiveDate;
use compact_str::CompactString;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::rules::{Evidence, RuleId, RuleVerdict, Thresholds};

/// Placeholder written into evidence lists of rules that did not trigger.
pub const SENTINEL: &str = "-";

/// Job metadata carried through to the output row untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default)]
    pub creation_date:       Option<String>,
    #[serde(default)]
    pub creation_time:       Option<String>,
    #[serde(default)]
    pub project_id:          Option<String>,
    #[serde(default)]
    pub user_email:          Option<String>,
    #[serde(default)]
    pub reservation_id:      Option<String>,
    #[serde(default)]
    pub total_process_gb:    Option<f64>,
    #[serde(default)]
    pub total_slot_hrs:      Option<f64>,
    #[serde(default)]
    pub total_duration_mins: Option<f64>
}

/// A single warehouse job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id:   String,
    pub query:    String,
    #[serde(flatten)]
    pub metadata: JobMetadata
}

impl JobRecord {
    pub fn new(job_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            job_id:   job_id.into(),
            query:    query.into(),
            metadata: JobMetadata::default()
        }
    }
}

/// Engine settings shared by every job of a run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub thresholds: Thresholds,
    /// Rules to evaluate, in any order
    pub enabled:    Vec<RuleId>,
    /// Reference date for literal date bounds
    pub now:        NaiveDate
}

impl EngineOptions {
    /// All rules enabled with default thresholds.
    pub fn new(now: NaiveDate) -> Self {
        Self {
            thresholds: Thresholds::default(),
            enabled: RuleId::ALL.to_vec(),
            now
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_enabled(mut self, enabled: Vec<RuleId>) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, Default)]
struct RuleState {
    triggered: bool,
    evidence:  IndexMap<CompactString, Evidence>
}

/// Accumulated outcome of every rule over the statements of one job.
///
/// Merging is monotonic: a triggered rule never reverts, and evidence is a
/// union keyed by [`Evidence::key`] that keeps first-seen order.
#[derive(Debug, Clone)]
pub struct JobVerdict {
    rules:            IndexMap<RuleId, RuleState>,
    pub statements:   usize,
    pub parse_errors: usize
}

impl Default for JobVerdict {
    fn default() -> Self {
        Self::new()
    }
}

impl JobVerdict {
    pub fn new() -> Self {
        Self {
            rules:        RuleId::ALL
                .into_iter()
                .map(|id| (id, RuleState::default()))
                .collect(),
            statements:   0,
            parse_errors: 0
        }
    }

    /// Fold one statement-level verdict into the job.
    pub fn merge(&mut self, verdict: RuleVerdict) {
        let state = self.rules.entry(verdict.rule_id).or_default();
        state.triggered |= verdict.triggered;
        for evidence in verdict.evidence {
            state
                .evidence
                .entry(CompactString::from(evidence.key()))
                .or_insert(evidence);
        }
    }

    pub fn merge_all(&mut self, verdicts: impl IntoIterator<Item = RuleVerdict>) {
        for verdict in verdicts {
            self.merge(verdict);
        }
    }

    pub fn triggered(&self, id: RuleId) -> bool {
        self.rules.get(&id).is_some_and(|state| state.triggered)
    }

    pub fn evidence(&self, id: RuleId) -> impl Iterator<Item = &Evidence> {
        self.rules
            .get(&id)
            .into_iter()
            .flat_map(|state| state.evidence.values())
    }

    /// Triggered rules in registration order.
    pub fn triggered_rules(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.rules
            .iter()
            .filter(|(_, state)| state.triggered)
            .map(|(id, _)| *id)
    }

    pub fn any_triggered(&self) -> bool {
        self.triggered_rules().next().is_some()
    }
}

/// One `available_partitions` entry of the output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailablePartition {
    pub table_name:         String,
    pub partitioned_column: String
}

impl AvailablePartition {
    fn sentinel() -> Self {
        Self {
            table_name:         SENTINEL.to_string(),
            partitioned_column: SENTINEL.to_string()
        }
    }
}

/// Flat, serializable result of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRow {
    pub job_id:                        String,
    #[serde(flatten)]
    pub metadata:                      JobMetadata,
    pub query:                         String,
    pub select_star:                   bool,
    pub semi_join_without_aggregation: bool,
    pub order_without_limit:           bool,
    pub regexp_in_where:               bool,
    pub like_before_more_selective:    bool,
    pub references_cte_multiple_times: bool,
    pub partition_not_used:            bool,
    pub available_partitions:          Vec<AvailablePartition>,
    pub big_date_range:                bool,
    pub no_date_on_big_table:          bool,
    pub tables_without_date_filter:    Vec<String>,
    pub queries_unpartitioned_table:   bool,
    pub unpartitioned_tables:          Vec<String>,
    pub distinct_on_big_table:         bool,
    pub count_distinct_on_big_table:   bool,
    /// Seconds spent evaluating the job
    pub antipattern_run_time:          f64
}

impl JobRow {
    /// Finalize a job: copy flags, flatten evidence and apply sentinels.
    pub fn from_verdict(record: &JobRecord, verdict: &JobVerdict, run_time: f64) -> Self {
        let partitions: Vec<AvailablePartition> = verdict
            .evidence(RuleId::PartitionNotUsed)
            .filter_map(|evidence| match evidence {
                Evidence::Partition {
                    table_name,
                    partitioned_column
                } => Some(AvailablePartition {
                    table_name:         table_name.to_string(),
                    partitioned_column: partitioned_column.to_string()
                }),
                _ => None
            })
            .collect();
        Self {
            job_id: record.job_id.clone(),
            metadata: record.metadata.clone(),
            query: record.query.clone(),
            select_star: verdict.triggered(RuleId::SelectStar),
            semi_join_without_aggregation: verdict.triggered(RuleId::SemiJoinWithoutAggregation),
            order_without_limit: verdict.triggered(RuleId::OrderWithoutLimit),
            regexp_in_where: verdict.triggered(RuleId::RegexpInWhere),
            like_before_more_selective: verdict.triggered(RuleId::LikeBeforeMoreSelective),
            references_cte_multiple_times: verdict.triggered(RuleId::MultipleCteReference),
            partition_not_used: verdict.triggered(RuleId::PartitionNotUsed),
            available_partitions: if partitions.is_empty() {
                vec![AvailablePartition::sentinel()]
            } else {
                partitions
            },
            big_date_range: verdict.triggered(RuleId::BigDateRange),
            no_date_on_big_table: verdict.triggered(RuleId::BigTableNoDate),
            tables_without_date_filter: table_names(verdict, RuleId::BigTableNoDate),
            queries_unpartitioned_table: verdict.triggered(RuleId::UnpartitionedTables),
            unpartitioned_tables: table_names(verdict, RuleId::UnpartitionedTables),
            distinct_on_big_table: verdict.triggered(RuleId::DistinctOnBigTable),
            count_distinct_on_big_table: verdict.triggered(RuleId::CountDistinctOnBigTable),
            antipattern_run_time: run_time
        }
    }

    /// Boolean output field of a rule.
    pub fn flag(&self, id: RuleId) -> bool {
        match id {
            RuleId::SelectStar => self.select_star,
            RuleId::SemiJoinWithoutAggregation => self.semi_join_without_aggregation,
            RuleId::OrderWithoutLimit => self.order_without_limit,
            RuleId::RegexpInWhere => self.regexp_in_where,
            RuleId::LikeBeforeMoreSelective => self.like_before_more_selective,
            RuleId::MultipleCteReference => self.references_cte_multiple_times,
            RuleId::PartitionNotUsed => self.partition_not_used,
            RuleId::BigDateRange => self.big_date_range,
            RuleId::BigTableNoDate => self.no_date_on_big_table,
            RuleId::UnpartitionedTables => self.queries_unpartitioned_table,
            RuleId::DistinctOnBigTable => self.distinct_on_big_table,
            RuleId::CountDistinctOnBigTable => self.count_distinct_on_big_table
        }
    }

    /// Triggered rules in registration order.
    pub fn triggered_rules(&self) -> Vec<RuleId> {
        RuleId::ALL
            .into_iter()
            .filter(|id| self.flag(*id))
            .collect()
    }

    /// Evidence lines for a triggered rule, empty for flag-only rules.
    pub fn evidence_lines(&self, id: RuleId) -> Vec<String> {
        match id {
            RuleId::PartitionNotUsed => self
                .available_partitions
                .iter()
                .map(|p| format!("{} (partitioned by {})", p.table_name, p.partitioned_column))
                .collect(),
            RuleId::BigTableNoDate => self.tables_without_date_filter.clone(),
            RuleId::UnpartitionedTables => self.unpartitioned_tables.clone(),
            _ => Vec::new()
        }
    }
}

fn table_names(verdict: &JobVerdict, id: RuleId) -> Vec<String> {
    let names: Vec<String> = verdict
        .evidence(id)
        .map(|evidence| evidence.key().to_string())
        .collect();
    if names.is_empty() {
        vec![SENTINEL.to_string()]
    } else {
        names
    }
}
