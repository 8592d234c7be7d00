//! Job aggregation.
//!
//! A job is a block of SQL text holding any number of statements. The
//! [`JobAggregator`] splits it, skips fragments that cannot be analyzed,
//! parses and evaluates every remaining statement, and folds the verdicts
//! into one [`JobVerdict`]:
//!
//! ```text
//! job text ──▶ split ──▶ classify ──▶ parse ──▶ resolve ──▶ evaluate ──▶ merge
//!                           │            │
//!                         skip      warn + skip
//! ```
//!
//! Statements within a job run sequentially. Jobs are independent and
//! [`JobAggregator::process_all`] evaluates them in parallel with [`rayon`],
//! sharing the catalog read-only.

mod types;

use std::{fs, path::Path, time::Instant};

use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{debug, warn};
pub use types::{AvailablePartition, EngineOptions, JobMetadata, JobRecord, JobRow, JobVerdict, SENTINEL};

use crate::{
    catalog::TableCatalog,
    error::{AppResult, file_read_error, jobs_error},
    evaluator::Evaluator,
    resolver::resolve,
    rules::RuleContext,
    statement::{Fragment, classify, parse_fragment, split_statements}
};

/// Evaluates jobs against a fixed rule set and engine options.
pub struct JobAggregator {
    evaluator: Evaluator,
    options:   EngineOptions
}

impl JobAggregator {
    /// Aggregator running the rules enabled in `options`.
    pub fn new(options: EngineOptions) -> Self {
        let evaluator = Evaluator::with_enabled(&options.enabled);
        Self::with_evaluator(evaluator, options)
    }

    /// Aggregator with an explicit evaluator; `options.enabled` is ignored.
    pub fn with_evaluator(evaluator: Evaluator, options: EngineOptions) -> Self {
        Self {
            evaluator,
            options
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Evaluate raw job text as a single job.
    pub fn process(&self, text: &str, catalog: &TableCatalog) -> JobVerdict {
        self.accumulate("-", text, catalog)
    }

    /// Evaluate one job record and finalize it into an output row.
    pub fn process_job(&self, record: &JobRecord, catalog: &TableCatalog) -> JobRow {
        let started = Instant::now();
        let verdict = self.accumulate(&record.job_id, &record.query, catalog);
        JobRow::from_verdict(record, &verdict, started.elapsed().as_secs_f64())
    }

    /// Evaluate every job in parallel. Rows keep the input order.
    pub fn process_all(
        &self,
        records: &[JobRecord],
        catalog: &TableCatalog,
        progress: Option<&ProgressBar>
    ) -> Vec<JobRow> {
        records
            .par_iter()
            .map(|record| {
                let row = self.process_job(record, catalog);
                if let Some(bar) = progress {
                    bar.inc(1);
                }
                row
            })
            .collect()
    }

    fn accumulate(&self, job_id: &str, text: &str, catalog: &TableCatalog) -> JobVerdict {
        let thresholds = self.options.thresholds;
        let mut verdict = JobVerdict::new();
        for fragment in split_statements(text) {
            let sql = match classify(fragment) {
                Fragment::Analyze(sql) => sql,
                Fragment::Skip(reason) => {
                    debug!(job_id, %reason, "skipping statement");
                    continue;
                }
            };
            let roots = match parse_fragment(sql) {
                Ok(roots) => roots,
                Err(error) => {
                    verdict.parse_errors += 1;
                    warn!(job_id, %error, "statement failed to parse, skipping");
                    continue;
                }
            };
            for root in &roots {
                verdict.statements += 1;
                let symbols = resolve(root, catalog, thresholds.large_table_row_count);
                let ctx = RuleContext {
                    root,
                    symbols: &symbols,
                    catalog,
                    thresholds,
                    now: self.options.now
                };
                verdict.merge_all(self.evaluator.evaluate(&ctx, sql).into_values());
            }
        }
        debug!(
            job_id,
            statements = verdict.statements,
            parse_errors = verdict.parse_errors,
            "job evaluated"
        );
        verdict
    }
}

/// Load job records from a JSON or YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a list of jobs.
pub fn load_jobs(path: &Path) -> AppResult<Vec<JobRecord>> {
    let content =
        fs::read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))?;
    let jobs = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => jobs_from_yaml_str(&content)?,
        _ => jobs_from_json_str(&content)?
    };
    debug!(path = %path.display(), jobs = jobs.len(), "loaded jobs");
    Ok(jobs)
}

pub fn jobs_from_json_str(content: &str) -> AppResult<Vec<JobRecord>> {
    serde_json::from_str(content).map_err(|e| jobs_error(e.to_string()))
}

pub fn jobs_from_yaml_str(content: &str) -> AppResult<Vec<JobRecord>> {
    serde_yaml::from_str(content).map_err(|e| jobs_error(e.to_string()))
}
