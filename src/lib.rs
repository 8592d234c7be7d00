//! # BigQuery Antipattern Checker Library
//!
//! Rule engine that flags cost and performance antipatterns in BigQuery SQL.
//!
//! - [`statement`] - Splitting job text and parsing statements
//! - [`ast`] - Closed expression tree the rules inspect
//! - [`catalog`] - Table metadata snapshot
//! - [`resolver`] - Per-statement symbol table over the catalog
//! - [`rules`] - The built-in antipattern rules
//! - [`evaluator`] - Runs rules on one statement with failure isolation
//! - [`job`] - Folds statement verdicts into per-job rows
//!
//! ```
//! use bq_antipattern_checker::{
//!     catalog::{TableCatalog, TableCatalogEntry},
//!     job::{EngineOptions, JobAggregator},
//!     rules::RuleId
//! };
//! use chrono::NaiveDate;
//!
//! let catalog = TableCatalog::from_entries([
//!     TableCatalogEntry::new("proj.ds.events", 50_000).with_partition("event_date")
//! ]);
//! let now = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
//! let aggregator = JobAggregator::new(EngineOptions::new(now));
//!
//! let verdict = aggregator.process("SELECT * FROM proj.ds.events", &catalog);
//! assert!(verdict.triggered(RuleId::SelectStar));
//! assert!(verdict.triggered(RuleId::PartitionNotUsed));
//! ```

pub mod app;
pub mod ast;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod job;
pub mod output;
pub mod resolver;
pub mod rules;
pub mod statement;
