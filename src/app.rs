//! Application logic for the BigQuery Antipattern Checker CLI.
//!
//! This module contains the command implementations separated from the main
//! entry point to enable testing. Each command returns a [`CommandOutput`];
//! `main` prints it and exits with its code.

mod helpers;
mod run;
mod types;

pub use helpers::{
    calculate_exit_code, convert_format, create_output_options, job_progress_bar,
    read_sql_input, write_output
};
pub use run::{create_config, list_rules, run_check, run_jobs, show_config};
pub use types::{CheckParams, CommandOutput, RunParams};
