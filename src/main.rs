//! # BigQuery Antipattern Checker
//!
//! Static detection of cost and performance antipatterns in BigQuery SQL
//! jobs.
//!
//! The checker reads a list of warehouse jobs and a table catalog (row
//! counts, partition columns and date columns per table), parses every
//! statement of every job, and reports which of the built-in antipatterns
//! each job exhibits.
//!
//! # Quick Start
//!
//! ```bash
//! # Evaluate a jobs file
//! bq-antipattern-checker run --jobs jobs.json --catalog catalog.json
//!
//! # JSON results for further processing
//! bq-antipattern-checker run -j jobs.yaml -c catalog.yaml -f json -o results.json
//!
//! # Check ad-hoc SQL from stdin, failing when anything is detected
//! echo "SELECT * FROM proj.ds.events" | bq-antipattern-checker check -c catalog.json --fail-on-detect
//!
//! # Write a starter configuration
//! bq-antipattern-checker create-config
//! ```
//!
//! # Exit Codes
//!
//! - `0` - Success
//! - `1` - `--fail-on-detect` given and an antipattern was detected
//! - `2` - Hard error (unreadable input, invalid configuration)
//!
//! # Logging
//!
//! Diagnostics go to stderr through `tracing`. The level defaults to `warn`,
//! `-v` raises it to `debug`, and `RUST_LOG` overrides both.

use std::{io, process};

use bq_antipattern_checker::{
    app::{
        CheckParams, CommandOutput, RunParams, create_config, create_output_options, list_rules,
        run_check, run_jobs, show_config
    },
    cli::{Cli, Commands},
    config::Config,
    error::AppResult
};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(output) => {
            if !output.stdout.is_empty() {
                println!("{}", output.stdout.trim_end());
            }
            process::exit(output.exit_code);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> AppResult<CommandOutput> {
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Run {
            jobs,
            catalog,
            output_format,
            output,
            config,
            large_table_row_count,
            distinct_function_row_count,
            fail_on_detect,
            no_color,
            quiet
        } => {
            let config = Config::load(config.as_deref())?
                .with_overrides(large_table_row_count, distinct_function_row_count);
            let params = RunParams {
                jobs_path: jobs,
                catalog_path: catalog,
                output_format,
                output_path: output,
                fail_on_detect,
                no_color,
                quiet,
                verbose: cli.verbose
            };
            run_jobs(&params, &config, today)
        }
        Commands::Check {
            catalog,
            sql,
            output_format,
            config,
            fail_on_detect,
            no_color
        } => {
            let config = Config::load(config.as_deref())?;
            let params = CheckParams {
                catalog_path: catalog,
                sql_path: sql,
                output_format,
                fail_on_detect,
                no_color,
                verbose: cli.verbose
            };
            run_check(&params, &config, today)
        }
        Commands::ListRules {
            output_format,
            config,
            no_color
        } => {
            let config = Config::load(config.as_deref())?;
            list_rules(
                &config,
                &create_output_options(output_format, no_color, cli.verbose)
            )
        }
        Commands::ShowConfig {
            config
        } => show_config(&Config::load(config.as_deref())?),
        Commands::CreateConfig {
            output,
            force
        } => create_config(&output, force)
    }
}
