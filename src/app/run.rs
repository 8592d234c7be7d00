//! Command implementations.

use std::{
    io::{self, IsTerminal},
    path::Path
};

use chrono::NaiveDate;
use tracing::info;

use super::{
    helpers::{
        calculate_exit_code, create_output_options, job_progress_bar, read_sql_input, write_output
    },
    types::{CheckParams, CommandOutput, RunParams}
};
use crate::{
    catalog::TableCatalog,
    config::Config,
    error::{AppResult, config_error},
    job::{JobAggregator, JobRecord, load_jobs},
    output::{OutputOptions, RunSummary, format_report, format_rule_list}
};

/// Evaluates every job of a jobs file.
///
/// # Errors
///
/// Returns an error if the catalog or jobs file cannot be loaded, or the
/// output cannot be rendered or written.
pub fn run_jobs(params: &RunParams, config: &Config, now: NaiveDate) -> AppResult<CommandOutput> {
    let catalog = TableCatalog::load(&params.catalog_path)?;
    let jobs = load_jobs(&params.jobs_path)?;
    let options = config.engine_options(now);
    let enabled = options.enabled.clone();
    let aggregator = JobAggregator::new(options);

    let progress =
        (!params.quiet && io::stderr().is_terminal()).then(|| job_progress_bar(jobs.len()));
    let rows = aggregator.process_all(&jobs, &catalog, progress.as_ref());
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    let summary = RunSummary::from_rows(&rows, &enabled);
    info!(jobs = rows.len(), rules = enabled.len(), "evaluation finished");
    let exit_code = calculate_exit_code(&summary, params.fail_on_detect);

    // Files never get ANSI escapes
    let no_color = params.no_color || params.output_path.is_some();
    let opts = create_output_options(params.output_format, no_color, params.verbose);
    let rendered = format_report(&rows, &summary, &opts)?;

    match &params.output_path {
        Some(path) => {
            write_output(path, &rendered)?;
            Ok(CommandOutput {
                exit_code,
                stdout: format!("Results for {} jobs written to {}", rows.len(), path.display())
            })
        }
        None => Ok(CommandOutput {
            exit_code,
            stdout: rendered
        })
    }
}

/// Evaluates ad-hoc SQL text as a single job named `adhoc`.
///
/// # Errors
///
/// Returns an error if the catalog or SQL input cannot be read.
pub fn run_check(params: &CheckParams, config: &Config, now: NaiveDate) -> AppResult<CommandOutput> {
    let catalog = TableCatalog::load(&params.catalog_path)?;
    let sql = read_sql_input(&params.sql_path)?;
    let options = config.engine_options(now);
    let enabled = options.enabled.clone();
    let aggregator = JobAggregator::new(options);

    let row = aggregator.process_job(&JobRecord::new("adhoc", sql), &catalog);
    let rows = [row];
    let summary = RunSummary::from_rows(&rows, &enabled);
    let opts = create_output_options(params.output_format, params.no_color, params.verbose);
    Ok(CommandOutput {
        exit_code: calculate_exit_code(&summary, params.fail_on_detect),
        stdout:    format_report(&rows, &summary, &opts)?
    })
}

/// Lists rules with their enabled state and description.
pub fn list_rules(config: &Config, opts: &OutputOptions) -> AppResult<CommandOutput> {
    Ok(CommandOutput::success(format_rule_list(config, opts)?))
}

/// Renders the effective configuration as TOML.
pub fn show_config(config: &Config) -> AppResult<CommandOutput> {
    Ok(CommandOutput::success(config.to_toml()?))
}

/// Writes the default configuration to `path`.
///
/// # Errors
///
/// Returns an error if the file exists and `force` is not set, or the file
/// cannot be written.
pub fn create_config(path: &Path, force: bool) -> AppResult<CommandOutput> {
    if path.exists() && !force {
        return Err(config_error(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    write_output(path, &Config::default().to_toml()?)?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(CommandOutput::success(format!(
        "Configuration written to {}",
        path.display()
    )))
}
