//! Helper functions for CLI operations.
//!
//! Utilities shared by the command functions: reading SQL input, mapping CLI
//! formats, computing exit codes, writing output files and building the
//! progress bar.

use std::{
    fs::{self, read_to_string},
    io::{self, Read},
    path::Path
};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    cli::Format,
    error::{AppResult, file_read_error, file_write_error},
    output::{OutputFormat, OutputOptions, RunSummary}
};

/// Calculates the process exit code of an evaluation.
///
/// Returns `1` when `fail_on_detect` is set and at least one rule triggered
/// in any job, `0` otherwise.
///
/// # Example
///
/// ```
/// use bq_antipattern_checker::{app::calculate_exit_code, output::RunSummary};
///
/// let summary = RunSummary::from_rows(&[], &[]);
/// assert_eq!(calculate_exit_code(&summary, true), 0);
/// ```
pub fn calculate_exit_code(summary: &RunSummary, fail_on_detect: bool) -> i32 {
    if fail_on_detect && summary.any_triggered() {
        1
    } else {
        0
    }
}

/// Reads SQL text from a file or stdin.
///
/// # Arguments
///
/// * `path` - File path or "-" for stdin
///
/// # Errors
///
/// Returns an error if the file cannot be read or stdin fails.
pub fn read_sql_input(path: &str) -> AppResult<String> {
    if path == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| file_read_error("stdin", e))?;
        Ok(buffer)
    } else {
        read_to_string(path).map_err(|e| file_read_error(path, e))
    }
}

/// Converts the CLI format into the output format.
pub fn convert_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Yaml => OutputFormat::Yaml,
        Format::Csv => OutputFormat::Csv
    }
}

/// Creates output options from CLI parameters.
pub fn create_output_options(format: Format, no_color: bool, verbose: bool) -> OutputOptions {
    OutputOptions {
        format: convert_format(format),
        colored: !no_color,
        verbose
    }
}

/// Writes rendered output to a file, replacing it.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_output(path: &Path, content: &str) -> AppResult<()> {
    fs::write(path, content).map_err(|e| file_write_error(&path.display().to_string(), e))
}

/// Progress bar sized to the number of jobs.
pub fn job_progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} jobs")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}
