//! Application types for CLI commands.
//!
//! Command parameters are plain values decoupled from `clap`, so the command
//! functions in [`super`] can be driven directly from tests.

use std::path::PathBuf;

use crate::cli::Format;

/// Parameters for the run command.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
///
/// use bq_antipattern_checker::{app::RunParams, cli::Format};
///
/// let params = RunParams {
///     jobs_path:      PathBuf::from("jobs.json"),
///     catalog_path:   PathBuf::from("catalog.json"),
///     output_format:  Format::Json,
///     output_path:    None,
///     fail_on_detect: false,
///     no_color:       true,
///     quiet:          true,
///     verbose:        false
/// };
/// assert!(params.output_path.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Jobs file (JSON or YAML list of job records).
    pub jobs_path:      PathBuf,
    /// Table catalog file.
    pub catalog_path:   PathBuf,
    pub output_format:  Format,
    /// Write results here instead of stdout.
    pub output_path:    Option<PathBuf>,
    /// Exit with code 1 when any rule triggered.
    pub fail_on_detect: bool,
    pub no_color:       bool,
    /// Hide the progress bar.
    pub quiet:          bool,
    /// Include per-job run time in text output.
    pub verbose:        bool
}

/// Parameters for the check command.
#[derive(Debug, Clone)]
pub struct CheckParams {
    pub catalog_path:   PathBuf,
    /// SQL file path or "-" for stdin.
    pub sql_path:       String,
    pub output_format:  Format,
    pub fail_on_detect: bool,
    pub no_color:       bool,
    pub verbose:        bool
}

/// Output from CLI command execution.
///
/// # Example
///
/// ```
/// use bq_antipattern_checker::app::CommandOutput;
///
/// let output = CommandOutput {
///     exit_code: 0,
///     stdout:    "Evaluation complete.".to_string()
/// };
/// assert_eq!(output.exit_code, 0);
/// ```
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code for the process (0 = success, 1 = antipattern detected).
    pub exit_code: i32,
    /// Text to print to stdout.
    pub stdout:    String
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout:    stdout.into()
        }
    }
}
