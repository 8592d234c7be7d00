use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::LOCAL_CONFIG_FILE;

/// BigQuery Antipattern Checker - Flag costly SQL patterns in warehouse jobs
#[derive(Parser, Debug)]
#[command(name = "bq-antipattern-checker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate every job in a jobs file
    Run {
        /// Path to jobs file (JSON or YAML list)
        #[arg(short, long)]
        jobs: PathBuf,

        /// Path to table catalog (JSON or YAML)
        #[arg(short, long)]
        catalog: PathBuf,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        output_format: Format,

        /// Write results to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Explicit configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Row count at which a table counts as big
        #[arg(long)]
        large_table_row_count: Option<u64>,

        /// Row count at which DISTINCT is flagged
        #[arg(long)]
        distinct_function_row_count: Option<u64>,

        /// Exit with code 1 when any antipattern is detected
        #[arg(long)]
        fail_on_detect: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool
    },

    /// Evaluate ad-hoc SQL as a single job
    Check {
        /// Path to table catalog (JSON or YAML)
        #[arg(short, long)]
        catalog: PathBuf,

        /// Path to SQL file (use - for stdin)
        #[arg(short, long, default_value = "-")]
        sql: String,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        output_format: Format,

        /// Explicit configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Exit with code 1 when any antipattern is detected
        #[arg(long)]
        fail_on_detect: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool
    },

    /// List rules with their enabled state
    ListRules {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        output_format: Format,

        /// Explicit configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool
    },

    /// Print the effective configuration
    ShowConfig {
        /// Explicit configuration file
        #[arg(long)]
        config: Option<PathBuf>
    },

    /// Write a default configuration file
    CreateConfig {
        /// Destination path
        #[arg(short, long, default_value = LOCAL_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml,
    Csv
}
