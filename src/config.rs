//! Configuration loading and management.
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//!
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. `.bq-antipattern.toml` in current directory
//! 4. `~/.config/bq-antipattern/config.toml`
//! 5. Default values
//!
//! An explicit `--config <path>` replaces steps 3 and 4.
//!
//! # Configuration File Format
//!
//! ```toml
//! [thresholds]
//! large_table_row_count = 1000
//! distinct_function_row_count = 10000
//!
//! [antipatterns.select_star]
//! enabled = true
//! description = "Check for SELECT * statements"
//!
//! [antipatterns]
//! order_without_limit = false
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `LARGE_TABLE_ROW_COUNT` | Rows at which a table counts as big |
//! | `DISTINCT_FUNCTION_ROW_COUNT` | Rows at which DISTINCT is flagged |

use std::{
    env, fs,
    path::{Path, PathBuf}
};

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{AppResult, config_error},
    job::EngineOptions,
    rules::{RuleId, Thresholds}
};

/// Name of the per-project configuration file
pub const LOCAL_CONFIG_FILE: &str = ".bq-antipattern.toml";

/// Settings of a single antipattern rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AntipatternConfig {
    pub enabled:     bool,
    pub description: String
}

impl AntipatternConfig {
    fn default_for(id: RuleId) -> Self {
        Self {
            enabled:     true,
            description: id.description().to_string()
        }
    }
}

/// Application configuration
///
/// Every built-in rule has an entry in `antipatterns`, in registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub thresholds:   Thresholds,
    pub antipatterns: IndexMap<RuleId, AntipatternConfig>
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thresholds:   Thresholds::default(),
            antipatterns: RuleId::ALL
                .into_iter()
                .map(|id| (id, AntipatternConfig::default_for(id)))
                .collect()
        }
    }
}

/// `[antipatterns]` entry as written in a file: a table or a bare boolean.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum AntipatternSetting {
    Flag(bool),
    Table {
        #[serde(default = "default_enabled")]
        enabled:     bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>
    }
}

fn default_enabled() -> bool {
    true
}

/// On-disk layout of the configuration file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    thresholds:   Thresholds,
    #[serde(default)]
    antipatterns: IndexMap<String, AntipatternSetting>
}

impl Config {
    /// Load configuration from files and environment
    ///
    /// With `explicit`, only that file is read. Otherwise the home directory
    /// config and then the current directory config are tried; the last
    /// file found wins.
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let mut config = Self::default();
                for path in discovered_paths() {
                    if path.exists() {
                        config = Self::from_file(&path)?;
                    }
                }
                config
            }
        };
        config.apply_env(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Read one configuration file
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| config_error(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text
    ///
    /// Rule ids are matched case-insensitively. Rules missing from the file
    /// keep their defaults.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| config_error(format!("Invalid config file: {}", e)))?;
        let mut config = Self {
            thresholds: file.thresholds,
            ..Self::default()
        };
        for (name, setting) in file.antipatterns {
            let id: RuleId = name.parse()?;
            let entry = config
                .antipatterns
                .entry(id)
                .or_insert_with(|| AntipatternConfig::default_for(id));
            match setting {
                AntipatternSetting::Flag(enabled) => entry.enabled = enabled,
                AntipatternSetting::Table {
                    enabled,
                    description
                } => {
                    entry.enabled = enabled;
                    if let Some(description) = description {
                        entry.description = description;
                    }
                }
            }
        }
        Ok(config)
    }

    /// Override thresholds from environment variables
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<()> {
        if let Some(value) = lookup("LARGE_TABLE_ROW_COUNT") {
            self.thresholds.large_table_row_count = parse_count("LARGE_TABLE_ROW_COUNT", &value)?;
        }
        if let Some(value) = lookup("DISTINCT_FUNCTION_ROW_COUNT") {
            self.thresholds.distinct_function_row_count =
                parse_count("DISTINCT_FUNCTION_ROW_COUNT", &value)?;
        }
        Ok(())
    }

    /// Apply command-line threshold overrides
    pub fn with_overrides(mut self, large: Option<u64>, distinct: Option<u64>) -> Self {
        if let Some(large) = large {
            self.thresholds.large_table_row_count = large;
        }
        if let Some(distinct) = distinct {
            self.thresholds.distinct_function_row_count = distinct;
        }
        self
    }

    pub fn is_enabled(&self, id: RuleId) -> bool {
        self.antipatterns.get(&id).is_some_and(|a| a.enabled)
    }

    /// Enabled rule ids in registration order
    pub fn enabled_rules(&self) -> Vec<RuleId> {
        RuleId::ALL
            .into_iter()
            .filter(|id| self.is_enabled(*id))
            .collect()
    }

    /// Engine settings for a run anchored at `now`
    pub fn engine_options(&self, now: NaiveDate) -> EngineOptions {
        EngineOptions::new(now)
            .with_thresholds(self.thresholds)
            .with_enabled(self.enabled_rules())
    }

    /// Render the configuration in file format
    pub fn to_toml(&self) -> AppResult<String> {
        let file = ConfigFile {
            thresholds:   self.thresholds,
            antipatterns: self
                .antipatterns
                .iter()
                .map(|(id, a)| {
                    (id.to_string(), AntipatternSetting::Table {
                        enabled:     a.enabled,
                        description: Some(a.description.clone())
                    })
                })
                .collect()
        };
        toml::to_string_pretty(&file).map_err(|e| config_error(format!("Cannot render config: {}", e)))
    }
}

/// Home directory config path, if `HOME` is set
pub fn home_config_path() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("bq-antipattern")
            .join("config.toml")
    })
}

fn discovered_paths() -> Vec<PathBuf> {
    home_config_path()
        .into_iter()
        .chain(std::iter::once(PathBuf::from(LOCAL_CONFIG_FILE)))
        .collect()
}

fn parse_count(name: &str, value: &str) -> AppResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| config_error(format!("{} must be a non-negative integer, got '{}'", name, value)))
}
