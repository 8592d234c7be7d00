// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use std::fs;

use bq_antipattern_checker::{config::Config, rules::RuleId};
use chrono::NaiveDate;

#[test]
fn test_load_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        r#"
[thresholds]
distinct_function_row_count = 500

[antipatterns]
select_star = false

[antipatterns.order_without_limit]
description = "Sorts need a LIMIT"
"#
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.thresholds.distinct_function_row_count, 500);
    assert_eq!(config.thresholds.large_table_row_count, 1000);
    assert!(!config.is_enabled(RuleId::SelectStar));
    assert!(config.is_enabled(RuleId::OrderWithoutLimit));
    assert_eq!(
        config.antipatterns[&RuleId::OrderWithoutLimit].description,
        "Sorts need a LIMIT"
    );
    assert_eq!(config.antipatterns.len(), RuleId::ALL.len());
}

#[test]
fn test_load_missing_explicit_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
}

#[test]
fn test_unknown_rule_is_error() {
    assert!(Config::from_toml_str("[antipatterns]\nselect_everything = false\n").is_err());
}

#[test]
fn test_unknown_section_is_error() {
    assert!(Config::from_toml_str("[llm]\nprovider = \"x\"\n").is_err());
}

#[test]
fn test_rule_ids_are_case_insensitive() {
    let config = Config::from_toml_str("[antipatterns]\nSELECT_STAR = false\n").unwrap();
    assert!(!config.is_enabled(RuleId::SelectStar));
}

#[test]
fn test_rendered_default_reloads_identically() {
    let rendered = Config::default().to_toml().unwrap();
    assert_eq!(Config::from_toml_str(&rendered).unwrap(), Config::default());
}

#[test]
fn test_env_and_cli_precedence() {
    let mut config = Config::from_toml_str("[thresholds]\nlarge_table_row_count = 10\n").unwrap();
    config
        .apply_env(|name| (name == "LARGE_TABLE_ROW_COUNT").then(|| "20".to_string()))
        .unwrap();
    assert_eq!(config.thresholds.large_table_row_count, 20);

    let config = config.with_overrides(Some(30), None);
    assert_eq!(config.thresholds.large_table_row_count, 30);
    assert_eq!(config.thresholds.distinct_function_row_count, 10000);
}

#[test]
fn test_invalid_env_value_is_error() {
    let mut config = Config::default();
    let result =
        config.apply_env(|name| (name == "DISTINCT_FUNCTION_ROW_COUNT").then(|| "many".into()));
    assert!(result.is_err());
}

#[test]
fn test_engine_options_follow_config() {
    let config = Config::from_toml_str("[antipatterns]\nregexp_in_where = false\n").unwrap();
    let now = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let options = config.engine_options(now);
    assert_eq!(options.now, now);
    assert!(!options.enabled.contains(&RuleId::RegexpInWhere));
    assert_eq!(options.enabled.len(), RuleId::ALL.len() - 1);
}
