//! Result formatting.
//!
//! Text output lists every job with its triggered rules and evidence, then a
//! summary table and the jobs with the most antipatterns. JSON and YAML render
//! the same data as `{results: [rows], summary: {total_jobs, rules: [...]}}`.
//! CSV holds one line per job with evidence lists joined by `, `.

use std::fmt::Write as _;

use colored::Colorize;
use csv::WriterBuilder;
use serde::Serialize;

use crate::{
    config::Config,
    error::{AppResult, output_error},
    job::JobRow,
    rules::RuleId
};

/// Output format for results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
    Csv
}

/// Jobs listed in the text report's top issues block
const TOP_ISSUES: usize = 5;

/// Header of CSV job rows
const CSV_HEADER: [&str; 26] = [
    "job_id",
    "creation_date",
    "creation_time",
    "project_id",
    "user_email",
    "reservation_id",
    "total_process_gb",
    "total_slot_hrs",
    "total_duration_mins",
    "query",
    "select_star",
    "semi_join_without_aggregation",
    "order_without_limit",
    "regexp_in_where",
    "like_before_more_selective",
    "references_cte_multiple_times",
    "partition_not_used",
    "available_partitions",
    "big_date_range",
    "no_date_on_big_table",
    "tables_without_date_filter",
    "queries_unpartitioned_table",
    "unpartitioned_tables",
    "distinct_on_big_table",
    "count_distinct_on_big_table",
    "antipattern_run_time"
];

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool,
    pub verbose: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true,
            verbose: false
        }
    }
}

/// Trigger statistics of one rule over a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSummary {
    pub rule:       RuleId,
    pub count:      usize,
    /// Share of jobs that triggered the rule, 0 to 100
    pub percentage: f64
}

/// Aggregate statistics of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_jobs: usize,
    pub rules:      Vec<RuleSummary>
}

impl RunSummary {
    /// Count triggers of `rules` over `rows`.
    pub fn from_rows(rows: &[JobRow], rules: &[RuleId]) -> Self {
        let total_jobs = rows.len();
        let rules = rules
            .iter()
            .map(|&rule| {
                let count = rows.iter().filter(|row| row.flag(rule)).count();
                let percentage = if total_jobs == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total_jobs as f64
                };
                RuleSummary {
                    rule,
                    count,
                    percentage
                }
            })
            .collect();
        Self {
            total_jobs,
            rules
        }
    }

    pub fn any_triggered(&self) -> bool {
        self.rules.iter().any(|r| r.count > 0)
    }
}

#[derive(Serialize)]
struct Report<'a> {
    results: &'a [JobRow],
    summary: &'a RunSummary
}

#[derive(Serialize)]
struct RuleListing<'a> {
    rule:        RuleId,
    enabled:     bool,
    description: &'a str
}

/// Format job rows and their summary
pub fn format_report(
    rows: &[JobRow],
    summary: &RunSummary,
    opts: &OutputOptions
) -> AppResult<String> {
    let report = Report {
        results: rows,
        summary
    };
    match opts.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&report).map_err(|e| output_error(e.to_string()))
        }
        OutputFormat::Yaml => serde_yaml::to_string(&report).map_err(|e| output_error(e.to_string())),
        OutputFormat::Csv => format_csv_report(rows),
        OutputFormat::Text => Ok(format_text_report(rows, summary, opts))
    }
}

/// One CSV line per job; the summary is not part of CSV output.
fn format_csv_report(rows: &[JobRow]) -> AppResult<String> {
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());
    writer
        .write_record(CSV_HEADER)
        .map_err(|e| output_error(e.to_string()))?;
    for row in rows {
        writer
            .write_record(csv_record(row))
            .map_err(|e| output_error(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| output_error(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| output_error(e.to_string()))
}

fn csv_record(row: &JobRow) -> Vec<String> {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let number = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
    let meta = &row.metadata;
    let partitions = row
        .available_partitions
        .iter()
        .map(|p| format!("{}:{}", p.table_name, p.partitioned_column))
        .collect::<Vec<_>>()
        .join(", ");
    vec![
        row.job_id.clone(),
        text(&meta.creation_date),
        text(&meta.creation_time),
        text(&meta.project_id),
        text(&meta.user_email),
        text(&meta.reservation_id),
        number(meta.total_process_gb),
        number(meta.total_slot_hrs),
        number(meta.total_duration_mins),
        row.query.clone(),
        row.select_star.to_string(),
        row.semi_join_without_aggregation.to_string(),
        row.order_without_limit.to_string(),
        row.regexp_in_where.to_string(),
        row.like_before_more_selective.to_string(),
        row.references_cte_multiple_times.to_string(),
        row.partition_not_used.to_string(),
        partitions,
        row.big_date_range.to_string(),
        row.no_date_on_big_table.to_string(),
        row.tables_without_date_filter.join(", "),
        row.queries_unpartitioned_table.to_string(),
        row.unpartitioned_tables.join(", "),
        row.distinct_on_big_table.to_string(),
        row.count_distinct_on_big_table.to_string(),
        row.antipattern_run_time.to_string()
    ]
}

/// Format the rule list with each rule's enabled state
pub fn format_rule_list(config: &Config, opts: &OutputOptions) -> AppResult<String> {
    let listing: Vec<RuleListing<'_>> = config
        .antipatterns
        .iter()
        .map(|(id, a)| RuleListing {
            rule:        *id,
            enabled:     a.enabled,
            description: &a.description
        })
        .collect();
    match opts.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&listing).map_err(|e| output_error(e.to_string()))
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(&listing).map_err(|e| output_error(e.to_string()))
        }
        OutputFormat::Csv => {
            let mut writer = WriterBuilder::new().from_writer(Vec::new());
            for entry in &listing {
                writer
                    .serialize(entry)
                    .map_err(|e| output_error(e.to_string()))?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| output_error(e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| output_error(e.to_string()))
        }
        OutputFormat::Text => {
            let mut output = String::new();
            for entry in &listing {
                let state = match (entry.enabled, opts.colored) {
                    (true, true) => "enabled ".green().to_string(),
                    (false, true) => "disabled".dimmed().to_string(),
                    (true, false) => "enabled ".to_string(),
                    (false, false) => "disabled".to_string()
                };
                let _ = writeln!(output, "{:<30} {}  {}", entry.rule, state, entry.description);
            }
            Ok(output)
        }
    }
}

fn format_text_report(rows: &[JobRow], summary: &RunSummary, opts: &OutputOptions) -> String {
    let mut output = String::new();

    for row in rows {
        let triggered = row.triggered_rules();
        let header = format!("Job {}", row.job_id);
        if opts.colored {
            output.push_str(&header.cyan().bold().to_string());
        } else {
            output.push_str(&header);
        }
        if triggered.is_empty() {
            output.push_str(": no antipatterns\n");
        } else {
            let _ = writeln!(output, ": {} antipattern(s)", triggered.len());
        }
        for rule in triggered {
            let name = if opts.colored {
                rule.as_str().yellow().to_string()
            } else {
                rule.as_str().to_string()
            };
            let _ = writeln!(output, "  {}", name);
            for line in row.evidence_lines(rule) {
                let _ = writeln!(output, "    - {}", line);
            }
        }
        if opts.verbose {
            let _ = writeln!(output, "  run time: {:.3}s", row.antipattern_run_time);
        }
        output.push('\n');
    }

    let title = format!("=== Summary ({} jobs) ===", summary.total_jobs);
    if opts.colored {
        output.push_str(&title.bold().to_string());
    } else {
        output.push_str(&title);
    }
    output.push('\n');
    for entry in &summary.rules {
        let count = format!("{:>6}", entry.count);
        let count = if opts.colored && entry.count > 0 {
            count.red().to_string()
        } else {
            count
        };
        let _ = writeln!(output, "{:<30} {} {:>6.1}%", entry.rule, count, entry.percentage);
    }
    if summary.total_jobs > 0 {
        format_top_issues(&mut output, rows, opts);
    }
    output
}

/// Jobs with the most triggered rules, ties kept in input order.
fn top_issues(rows: &[JobRow], limit: usize) -> Vec<(&JobRow, usize)> {
    let mut ranked: Vec<(&JobRow, usize)> = rows
        .iter()
        .map(|row| (row, row.triggered_rules().len()))
        .filter(|(_, count)| *count > 0)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);
    ranked
}

fn format_top_issues(output: &mut String, rows: &[JobRow], opts: &OutputOptions) {
    output.push('\n');
    let ranked = top_issues(rows, TOP_ISSUES);
    if ranked.is_empty() {
        let message = "No significant antipatterns found";
        if opts.colored {
            output.push_str(&message.green().to_string());
        } else {
            output.push_str(message);
        }
        output.push('\n');
        return;
    }
    let title = "=== Top Issues ===";
    if opts.colored {
        output.push_str(&title.bold().to_string());
    } else {
        output.push_str(title);
    }
    output.push('\n');
    let _ = writeln!(
        output,
        "{:<24} {:<32} {:>12} {:>16}",
        "Job ID", "User", "Antipatterns", "Total Slot Hours"
    );
    for (row, count) in ranked {
        let user = row.metadata.user_email.as_deref().unwrap_or("N/A");
        let slot_hours = row.metadata.total_slot_hrs.unwrap_or_default();
        let _ = writeln!(
            output,
            "{:<24} {:<32} {:>12} {:>16.2}",
            row.job_id, user, count, slot_hours
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        job::{JobRecord, JobVerdict},
        rules::{Evidence, RuleVerdict}
    };

    fn rows() -> Vec<JobRow> {
        let mut flagged = JobVerdict::new();
        flagged.merge(RuleVerdict::flag(RuleId::SelectStar, true));
        flagged.merge(RuleVerdict::from_evidence(
            RuleId::UnpartitionedTables,
            vec![Evidence::table("proj.ds.flat")]
        ));
        let mut record = JobRecord::new("j1", "q1");
        record.metadata.user_email = Some("analyst@example.com".to_string());
        record.metadata.total_slot_hrs = Some(1.5);
        vec![
            JobRow::from_verdict(&record, &flagged, 0.01),
            JobRow::from_verdict(&JobRecord::new("j2", "q2"), &JobVerdict::new(), 0.01),
        ]
    }

    fn plain(format: OutputFormat) -> OutputOptions {
        OutputOptions {
            format,
            colored: false,
            verbose: false
        }
    }

    #[test]
    fn test_summary_percentages() {
        let summary = RunSummary::from_rows(&rows(), &RuleId::ALL);
        assert_eq!(summary.total_jobs, 2);
        assert_eq!(summary.rules[0].rule, RuleId::SelectStar);
        assert_eq!(summary.rules[0].count, 1);
        assert_eq!(summary.rules[0].percentage, 50.0);
        assert!(summary.any_triggered());
    }

    #[test]
    fn test_summary_of_no_jobs() {
        let summary = RunSummary::from_rows(&[], &RuleId::ALL);
        assert!(summary.rules.iter().all(|r| r.percentage == 0.0));
        assert!(!summary.any_triggered());
    }

    #[test]
    fn test_text_report() {
        let rows = rows();
        let summary = RunSummary::from_rows(&rows, &RuleId::ALL);
        let text = format_report(&rows, &summary, &plain(OutputFormat::Text)).unwrap();
        assert!(text.contains("Job j1: 2 antipattern(s)"));
        assert!(text.contains("    - proj.ds.flat"));
        assert!(text.contains("Job j2: no antipatterns"));
        assert!(text.contains("=== Summary (2 jobs) ==="));
    }

    #[test]
    fn test_json_report_shape() {
        let rows = rows();
        let summary = RunSummary::from_rows(&rows, &RuleId::ALL);
        let json = format_report(&rows, &summary, &plain(OutputFormat::Json)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["total_jobs"], 2);
        assert_eq!(value["summary"]["rules"][0]["rule"], "select_star");
        assert_eq!(value["results"][0]["job_id"], "j1");
        assert_eq!(value["results"][1]["unpartitioned_tables"][0], "-");
    }

    #[test]
    fn test_text_report_top_issues() {
        let rows = rows();
        let summary = RunSummary::from_rows(&rows, &RuleId::ALL);
        let text = format_report(&rows, &summary, &plain(OutputFormat::Text)).unwrap();
        let top = text.split("=== Top Issues ===").nth(1).unwrap();
        let line = top.lines().find(|l| l.starts_with("j1")).unwrap();
        assert!(line.contains("analyst@example.com"));
        assert!(line.contains("1.50"));
        assert!(!top.lines().any(|l| l.starts_with("j2")));
    }

    #[test]
    fn test_top_issues_ranking() {
        let mut busy = JobVerdict::new();
        for id in [RuleId::SelectStar, RuleId::OrderWithoutLimit, RuleId::RegexpInWhere] {
            busy.merge(RuleVerdict::flag(id, true));
        }
        let mut rows = rows();
        rows.push(JobRow::from_verdict(&JobRecord::new("j3", "q3"), &busy, 0.0));
        let ranked: Vec<_> = top_issues(&rows, 5)
            .into_iter()
            .map(|(row, count)| (row.job_id.as_str(), count))
            .collect();
        assert_eq!(ranked, vec![("j3", 3), ("j1", 2)]);
        assert_eq!(top_issues(&rows, 1).len(), 1);
    }

    #[test]
    fn test_clean_run_has_no_top_issues() {
        let clean = JobRow::from_verdict(&JobRecord::new("j2", "q2"), &JobVerdict::new(), 0.0);
        let rows = vec![clean];
        let summary = RunSummary::from_rows(&rows, &RuleId::ALL);
        let text = format_report(&rows, &summary, &plain(OutputFormat::Text)).unwrap();
        assert!(!text.contains("Top Issues"));
        assert!(text.contains("No significant antipatterns found"));
    }

    #[test]
    fn test_csv_report() {
        let rows = rows();
        let summary = RunSummary::from_rows(&rows, &RuleId::ALL);
        let csv = format_report(&rows, &summary, &plain(OutputFormat::Csv)).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), CSV_HEADER.len());
        let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
        assert_eq!(&records[0][column("job_id")], "j1");
        assert_eq!(&records[0][column("user_email")], "analyst@example.com");
        assert_eq!(&records[0][column("select_star")], "true");
        assert_eq!(&records[0][column("unpartitioned_tables")], "proj.ds.flat");
        assert_eq!(&records[1][column("available_partitions")], "-:-");
        assert_eq!(&records[1][column("total_slot_hrs")], "");
    }

    #[test]
    fn test_csv_rule_list() {
        let csv = format_rule_list(&Config::default(), &plain(OutputFormat::Csv)).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("rule,enabled,description"));
        assert!(lines.next().unwrap().starts_with("select_star,true,"));
    }

    #[test]
    fn test_yaml_rule_list() {
        let yaml = format_rule_list(&Config::default(), &plain(OutputFormat::Yaml)).unwrap();
        assert!(yaml.contains("rule: count_distinct_on_big_table"));
        assert!(yaml.contains("enabled: true"));
    }
}
