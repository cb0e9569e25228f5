//! Report generation for evaluation results
//!
//! Renders the incremental report dump and the final run summary in various
//! formats (JSON, Markdown, terminal table).

mod json;
mod markdown;

pub use json::JsonReporter;
pub use markdown::MarkdownReporter;

use anyhow::Result;
use serde_json::{Map, Value};

use crate::metrics::GlobalReport;
use crate::runner::RunSummary;

/// Separator between blocks of the report dump
pub const REPORT_DELIMITER: &str = "\n---\n";

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Markdown,
    Table,
}

impl ReportFormat {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            "table" => Some(ReportFormat::Table),
            _ => None,
        }
    }
}

/// Generate a report in the specified format
pub fn generate_report(summary: &RunSummary, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => JsonReporter::generate(summary),
        ReportFormat::Markdown => MarkdownReporter::generate(summary),
        ReportFormat::Table => generate_table(summary),
    }
}

/// Incremental report dump
///
/// Every pushed report becomes one compact JSON block holding `exs` and the
/// display value of every metric observed so far.
#[derive(Debug, Clone, Default)]
pub struct ReportLog {
    blocks: Vec<String>,
}

impl ReportLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block for a global report, returning the rendered block
    pub fn push(&mut self, report: &GlobalReport) -> &str {
        let block = Value::Object(report.summary_values()).to_string();
        self.blocks.push(block);
        self.blocks.last().map(String::as_str).unwrap_or_default()
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Full dump, blocks joined by [`REPORT_DELIMITER`]
    pub fn render(&self) -> String {
        self.blocks.join(REPORT_DELIMITER)
    }

    /// Parse a dump back into its blocks
    pub fn parse(dump: &str) -> Result<Vec<Map<String, Value>>> {
        dump.split(REPORT_DELIMITER)
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .map(|block| Ok(serde_json::from_str(block)?))
            .collect()
    }
}

/// Generate a simple table report for terminal output
fn generate_table(summary: &RunSummary) -> Result<String> {
    let report = &summary.report;
    let mut output = String::new();

    // Header
    output.push_str(&format!("\n{:=<70}\n", "= Parley Evaluation Results "));
    output.push_str(&format!(
        "Model: {} | Mode: {:?} | Termination: {}\n",
        summary.model, report.mode, summary.termination
    ));
    output.push_str(&format!(
        "Timestamp: {}\n",
        summary.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("{:=<70}\n\n", ""));

    // Summary
    output.push_str("SUMMARY\n");
    output.push_str(&format!("{:-<70}\n", ""));
    output.push_str(&format!("Examples: {}\n", report.exs));
    for (name, value) in &report.metrics {
        output.push_str(&format!("{:<12} {:.4}\n", format!("{name}:"), value));
    }
    output.push_str(&format!(
        "Total Time: {:.1}s\n\n",
        summary.total_execution_time_secs
    ));

    // Per task
    output.push_str("TASK RESULTS\n");
    output.push_str(&format!("{:-<70}\n", ""));
    output.push_str(&format!(
        "{:<40} {:>8} {:>10} {:>10}\n",
        "Task", "Exs", "Accuracy", "Status"
    ));
    output.push_str(&format!("{:-<70}\n", ""));

    for (task_id, task) in &report.tasks {
        let task_name = if task_id.chars().count() > 38 {
            format!("{}...", task_id.chars().take(35).collect::<String>())
        } else {
            task_id.clone()
        };
        let accuracy = task
            .accuracy()
            .map(|a| format!("{a:.4}"))
            .unwrap_or_else(|| "-".to_string());
        let status = summary
            .tasks
            .get(task_id)
            .map(|t| t.to_string())
            .unwrap_or_default();

        output.push_str(&format!(
            "{:<40} {:>8} {:>10} {:>10}\n",
            task_name, task.exs, accuracy, status
        ));
    }

    output.push_str(&format!("{:=<70}\n", ""));

    Ok(output)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metrics::{AggregationMode, Metric, TaskReport};
    use crate::runner::Termination;
    use chrono::Utc;
    use std::collections::BTreeMap;

    pub(crate) fn create_test_summary() -> RunSummary {
        let mut tasks = BTreeMap::new();
        tasks.insert(
            "integration_tests".to_string(),
            TaskReport {
                exs: 4,
                metrics: [("accuracy".to_string(), Metric::average(3.0, 4))]
                    .into_iter()
                    .collect(),
            },
        );
        RunSummary {
            report: GlobalReport::aggregate(&tasks, AggregationMode::Macro),
            termination: Termination::Complete,
            tasks: [("integration_tests".to_string(), Termination::Complete)]
                .into_iter()
                .collect(),
            total_execution_time_secs: 1.5,
            timestamp: Utc::now(),
            model: "repeat_label".to_string(),
            metrics: vec!["accuracy".to_string()],
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_str("md"), Some(ReportFormat::Markdown));
        assert_eq!(ReportFormat::from_str("table"), Some(ReportFormat::Table));
        assert_eq!(ReportFormat::from_str("html"), None);
    }

    #[test]
    fn test_table_generation() {
        let table = generate_report(&create_test_summary(), ReportFormat::Table).unwrap();
        assert!(table.contains("repeat_label"));
        assert!(table.contains("integration_tests"));
        assert!(table.contains("0.7500"));
        assert!(table.contains("complete"));
    }

    #[test]
    fn test_table_truncates_long_non_ascii_task_ids() {
        let task_id = "file:/tmp/x/データ/評価タスク/質問/とても長いディレクトリ名/回答.json".to_string();
        let mut summary = create_test_summary();
        let task = summary.report.tasks["integration_tests"].clone();
        let tasks: BTreeMap<String, TaskReport> = [(task_id.clone(), task)].into_iter().collect();
        summary.report = GlobalReport::aggregate(&tasks, AggregationMode::Macro);
        summary.tasks = [(task_id.clone(), Termination::Complete)].into_iter().collect();

        let table = generate_report(&summary, ReportFormat::Table).unwrap();
        let shown: String = task_id.chars().take(35).collect();
        assert!(table.contains(&format!("{shown}...")));
    }

    #[test]
    fn test_report_log_blocks() {
        let summary = create_test_summary();
        let mut log = ReportLog::new();
        assert!(log.is_empty());
        let block = log.push(&summary.report).to_string();
        assert!(!block.contains('\n'));
        let value: Value = serde_json::from_str(&block).unwrap();
        assert_eq!(value, serde_json::json!({"exs": 4, "accuracy": 0.75}));
        log.push(&summary.report);

        let dump = log.render();
        assert_eq!(dump.matches(REPORT_DELIMITER).count(), 1);

        let parsed = ReportLog::parse(&dump).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1]["exs"], 4);
        assert_eq!(parsed[0]["accuracy"], 0.75);
    }
}
