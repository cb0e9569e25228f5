//! Markdown report generation

use anyhow::Result;

use crate::runner::RunSummary;

/// Markdown report generator
pub struct MarkdownReporter;

impl MarkdownReporter {
    /// Generate a Markdown report
    pub fn generate(summary: &RunSummary) -> Result<String> {
        let report = &summary.report;
        let mut md = String::new();

        md.push_str("# Parley Evaluation Report\n\n");

        // Metadata
        md.push_str("## Overview\n\n");
        md.push_str(&format!("- **Model**: {}\n", summary.model));
        md.push_str(&format!("- **Aggregation**: {:?}\n", report.mode));
        md.push_str(&format!("- **Metrics**: {}\n", summary.metrics.join(", ")));
        md.push_str(&format!("- **Termination**: {}\n", summary.termination));
        md.push_str(&format!(
            "- **Timestamp**: {}\n",
            summary.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        md.push_str(&format!(
            "- **Total Execution Time**: {:.1}s\n\n",
            summary.total_execution_time_secs
        ));

        // Summary
        md.push_str("## Summary\n\n");
        md.push_str("| Metric | Value |\n|--------|-------|\n");
        md.push_str(&format!("| exs | {} |\n", report.exs));
        for (name, value) in &report.metrics {
            md.push_str(&format!("| {} | {:.4} |\n", name, value));
        }
        md.push('\n');

        // Per task
        md.push_str("## Results by Task\n\n");
        md.push_str("| Task | Exs | Status | Metrics |\n");
        md.push_str("|------|-----|--------|---------|\n");
        for (task_id, task) in &report.tasks {
            let metrics = task
                .values()
                .iter()
                .map(|(name, value)| format!("{name}={value:.4}"))
                .collect::<Vec<_>>()
                .join(", ");
            let status = summary
                .tasks
                .get(task_id)
                .map(|t| t.to_string())
                .unwrap_or_default();
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                task_id, task.exs, status, metrics
            ));
        }

        Ok(md)
    }
}
