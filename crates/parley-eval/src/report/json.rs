//! JSON report generation

use anyhow::Result;

use crate::runner::RunSummary;

/// JSON report generator
pub struct JsonReporter;

impl JsonReporter {
    /// Generate a JSON report
    pub fn generate(summary: &RunSummary) -> Result<String> {
        let json = serde_json::to_string_pretty(summary)?;
        Ok(json)
    }

    /// Generate a compact JSON report (no pretty printing)
    pub fn generate_compact(summary: &RunSummary) -> Result<String> {
        let json = serde_json::to_string(summary)?;
        Ok(json)
    }
}
