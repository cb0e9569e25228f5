//! Parley multi-task evaluation engine
//!
//! This crate evaluates a conversational model against one or more tasks,
//! scores every example with a configurable metric vocabulary, and folds the
//! per-example scores into per-task and global reports.
//!
//! # Features
//!
//! - **Metric Registry**: `"all"`, the accuracy-only default, or a comma list
//!   of metric families (`"accuracy,rouge"`), resolved once per run
//! - **Single-pass Aggregation**: per-task accumulators keyed by combination
//!   rule (sum, ratio, max) that never grow with example count
//! - **Micro / Macro Averaging**: global reports weighted by examples or by task
//! - **Epoch Control**: fractional epochs, per-task example caps, batch-size
//!   invariant completion and a cooperative wall-clock deadline
//! - **Report Dump**: per-increment blocks separated by `\n---\n`
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_eval::{EpochController, EvalConfig};
//!
//! let config = EvalConfig::new("integration_tests")
//!     .with_metrics("all")
//!     .with_num_examples(5);
//! let mut controller = EpochController::from_config(config)?;
//! let summary = controller.run().await?;
//! println!("accuracy = {:?}", summary.report.get("accuracy"));
//! ```

pub mod error;
pub mod metrics;
pub mod models;
pub mod report;
pub mod runner;
pub mod tasks;

// Re-exports for convenience
pub use error::{ConfigError, EvalError};
pub use metrics::{
    AggregationMode, GlobalReport, Metric, MetricConflict, MetricRegistry, MetricSelection,
    MetricSet, TaskAggregator, TaskReport,
};
pub use models::{Model, Prediction};
pub use report::{REPORT_DELIMITER, ReportFormat, ReportLog, generate_report};
pub use runner::{
    EpochController, EvalConfig, EvalProgress, Evaluator, ProgressCallback, RunSummary,
    TaskRun, Termination,
};
pub use tasks::{DataType, Example, Next, Split, TaskLoader, TaskSource};
