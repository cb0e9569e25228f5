//! Metric computation and aggregation
//!
//! This module provides the per-example metric types, the metric family
//! registry, and the per-task and global aggregators.

mod aggregator;
mod global;
mod registry;
mod scoring;
mod types;

pub use aggregator::{TaskAggregator, TaskReport};
pub use global::{AggregationMode, GlobalReport};
pub use registry::{ACCURACY, MetricRegistry, MetricSelection};
pub use scoring::{TextScorer, bleu4, normalize_answer, rouge_l, rouge_n, token_f1};
pub use types::{Metric, MetricConflict, MetricSet};
