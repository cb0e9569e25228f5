//! Per-task metric aggregation
//!
//! Folds the metric sets of one task's examples, in evaluation order, into a
//! running report. Memory is bounded by the number of distinct metric names.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::types::{Metric, MetricConflict, MetricSet};

/// Accumulated state of one task's evaluation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskReport {
    /// Number of examples folded
    pub exs: u64,

    /// Combined value of every metric observed at least once
    pub metrics: BTreeMap<String, Metric>,
}

impl TaskReport {
    /// Display value of a metric
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(Metric::value)
    }

    /// Combined metric by name
    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    /// Accuracy, if any labeled example was folded
    pub fn accuracy(&self) -> Option<f64> {
        self.get("accuracy")
    }

    /// Display value of every observed metric
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .map(|(name, metric)| (name.clone(), metric.value()))
            .collect()
    }
}

impl Serialize for TaskReport {
    /// Serializes as a flat mapping of `exs` and metric display values
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.metrics.len() + 1))?;
        map.serialize_entry("exs", &self.exs)?;
        for (name, metric) in &self.metrics {
            map.serialize_entry(name, &metric.value())?;
        }
        map.end()
    }
}

/// Single-owner accumulator for one task
#[derive(Debug, Clone)]
pub struct TaskAggregator {
    task_id: String,
    report: TaskReport,
}

impl TaskAggregator {
    /// Create an empty aggregator for a task
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            report: TaskReport::default(),
        }
    }

    /// Task identifier
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Number of examples folded so far
    pub fn exs(&self) -> u64 {
        self.report.exs
    }

    /// Fold one example's metrics
    ///
    /// Metrics absent from `set` are left untouched. On a rule conflict nothing
    /// is folded, including the example count.
    pub fn fold(&mut self, set: MetricSet) -> Result<(), MetricConflict> {
        for (name, incoming) in &set {
            if let Some(existing) = self.report.metrics.get(name) {
                if existing.rule() != incoming.rule() {
                    return Err(MetricConflict {
                        name: name.clone(),
                        existing: existing.rule(),
                        incoming: incoming.rule(),
                    });
                }
            }
        }

        for (name, incoming) in set {
            match self.report.metrics.get_mut(&name) {
                Some(existing) => {
                    if let Some(combined) = existing.combine(incoming) {
                        *existing = combined;
                    }
                }
                None => {
                    self.report.metrics.insert(name, incoming);
                }
            }
        }
        self.report.exs += 1;
        Ok(())
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> TaskReport {
        self.report.clone()
    }

    /// Close the pass and return the final report
    pub fn finish(self) -> TaskReport {
        self.report
    }
}
