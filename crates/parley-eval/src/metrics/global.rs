//! Global aggregation across tasks
//!
//! Combines a snapshot of task reports into one global report. The global
//! report is never written to incrementally; it is recomputed from the task
//! reports whenever it is requested.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::aggregator::TaskReport;
use super::types::Metric;

/// How ratio metrics are combined across tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Weight every task by its example count (pool all examples)
    Micro,
    /// Weight every task equally
    #[default]
    Macro,
}

impl AggregationMode {
    /// Mode selected by the `aggregate_micro` flag
    pub fn from_micro(aggregate_micro: bool) -> Self {
        if aggregate_micro {
            AggregationMode::Micro
        } else {
            AggregationMode::Macro
        }
    }
}

/// Combined view of every task that took part in a run
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalReport {
    /// Total examples across tasks, independent of mode
    pub exs: u64,

    /// Global display value per metric
    pub metrics: BTreeMap<String, f64>,

    /// Mode used to compute `metrics`
    pub mode: AggregationMode,

    /// Per-task breakdown
    pub tasks: BTreeMap<String, TaskReport>,
}

impl GlobalReport {
    /// Aggregate task reports
    ///
    /// In micro mode every metric is combined with its own rule, so ratios
    /// pool numerators and denominators. In macro mode ratio metrics are the
    /// unweighted mean of the per-task values over the tasks reporting them;
    /// sums and maxima combine as in micro mode.
    ///
    /// A name's rule is fixed by the first task (in id order) that reports
    /// it. Later tasks reporting it under another rule are skipped with a
    /// warning, in both modes.
    pub fn aggregate(tasks: &BTreeMap<String, TaskReport>, mode: AggregationMode) -> Self {
        let exs = tasks.values().map(|report| report.exs).sum();

        let mut rules: BTreeMap<&str, &'static str> = BTreeMap::new();
        let mut pooled: BTreeMap<&str, Metric> = BTreeMap::new();
        let mut per_task: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

        for (task_id, report) in tasks {
            for (name, metric) in &report.metrics {
                let rule = *rules.entry(name.as_str()).or_insert(metric.rule());
                if rule != metric.rule() {
                    tracing::warn!(
                        task_id = %task_id,
                        metric = %name,
                        rule,
                        skipped = metric.rule(),
                        "Skipping metric with a rule that differs from other tasks"
                    );
                    continue;
                }
                if mode == AggregationMode::Macro && metric.macro_average() {
                    per_task.entry(name).or_default().push(metric.value());
                    continue;
                }
                match pooled.get_mut(name.as_str()) {
                    Some(existing) => {
                        if let Some(combined) = existing.combine(*metric) {
                            *existing = combined;
                        }
                    }
                    None => {
                        pooled.insert(name, *metric);
                    }
                }
            }
        }

        let mut metrics: BTreeMap<String, f64> = pooled
            .into_iter()
            .map(|(name, metric)| (name.to_string(), metric.value()))
            .collect();
        for (name, values) in per_task {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            metrics.insert(name.to_string(), mean);
        }

        Self {
            exs,
            metrics,
            mode,
            tasks: tasks.clone(),
        }
    }

    /// Global display value of a metric
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Global accuracy
    pub fn accuracy(&self) -> Option<f64> {
        self.get("accuracy")
    }

    /// Report of one task
    pub fn task(&self, task_id: &str) -> Option<&TaskReport> {
        self.tasks.get(task_id)
    }

    /// Flat `exs` + metric mapping used for dump blocks
    pub fn summary_values(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("exs".to_string(), self.exs.into());
        for (name, value) in &self.metrics {
            map.insert(name.clone(), (*value).into());
        }
        map
    }
}

impl Serialize for GlobalReport {
    /// Serializes as `{exs, <metrics>..., tasks: {id: {...}}}`
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.metrics.len() + 2))?;
        map.serialize_entry("exs", &self.exs)?;
        for (name, value) in &self.metrics {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("tasks", &self.tasks)?;
        map.end()
    }
}
