//! Core metric types
//!
//! A [`Metric`] is one numeric measurement together with the rule used to
//! combine it with other measurements of the same name. A [`MetricSet`] is the
//! immutable collection of metrics produced for a single evaluated example.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;
use thiserror::Error;

/// A named measurement's value and combination rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Metric {
    /// Combined by addition
    Sum { value: f64 },

    /// Ratio kept as numerator / denominator so that combining never averages
    /// averages
    Average { numer: f64, denom: u64 },

    /// Combined by taking the maximum
    Max { value: f64 },
}

impl Metric {
    /// Create a summed metric
    pub fn sum(value: f64) -> Self {
        Metric::Sum { value }
    }

    /// Create a ratio metric
    pub fn average(numer: f64, denom: u64) -> Self {
        Metric::Average { numer, denom }
    }

    /// Create a 0/1 correctness ratio for one observation
    pub fn hit(correct: bool) -> Self {
        Metric::average(if correct { 1.0 } else { 0.0 }, 1)
    }

    /// Create a max-combined metric
    pub fn max(value: f64) -> Self {
        Metric::Max { value }
    }

    /// Name of the combination rule
    pub fn rule(&self) -> &'static str {
        match self {
            Metric::Sum { .. } => "sum",
            Metric::Average { .. } => "average",
            Metric::Max { .. } => "max",
        }
    }

    /// Whether macro aggregation averages this metric across tasks
    ///
    /// Only ratios are macro-averaged; sums and maxima combine the same way in
    /// both modes.
    pub fn macro_average(&self) -> bool {
        matches!(self, Metric::Average { .. })
    }

    /// Display value
    pub fn value(&self) -> f64 {
        match *self {
            Metric::Sum { value } | Metric::Max { value } => value,
            Metric::Average { numer, denom } => {
                if denom == 0 {
                    0.0
                } else {
                    numer / denom as f64
                }
            }
        }
    }

    /// Combine two measurements of the same metric
    ///
    /// Returns `None` when the rules differ.
    pub fn combine(self, other: Metric) -> Option<Metric> {
        match (self, other) {
            (Metric::Sum { value: a }, Metric::Sum { value: b }) => Some(Metric::sum(a + b)),
            (
                Metric::Average { numer: n1, denom: d1 },
                Metric::Average { numer: n2, denom: d2 },
            ) => Some(Metric::average(n1 + n2, d1 + d2)),
            (Metric::Max { value: a }, Metric::Max { value: b }) => Some(Metric::max(a.max(b))),
            _ => None,
        }
    }
}

/// Two measurements of one metric name used different combination rules
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Metric '{name}' uses rule '{existing}' but received '{incoming}'")]
pub struct MetricConflict {
    pub name: String,
    pub existing: &'static str,
    pub incoming: &'static str,
}

/// Metrics produced for a single example, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet {
    metrics: BTreeMap<String, Metric>,
}

impl MetricSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a metric by name
    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    /// Check whether a metric was reported
    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// Number of reported metrics
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether no metric was reported
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Iterate over metrics in name order
    pub fn iter(&self) -> btree_map::Iter<'_, String, Metric> {
        self.metrics.iter()
    }

    /// Merge another set into this one, producing a new set
    ///
    /// Entries of `other` replace entries of `self` with the same name.
    pub fn merged(mut self, other: MetricSet) -> MetricSet {
        self.metrics.extend(other.metrics);
        self
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, metric: Metric) {
        self.metrics.insert(name.into(), metric);
    }
}

impl<K: Into<String>> FromIterator<(K, Metric)> for MetricSet {
    fn from_iter<I: IntoIterator<Item = (K, Metric)>>(iter: I) -> Self {
        Self {
            metrics: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl IntoIterator for MetricSet {
    type Item = (String, Metric);
    type IntoIter = btree_map::IntoIter<String, Metric>;

    fn into_iter(self) -> Self::IntoIter {
        self.metrics.into_iter()
    }
}

impl<'a> IntoIterator for &'a MetricSet {
    type Item = (&'a String, &'a Metric);
    type IntoIter = btree_map::Iter<'a, String, Metric>;

    fn into_iter(self) -> Self::IntoIter {
        self.metrics.iter()
    }
}
