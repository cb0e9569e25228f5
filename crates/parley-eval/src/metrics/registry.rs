//! Metric family registry
//!
//! Resolves the `metrics` option into the concrete metric names computed for
//! every example.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::ConfigError;

/// Metric that is always computed
pub const ACCURACY: &str = "accuracy";

/// Families in canonical order with their concrete members
const FAMILIES: &[(&str, &[&str])] = &[
    ("accuracy", &["accuracy"]),
    ("f1", &["f1"]),
    ("bleu", &["bleu-4"]),
    ("rouge", &["rouge-1", "rouge-2", "rouge-L"]),
];

/// Ordered set of concrete metric names selected for a run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricSelection {
    names: Vec<&'static str>,
}

impl MetricSelection {
    /// Selected metric names in canonical order
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    /// Check whether a metric is selected
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| *n == name)
    }

    /// Check whether any member of a family is selected
    pub fn has_family(&self, family: &str) -> bool {
        MetricRegistry::members(family).is_some_and(|members| members.iter().any(|m| self.contains(m)))
    }

    /// Families whose members are selected, in canonical order
    pub fn families(&self) -> Vec<&'static str> {
        FAMILIES
            .iter()
            .filter(|(family, _)| self.has_family(family))
            .map(|(family, _)| *family)
            .collect()
    }
}

impl Default for MetricSelection {
    fn default() -> Self {
        Self {
            names: vec![ACCURACY],
        }
    }
}

impl fmt::Display for MetricSelection {
    /// Renders the selection as a family list that resolves back to itself
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.families().join(","))
    }
}

/// Fixed registry of metric families
pub struct MetricRegistry;

impl MetricRegistry {
    /// All known family names in canonical order
    pub fn families() -> impl Iterator<Item = &'static str> {
        FAMILIES.iter().map(|(family, _)| *family)
    }

    /// Concrete members of a family
    pub fn members(family: &str) -> Option<&'static [&'static str]> {
        FAMILIES
            .iter()
            .find(|(name, _)| *name == family)
            .map(|(_, members)| *members)
    }

    /// Every concrete metric name the registry can produce
    pub fn all() -> MetricSelection {
        MetricSelection {
            names: FAMILIES
                .iter()
                .flat_map(|(_, members)| members.iter().copied())
                .collect(),
        }
    }

    /// Resolve a configuration value into a metric selection
    ///
    /// `None`, an empty string or `"default"` select accuracy alone; `"all"`
    /// selects every family; otherwise each comma-separated family is added to
    /// accuracy. The input order never changes the result.
    pub fn resolve(value: Option<&str>) -> Result<MetricSelection, ConfigError> {
        let Some(value) = value else {
            return Ok(MetricSelection::default());
        };

        let requested: BTreeSet<String> = value
            .split(',')
            .map(|item| item.trim().to_lowercase())
            .filter(|item| !item.is_empty())
            .collect();

        if requested.contains("all") {
            return Ok(Self::all());
        }

        let mut families: BTreeSet<&'static str> = BTreeSet::new();
        families.insert(ACCURACY);
        for name in &requested {
            if name == "default" {
                continue;
            }
            let family = FAMILIES
                .iter()
                .map(|(family, _)| *family)
                .find(|family| *family == name.as_str())
                .ok_or_else(|| ConfigError::UnknownMetric {
                    name: name.clone(),
                    known: Self::families().collect::<Vec<_>>().join(", "),
                })?;
            families.insert(family);
        }

        Ok(MetricSelection {
            names: FAMILIES
                .iter()
                .filter(|(family, _)| families.contains(family))
                .flat_map(|(_, members)| members.iter().copied())
                .collect(),
        })
    }
}
