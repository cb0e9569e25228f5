//! Models under evaluation
//!
//! The evaluation engine treats a model as an opaque async function from an
//! example to a prediction. Built-in models live in [`builtin`].

pub mod builtin;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ConfigError;
use crate::metrics::{Metric, MetricSet};
use crate::tasks::Example;

pub use builtin::{RandomCandidate, RepeatLabel};

/// A model's answer to one example
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Generated or selected answer
    pub text: String,

    /// Ranked candidates, best first
    #[serde(default)]
    pub text_candidates: Vec<String>,

    /// Metrics the model reports about itself for this example
    #[serde(default)]
    pub metrics: MetricSet,
}

impl Prediction {
    /// Create a prediction with an answer text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the ranked candidates
    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.text_candidates = candidates;
        self
    }

    /// Attach a model-reported metric
    pub fn with_metric(mut self, name: impl Into<String>, metric: Metric) -> Self {
        self.metrics.insert(name, metric);
        self
    }

    /// Attach several model-reported metrics
    pub fn with_metrics(mut self, metrics: MetricSet) -> Self {
        self.metrics = self.metrics.merged(metrics);
        self
    }
}

/// Model interface
#[async_trait]
pub trait Model: Send + Sync {
    /// Model name used in logs and summaries
    fn name(&self) -> &str;

    /// Answer a single example
    async fn evaluate(&self, example: &Example) -> Result<Prediction>;

    /// Answer a batch, one prediction per example in order
    async fn evaluate_batch(&self, examples: &[Example]) -> Result<Vec<Prediction>> {
        let mut predictions = Vec::with_capacity(examples.len());
        for example in examples {
            predictions.push(self.evaluate(example).await?);
        }
        Ok(predictions)
    }
}

/// Create a built-in model by name
pub fn create_model(name: &str, seed: u64) -> Result<Arc<dyn Model>, ConfigError> {
    match name.trim() {
        RepeatLabel::NAME => Ok(Arc::new(RepeatLabel)),
        RandomCandidate::NAME => Ok(Arc::new(RandomCandidate::new(seed))),
        other => Err(ConfigError::UnknownModel {
            name: other.to_string(),
        }),
    }
}
