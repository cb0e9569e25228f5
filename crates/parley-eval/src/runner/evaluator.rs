//! Single-task evaluation pass
//!
//! An [`Evaluator`] owns one task source and one aggregator. It pulls
//! examples in batches, asks the model for predictions, scores them and folds
//! the results until a bound, the end of the data or the deadline stops it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::config::PassBounds;
use super::deadline::Deadline;
use super::progress::ProgressHub;
use crate::error::EvalError;
use crate::metrics::{TaskAggregator, TaskReport, TextScorer};
use crate::models::Model;
use crate::tasks::{Example, Next, TaskSource};

/// Why a pass stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Example cap or epoch limit reached
    #[default]
    Complete,
    /// A source without a declared epoch ran dry
    Exhausted,
    /// Deadline expired or the run was cancelled
    Cancelled,
}

impl Termination {
    fn rank(self) -> u8 {
        match self {
            Termination::Complete => 0,
            Termination::Exhausted => 1,
            Termination::Cancelled => 2,
        }
    }

    /// Overall termination of two passes: Cancelled > Exhausted > Complete
    pub fn combine(self, other: Termination) -> Termination {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Complete => write!(f, "complete"),
            Termination::Exhausted => write!(f, "exhausted"),
            Termination::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one task's pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRun {
    pub task_id: String,
    pub report: TaskReport,
    pub termination: Termination,
    /// Epoch boundaries crossed
    pub epochs: u64,
}

enum Stop {
    Epoch,
    Exhausted,
}

/// Evaluates one task against a model
pub struct Evaluator {
    source: Box<dyn TaskSource>,
    model: Arc<dyn Model>,
    scorer: Arc<TextScorer>,
    bounds: PassBounds,
    batch_size: usize,
    display_examples: bool,
    aggregator: TaskAggregator,
}

impl Evaluator {
    /// Create an evaluator for a source with resolved bounds
    pub fn new(
        source: Box<dyn TaskSource>,
        model: Arc<dyn Model>,
        scorer: Arc<TextScorer>,
        bounds: PassBounds,
    ) -> Self {
        let aggregator = TaskAggregator::new(source.id());
        Self {
            source,
            model,
            scorer,
            bounds,
            batch_size: 1,
            display_examples: false,
            aggregator,
        }
    }

    /// Set the number of examples per model call
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Log every example and prediction at debug level
    pub fn with_display_examples(mut self, display: bool) -> Self {
        self.display_examples = display;
        self
    }

    /// Task identifier
    pub fn task_id(&self) -> &str {
        self.aggregator.task_id()
    }

    /// Run the pass to completion
    ///
    /// The deadline is polled before every batch. A cancelled pass still
    /// returns the report of every example folded so far.
    pub async fn run(
        mut self,
        deadline: &Deadline,
        progress: Option<&ProgressHub>,
    ) -> Result<TaskRun, EvalError> {
        let task_id = self.aggregator.task_id().to_string();
        tracing::info!(
            task_id = %task_id,
            num_examples = ?self.source.num_examples(),
            max_examples = ?self.bounds.max_examples,
            max_epochs = ?self.bounds.max_epochs,
            "Starting task evaluation"
        );

        let mut epochs = 0u64;
        let mut seen_this_epoch = 0u64;

        let termination = loop {
            if deadline.expired() {
                tracing::warn!(
                    task_id = %task_id,
                    exs = self.aggregator.exs(),
                    "Deadline reached, stopping task"
                );
                break Termination::Cancelled;
            }

            let remaining = match self.bounds.max_examples {
                Some(max) if self.aggregator.exs() >= max => break Termination::Complete,
                Some(max) => max - self.aggregator.exs(),
                None => u64::MAX,
            };
            let want = (self.batch_size as u64).min(remaining) as usize;

            let mut batch = Vec::with_capacity(want);
            let mut stop = None;
            while batch.len() < want {
                let next = self.source.next_example().map_err(|e| {
                    EvalError::evaluation(&task_id, self.aggregator.exs() + batch.len() as u64, e)
                })?;
                match next {
                    Next::Example(example) => batch.push(example),
                    Next::EpochBoundary => {
                        stop = Some(Stop::Epoch);
                        break;
                    }
                    Next::Exhausted => {
                        stop = Some(Stop::Exhausted);
                        break;
                    }
                }
            }

            if !batch.is_empty() {
                seen_this_epoch += batch.len() as u64;
                self.evaluate_batch(&task_id, batch, progress).await?;
            }

            match stop {
                None => {}
                Some(Stop::Exhausted) => break Termination::Exhausted,
                Some(Stop::Epoch) => {
                    epochs += 1;
                    let limit_reached = self.bounds.max_epochs.is_some_and(|max| epochs >= max);
                    // an empty epoch would cycle forever
                    if limit_reached || seen_this_epoch == 0 {
                        break Termination::Complete;
                    }
                    seen_this_epoch = 0;
                    self.source.reset();
                }
            }
        };

        let report = self.aggregator.finish();
        tracing::info!(
            task_id = %task_id,
            exs = report.exs,
            epochs,
            termination = %termination,
            "Finished task evaluation"
        );

        Ok(TaskRun {
            task_id,
            report,
            termination,
            epochs,
        })
    }

    async fn evaluate_batch(
        &mut self,
        task_id: &str,
        batch: Vec<Example>,
        progress: Option<&ProgressHub>,
    ) -> Result<(), EvalError> {
        let offset = self.aggregator.exs();
        let predictions = self
            .model
            .evaluate_batch(&batch)
            .await
            .map_err(|e| EvalError::evaluation(task_id, offset, e))?;

        if predictions.len() != batch.len() {
            return Err(EvalError::evaluation(
                task_id,
                offset,
                anyhow::anyhow!(
                    "model returned {} predictions for {} examples",
                    predictions.len(),
                    batch.len()
                ),
            ));
        }

        for (example, prediction) in batch.iter().zip(predictions) {
            if self.display_examples {
                tracing::debug!(
                    task_id = %task_id,
                    text = %example.text,
                    labels = ?example.labels,
                    prediction = %prediction.text,
                    "Evaluated example"
                );
            }

            let scored = self.scorer.score(example, &prediction);
            let set = prediction.metrics.merged(scored);
            let index = self.aggregator.exs();
            self.aggregator
                .fold(set)
                .map_err(|e| EvalError::evaluation(task_id, index, e))?;

            if let Some(hub) = progress {
                hub.record(task_id, self.aggregator.snapshot());
            }
        }
        Ok(())
    }
}
