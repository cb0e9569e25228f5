//! Multi-task evaluation controller
//!
//! Resolves configuration once, builds one evaluator per task and runs them
//! sequentially or with bounded concurrency, keeping the reports of every
//! task that finished.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::config::{EvalConfig, PassBounds};
use super::deadline::Deadline;
use super::evaluator::{Evaluator, TaskRun, Termination};
use super::progress::{ProgressCallback, ProgressHub};
use crate::error::{ConfigError, EvalError};
use crate::metrics::{AggregationMode, GlobalReport, MetricRegistry, MetricSelection, TextScorer};
use crate::models::{Model, create_model};
use crate::tasks::{TaskLoader, TaskSource};

/// Final result of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Global report over every task that ran
    pub report: GlobalReport,
    /// Overall termination
    pub termination: Termination,
    /// Termination per task
    pub tasks: BTreeMap<String, Termination>,
    /// Wall-clock duration of the run
    pub total_execution_time_secs: f64,
    /// When the run finished
    pub timestamp: DateTime<Utc>,
    /// Model name
    pub model: String,
    /// Metrics computed by the scorer
    pub metrics: Vec<String>,
}

/// Runs every configured task against one model
pub struct EpochController {
    config: EvalConfig,
    selection: MetricSelection,
    scorer: Arc<TextScorer>,
    model: Arc<dyn Model>,
    mode: AggregationMode,
    token: CancellationToken,
    progress_callback: Option<ProgressCallback>,
    finished: Vec<TaskRun>,
}

impl EpochController {
    /// Create a controller with the built-in model named in the config
    pub fn from_config(config: EvalConfig) -> Result<Self, ConfigError> {
        let model = create_model(&config.model, config.seed)?;
        Self::new(config, model)
    }

    /// Create a controller for a custom model
    pub fn new(config: EvalConfig, model: Arc<dyn Model>) -> Result<Self, ConfigError> {
        config.validate()?;
        let selection = MetricRegistry::resolve(config.metrics.as_deref())?;
        let mode = AggregationMode::from_micro(config.aggregate_micro);

        tracing::debug!(
            model = model.name(),
            metrics = %selection,
            mode = ?mode,
            "Configured evaluation"
        );

        Ok(Self {
            scorer: Arc::new(TextScorer::new(selection.clone())),
            selection,
            model,
            mode,
            config,
            token: CancellationToken::new(),
            progress_callback: None,
            finished: Vec::new(),
        })
    }

    /// Set progress callback
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress_callback = Some(callback);
    }

    /// Token that cancels the run at the next batch boundary of every task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Aggregation mode of this run
    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    /// Resolved metric selection
    pub fn selection(&self) -> &MetricSelection {
        &self.selection
    }

    /// Configuration of this run
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Passes that finished, in configured order
    pub fn finished(&self) -> &[TaskRun] {
        &self.finished
    }

    /// Global report over the finished passes
    pub fn global_report(&self) -> GlobalReport {
        let tasks = self
            .finished
            .iter()
            .map(|run| (run.task_id.clone(), run.report.clone()))
            .collect();
        GlobalReport::aggregate(&tasks, self.mode)
    }

    /// Load the configured tasks and run them
    pub async fn run(&mut self) -> Result<RunSummary, EvalError> {
        let loader = TaskLoader::new(self.config.datatype, self.config.seed);
        let sources = loader.load_all(&self.config.task)?;
        self.run_sources(sources).await
    }

    /// Run already constructed task sources
    ///
    /// Every task's bounds are resolved before the first example is
    /// evaluated. On failure the reports of finished tasks stay available
    /// through [`finished`](Self::finished).
    pub async fn run_sources(
        &mut self,
        sources: Vec<Box<dyn TaskSource>>,
    ) -> Result<RunSummary, EvalError> {
        self.finished.clear();
        let evaluators = self.build_evaluators(sources)?;

        let start_time = Instant::now();
        let deadline = Deadline::start(
            self.config.timeout_secs.map(Duration::from_secs),
            self.token.clone(),
        );
        let hub = self.progress_callback.clone().map(|callback| {
            ProgressHub::new(
                callback,
                self.config.log_every_n_examples.unwrap_or(1),
                self.mode,
            )
        });

        tracing::info!(
            tasks = evaluators.len(),
            model = self.model.name(),
            parallel = self.config.max_parallel_tasks,
            "Starting evaluation run"
        );

        if self.config.max_parallel_tasks <= 1 {
            for evaluator in evaluators {
                match evaluator.run(&deadline, hub.as_ref()).await {
                    Ok(run) => {
                        let cancelled = run.termination == Termination::Cancelled;
                        self.finished.push(run);
                        if cancelled {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(task_id = ?e.task(), error = %e, "Task evaluation failed");
                        return Err(e);
                    }
                }
            }
        } else {
            let deadline = &deadline;
            let hub = hub.as_ref();
            let results: Vec<_> = futures::stream::iter(
                evaluators
                    .into_iter()
                    .map(move |evaluator| evaluator.run(deadline, hub)),
            )
            .buffered(self.config.max_parallel_tasks)
            .collect()
            .await;

            let mut first_error = None;
            for result in results {
                match result {
                    Ok(run) => self.finished.push(run),
                    Err(e) => {
                        tracing::error!(task_id = ?e.task(), error = %e, "Task evaluation failed");
                        first_error.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let summary = self.summary(start_time.elapsed().as_secs_f64());
        tracing::info!(
            exs = summary.report.exs,
            termination = %summary.termination,
            elapsed_secs = summary.total_execution_time_secs,
            "Evaluation run finished"
        );
        Ok(summary)
    }

    fn build_evaluators(
        &self,
        sources: Vec<Box<dyn TaskSource>>,
    ) -> Result<Vec<Evaluator>, ConfigError> {
        let mut seen = HashSet::new();
        let mut evaluators = Vec::with_capacity(sources.len());
        for source in sources {
            let id = source.id().to_string();
            let bounds = PassBounds::resolve(&self.config, source.num_examples(), &id)?;
            if !seen.insert(id.clone()) {
                return Err(ConfigError::DuplicateTask { name: id });
            }
            evaluators.push(
                Evaluator::new(source, self.model.clone(), self.scorer.clone(), bounds)
                    .with_batch_size(self.config.batchsize)
                    .with_display_examples(self.config.display_examples),
            );
        }
        Ok(evaluators)
    }

    fn summary(&self, elapsed_secs: f64) -> RunSummary {
        let termination = self
            .finished
            .iter()
            .fold(Termination::Complete, |acc, run| acc.combine(run.termination));

        RunSummary {
            report: self.global_report(),
            termination,
            tasks: self
                .finished
                .iter()
                .map(|run| (run.task_id.clone(), run.termination))
                .collect(),
            total_execution_time_secs: elapsed_secs,
            timestamp: Utc::now(),
            model: self.model.name().to_string(),
            metrics: self.selection.names().iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Prediction;
    use crate::tasks::{Example, ExampleSource};
    use async_trait::async_trait;

    fn source(id: &str, answers: &[&str]) -> Box<dyn TaskSource> {
        let examples = answers
            .iter()
            .map(|a| Example::new("q").with_labels([*a]))
            .collect();
        Box::new(ExampleSource::new(id, examples))
    }

    /// Always answers "yes"
    struct Yes;

    #[async_trait]
    impl Model for Yes {
        fn name(&self) -> &str {
            "yes"
        }

        async fn evaluate(&self, _example: &Example) -> anyhow::Result<Prediction> {
            Ok(Prediction::new("yes"))
        }
    }

    /// Fails on labels equal to "boom"
    struct Boom;

    #[async_trait]
    impl Model for Boom {
        fn name(&self) -> &str {
            "boom"
        }

        async fn evaluate(&self, example: &Example) -> anyhow::Result<Prediction> {
            if example.labels[0] == "boom" {
                anyhow::bail!("exploded");
            }
            Ok(Prediction::new(example.labels[0].clone()))
        }
    }

    #[test]
    fn test_from_config_rejects_unknowns() {
        let config = EvalConfig::default().with_metrics("accuracy,perplexity");
        assert!(matches!(
            EpochController::from_config(config),
            Err(ConfigError::UnknownMetric { .. })
        ));
        let config = EvalConfig::default().with_model("gpt");
        assert!(matches!(
            EpochController::from_config(config),
            Err(ConfigError::UnknownModel { .. })
        ));
    }

    #[tokio::test]
    async fn test_micro_and_macro() {
        // small: 1/2 correct, large: 1/4 correct
        let small = ["yes", "no"];
        let large = ["yes", "no", "no", "no"];

        let mut controller =
            EpochController::new(EvalConfig::default(), Arc::new(Yes)).unwrap();
        let summary = controller
            .run_sources(vec![source("small", &small), source("large", &large)])
            .await
            .unwrap();
        assert_eq!(summary.report.exs, 6);
        assert_eq!(summary.report.accuracy(), Some(0.375));

        let config = EvalConfig::default().with_aggregate_micro(true);
        let mut controller = EpochController::new(config, Arc::new(Yes)).unwrap();
        let summary = controller
            .run_sources(vec![source("small", &small), source("large", &large)])
            .await
            .unwrap();
        assert_eq!(summary.report.accuracy(), Some(2.0 / 6.0));
        assert_eq!(summary.termination, Termination::Complete);
        assert_eq!(summary.tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_finished_reports() {
        let mut controller = EpochController::new(EvalConfig::default(), Arc::new(Boom)).unwrap();
        let err = controller
            .run_sources(vec![
                source("first", &["a", "b"]),
                source("second", &["c", "boom"]),
                source("third", &["d"]),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.task(), Some("second"));
        let finished: Vec<_> = controller.finished().iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(finished, vec!["first"]);
        assert_eq!(controller.global_report().exs, 2);
    }

    #[tokio::test]
    async fn test_parallel_keeps_other_tasks_on_failure() {
        let config = EvalConfig::default().with_max_parallel_tasks(3);
        let mut controller = EpochController::new(config, Arc::new(Boom)).unwrap();
        let err = controller
            .run_sources(vec![
                source("first", &["a", "b"]),
                source("second", &["boom"]),
                source("third", &["d"]),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.task(), Some("second"));
        assert_eq!(controller.finished().len(), 2);
        assert_eq!(controller.global_report().exs, 3);
    }

    #[tokio::test]
    async fn test_cancelled_run_starts_no_further_tasks() {
        let mut controller = EpochController::new(EvalConfig::default(), Arc::new(Yes)).unwrap();
        controller.cancellation_token().cancel();
        let summary = controller
            .run_sources(vec![source("a", &["yes"]), source("b", &["yes"])])
            .await
            .unwrap();
        assert_eq!(summary.termination, Termination::Cancelled);
        assert_eq!(summary.tasks.len(), 1);
        assert_eq!(summary.report.exs, 0);
    }

    #[tokio::test]
    async fn test_duplicate_sources_rejected() {
        let mut controller = EpochController::new(EvalConfig::default(), Arc::new(Yes)).unwrap();
        let err = controller
            .run_sources(vec![source("a", &["yes"]), source("a", &["yes"])])
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Config(ConfigError::DuplicateTask { .. })));
    }

    #[tokio::test]
    async fn test_bounds_resolved_before_any_example() {
        let config = EvalConfig::default().with_num_epochs(0.5);
        let mut controller = EpochController::new(config, Arc::new(Yes)).unwrap();
        let examples = vec![Example::new("q").with_labels(["yes"])];
        let stream = Box::new(ExampleSource::new("stream", examples).streaming());
        let err = controller
            .run_sources(vec![source("a", &["yes", "yes"]), stream])
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Config(ConfigError::InvalidOption { .. })));
        assert!(controller.finished().is_empty());
    }
}
