//! Evaluation configuration
//!
//! Configuration options for evaluation runs, and the per-task pass bounds
//! derived from them.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::tasks::{DataType, TaskLoader};

/// Tolerance applied before flooring a fractional epoch cap, so that
/// `0.3 * 10` still yields 3
const EPOCH_EPSILON: f64 = 1e-9;

/// Configuration for evaluation runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Comma-separated task names
    #[serde(default = "default_task")]
    pub task: String,

    /// Built-in model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Split and modifiers every task is evaluated on
    #[serde(default)]
    pub datatype: DataType,

    /// Metric vocabulary (`all`, `default`, or a comma list of families)
    #[serde(default)]
    pub metrics: Option<String>,

    /// Weight global metrics by example instead of by task
    #[serde(default)]
    pub aggregate_micro: bool,

    /// Per-task example cap
    #[serde(default)]
    pub num_examples: Option<u64>,

    /// Per-task epochs, fractional allowed
    #[serde(default)]
    pub num_epochs: Option<f64>,

    /// Examples evaluated per model call
    #[serde(default = "default_batchsize")]
    pub batchsize: usize,

    /// Wall-clock deadline for the whole run
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Tasks evaluated concurrently
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,

    /// Emit a progress report every N folded examples
    #[serde(default)]
    pub log_every_n_examples: Option<u64>,

    /// Log every example and prediction at debug level
    #[serde(default)]
    pub display_examples: bool,

    /// Seed for shuffling and random models
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_task() -> String {
    "integration_tests".to_string()
}

fn default_model() -> String {
    "repeat_label".to_string()
}

fn default_batchsize() -> usize {
    1
}

fn default_max_parallel_tasks() -> usize {
    1
}

fn default_seed() -> u64 {
    42
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            task: default_task(),
            model: default_model(),
            datatype: DataType::default(),
            metrics: None,
            aggregate_micro: false,
            num_examples: None,
            num_epochs: None,
            batchsize: default_batchsize(),
            timeout_secs: None,
            max_parallel_tasks: default_max_parallel_tasks(),
            log_every_n_examples: None,
            display_examples: false,
            seed: default_seed(),
        }
    }
}

impl EvalConfig {
    /// Create a new config for a comma-separated task list
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    /// Load a config from a YAML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {:?}", path))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {:?}", path))?
        };
        Ok(config)
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the datatype
    pub fn with_datatype(mut self, datatype: DataType) -> Self {
        self.datatype = datatype;
        self
    }

    /// Set the metric vocabulary
    pub fn with_metrics(mut self, metrics: impl Into<String>) -> Self {
        self.metrics = Some(metrics.into());
        self
    }

    /// Choose micro (`true`) or macro (`false`) aggregation
    pub fn with_aggregate_micro(mut self, micro: bool) -> Self {
        self.aggregate_micro = micro;
        self
    }

    /// Set the per-task example cap
    pub fn with_num_examples(mut self, n: u64) -> Self {
        self.num_examples = Some(n);
        self
    }

    /// Set the per-task epoch count
    pub fn with_num_epochs(mut self, epochs: f64) -> Self {
        self.num_epochs = Some(epochs);
        self
    }

    /// Set the batch size
    pub fn with_batchsize(mut self, batchsize: usize) -> Self {
        self.batchsize = batchsize;
        self
    }

    /// Set the wall-clock deadline
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set how many tasks run concurrently
    pub fn with_max_parallel_tasks(mut self, n: usize) -> Self {
        self.max_parallel_tasks = n;
        self
    }

    /// Set the progress report cadence
    pub fn with_log_every_n_examples(mut self, n: u64) -> Self {
        self.log_every_n_examples = Some(n);
        self
    }

    /// Set the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Log every example and prediction
    pub fn display_examples(mut self) -> Self {
        self.display_examples = true;
        self
    }

    /// Task names in configured order
    pub fn task_names(&self) -> Vec<String> {
        TaskLoader::task_names(&self.task)
    }

    /// Reject out-of-range and contradictory options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task_names().is_empty() {
            return Err(ConfigError::invalid_option("task", "no task given"));
        }
        if self.batchsize == 0 {
            return Err(ConfigError::invalid_option("batchsize", "must be at least 1"));
        }
        if self.max_parallel_tasks == 0 {
            return Err(ConfigError::invalid_option(
                "max_parallel_tasks",
                "must be at least 1",
            ));
        }
        if self.log_every_n_examples == Some(0) {
            return Err(ConfigError::invalid_option(
                "log_every_n_examples",
                "must be at least 1",
            ));
        }
        if let Some(epochs) = self.num_epochs {
            if !epochs.is_finite() || epochs <= 0.0 {
                return Err(ConfigError::invalid_option(
                    "num_epochs",
                    format!("must be a positive number, got {epochs}"),
                ));
            }
        }
        if self.datatype.is_training() && self.num_examples.is_none() && self.num_epochs.is_none()
        {
            return Err(ConfigError::invalid_option(
                "datatype",
                "training data cycles forever; set num_examples or num_epochs",
            ));
        }
        Ok(())
    }
}

/// How far one task's evaluator may go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassBounds {
    /// Examples after which the task is complete
    pub max_examples: Option<u64>,

    /// Epoch boundaries after which the task is complete
    pub max_epochs: Option<u64>,
}

impl PassBounds {
    /// Derive the bounds of a task from the run config and its epoch length
    pub fn resolve(
        config: &EvalConfig,
        task_len: Option<u64>,
        task_id: &str,
    ) -> Result<Self, ConfigError> {
        let epoch_cap = match (config.num_epochs, task_len) {
            (Some(epochs), Some(len)) => Some((epochs * len as f64 + EPOCH_EPSILON).floor() as u64),
            (Some(epochs), None) if epochs.fract() != 0.0 => {
                return Err(ConfigError::invalid_option(
                    "num_epochs",
                    format!("task '{task_id}' has no declared epoch, fractional epochs need one"),
                ));
            }
            _ => None,
        };

        let max_examples = match (config.num_examples, epoch_cap) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let max_epochs = match config.num_epochs {
            Some(epochs) => Some(epochs.ceil() as u64),
            None if config.datatype.is_training() => None,
            None => Some(1),
        };

        Ok(Self {
            max_examples,
            max_epochs,
        })
    }
}
