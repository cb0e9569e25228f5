//! Error types for the evaluation engine

use thiserror::Error;

/// Boxed error produced by a model or task source
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Problems detected while resolving configuration, before any example runs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A metric family name that the registry does not know
    #[error("Unknown metric family '{name}' (known: {known})")]
    UnknownMetric { name: String, known: String },

    /// A task name that no loader can resolve
    #[error("Unknown task '{name}'")]
    UnknownTask { name: String },

    /// A model name with no built-in implementation
    #[error("Unknown model '{name}'")]
    UnknownModel { name: String },

    /// A datatype string that does not parse
    #[error("Invalid datatype '{value}': {reason}")]
    InvalidDataType { value: String, reason: String },

    /// The same task listed more than once
    #[error("Task '{name}' is listed more than once")]
    DuplicateTask { name: String },

    /// A task file or directory that could not be loaded
    #[error("Failed to load task '{name}': {message}")]
    TaskLoad { name: String, message: String },

    /// An option value that is out of range or contradicts another option
    #[error("Invalid option '{option}': {message}")]
    InvalidOption { option: String, message: String },
}

impl ConfigError {
    /// Create a new invalid option error
    pub fn invalid_option(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            message: message.into(),
        }
    }

    /// Create a new unknown task error
    pub fn unknown_task(name: impl Into<String>) -> Self {
        Self::UnknownTask { name: name.into() }
    }
}

/// Main error type for evaluation runs
#[derive(Error, Debug)]
pub enum EvalError {
    /// Configuration related errors, fatal at startup
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A single example failed; the task's pass was aborted at that point
    #[error("Evaluation of task '{task}' failed at example {index}: {source}")]
    Evaluation {
        task: String,
        index: u64,
        #[source]
        source: BoxError,
    },
}

impl EvalError {
    /// Create a new evaluation error for a task and example offset
    pub fn evaluation(task: impl Into<String>, index: u64, source: impl Into<BoxError>) -> Self {
        Self::Evaluation {
            task: task.into(),
            index,
            source: source.into(),
        }
    }

    /// Task identifier of a failed pass, if this is an evaluation failure
    pub fn task(&self) -> Option<&str> {
        match self {
            Self::Evaluation { task, .. } => Some(task),
            _ => None,
        }
    }
}
