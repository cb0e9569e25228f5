//! Core example and datatype definitions
//!
//! Defines labeled examples and the data split a task is evaluated on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// A single labeled example produced by a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Input text shown to the model
    pub text: String,

    /// Acceptable answers (empty for unlabeled data)
    #[serde(default)]
    pub labels: Vec<String>,

    /// Candidate answers a ranking model may choose from
    #[serde(default)]
    pub label_candidates: Vec<String>,

    /// Whether this example ends its episode
    #[serde(default = "default_episode_done")]
    pub episode_done: bool,
}

fn default_episode_done() -> bool {
    true
}

impl Example {
    /// Create an unlabeled single-turn example
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            labels: Vec::new(),
            label_candidates: Vec::new(),
            episode_done: default_episode_done(),
        }
    }

    /// Set the labels
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the label candidates
    pub fn with_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label_candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Set whether the example ends its episode
    pub fn with_episode_done(mut self, done: bool) -> Self {
        self.episode_done = done;
        self
    }
}

/// Data split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    /// Name used in datatype strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

/// Split plus modifiers, written as `train`, `train:evalmode`, `valid:stream`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataType {
    /// Underlying split
    pub split: Split,

    /// Walk the split once, in order, without learning (only meaningful for train)
    pub evalmode: bool,

    /// Stream examples without declaring an epoch size
    pub stream: bool,
}

impl DataType {
    /// Plain datatype for a split
    pub fn new(split: Split) -> Self {
        Self {
            split,
            evalmode: false,
            stream: false,
        }
    }

    /// Training data walked once for evaluation
    pub fn train_evalmode() -> Self {
        Self {
            evalmode: true,
            ..Self::new(Split::Train)
        }
    }

    /// Whether examples cycle and shuffle as in training
    pub fn is_training(&self) -> bool {
        self.split == Split::Train && !self.evalmode
    }
}

impl Default for DataType {
    fn default() -> Self {
        Self::new(Split::Valid)
    }
}

impl FromStr for DataType {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidDataType {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = value.trim().split(':');
        let split = match parts.next().map(str::trim) {
            Some("train") => Split::Train,
            Some("valid") => Split::Valid,
            Some("test") => Split::Test,
            _ => return Err(invalid("split must be train, valid or test")),
        };

        let mut datatype = DataType::new(split);
        for modifier in parts {
            match modifier.trim() {
                "evalmode" => datatype.evalmode = true,
                "stream" => datatype.stream = true,
                "ordered" => {}
                other => return Err(invalid(&format!("unknown modifier '{other}'"))),
            }
        }
        Ok(datatype)
    }
}

impl TryFrom<String> for DataType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(datatype: DataType) -> Self {
        datatype.to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.split.as_str())?;
        if self.stream {
            write!(f, ":stream")?;
        }
        if self.evalmode {
            write!(f, ":evalmode")?;
        }
        Ok(())
    }
}
