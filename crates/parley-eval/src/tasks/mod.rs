//! Task definitions and loading for evaluation
//!
//! This module provides the example types, the task source trait consumed by
//! the runner, and the loaders for built-in and file-backed tasks.

mod example;
pub mod integration;
mod loader;
mod source;

pub use example::{DataType, Example, Split};
pub use loader::{FILE_TASK_PREFIX, TaskLoader, load_examples_from_yaml, load_path};
pub use source::{ExampleSource, Next, TaskSource};
