//! Evaluation runner
//!
//! Configuration, per-task evaluators and the controller that drives them.

mod config;
mod controller;
mod deadline;
mod evaluator;
mod progress;

pub use config::{EvalConfig, PassBounds};
pub use controller::{EpochController, RunSummary};
pub use deadline::Deadline;
pub use evaluator::{Evaluator, TaskRun, Termination};
pub use progress::{EvalProgress, ProgressCallback, ProgressHub};
