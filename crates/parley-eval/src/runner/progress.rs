//! Progress reporting during evaluation
//!
//! Evaluators publish copies of their task report after every fold; the hub
//! recomputes a global report from the latest copies every N folds and hands
//! it to the registered callback.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::metrics::{AggregationMode, GlobalReport, TaskReport};

/// Callback for progress updates during evaluation
pub type ProgressCallback = Arc<dyn Fn(EvalProgress) + Send + Sync>;

/// Progress update during evaluation
#[derive(Debug, Clone)]
pub struct EvalProgress {
    /// Task whose fold triggered this update
    pub task_id: String,
    /// Examples folded so far for that task
    pub task_exs: u64,
    /// Global report over every task seen so far
    pub report: GlobalReport,
}

#[derive(Default)]
struct HubState {
    snapshots: BTreeMap<String, TaskReport>,
    folded: u64,
}

/// Shared sink for task snapshots
pub struct ProgressHub {
    callback: ProgressCallback,
    every: u64,
    mode: AggregationMode,
    state: Mutex<HubState>,
}

impl ProgressHub {
    pub fn new(callback: ProgressCallback, every: u64, mode: AggregationMode) -> Self {
        Self {
            callback,
            every: every.max(1),
            mode,
            state: Mutex::new(HubState::default()),
        }
    }

    /// Record the latest snapshot of a task after one fold
    pub fn record(&self, task_id: &str, snapshot: TaskReport) {
        let task_exs = snapshot.exs;
        let report = {
            let mut state = self.state.lock();
            state.snapshots.insert(task_id.to_string(), snapshot);
            state.folded += 1;
            if state.folded % self.every != 0 {
                return;
            }
            GlobalReport::aggregate(&state.snapshots, self.mode)
        };

        // callback runs outside the lock
        (self.callback)(EvalProgress {
            task_id: task_id.to_string(),
            task_exs,
            report,
        });
    }
}
