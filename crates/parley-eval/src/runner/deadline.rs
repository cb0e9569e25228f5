//! Cooperative run deadline

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Wall-clock deadline plus external cancellation, polled at batch boundaries
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Option<Instant>,
    token: CancellationToken,
}

impl Deadline {
    /// Start a deadline that expires `timeout` from now, or only on cancellation
    pub fn start(timeout: Option<Duration>, token: CancellationToken) -> Self {
        Self {
            at: timeout.map(|t| Instant::now() + t),
            token,
        }
    }

    /// Whether evaluation must stop before the next batch
    pub fn expired(&self) -> bool {
        self.token.is_cancelled() || self.at.is_some_and(|at| Instant::now() >= at)
    }
}
