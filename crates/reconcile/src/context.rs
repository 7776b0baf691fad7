//! Progress reporting for batch execution
//!
//! Callbacks are shared across worker threads, so they take `&self` and must
//! be `Sync`.

use crate::types::Outcome;

/// Progress callback for batch execution
pub trait ProgressCallback: Sync {
    /// Called when a request starts
    fn on_start(&self, label: &str);

    /// Called when a request completes
    fn on_complete(&self, label: &str, outcome: &Outcome);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_start(&self, _label: &str) {}
    fn on_complete(&self, _label: &str, _outcome: &Outcome) {}
}

/// Progress callback that logs each step
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_start(&self, label: &str) {
        log::info!("{label}: started");
    }

    fn on_complete(&self, label: &str, outcome: &Outcome) {
        match outcome {
            Outcome::Success(s) => match s.action {
                Some(action) => log::info!("{label}: {action} complete"),
                None => log::info!("{label}: unchanged"),
            },
            Outcome::Failure(f) => log::warn!("{label}: {f}"),
        }
    }
}
