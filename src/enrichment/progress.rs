//! Progress reporting and cooperative cancellation for a run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::BatchResult;

/// Receives a snapshot after every unit of work.
pub trait ProgressSink: Send + Sync {
    fn report(&self, snapshot: &BatchResult);
}

impl<F> ProgressSink for F
where
    F: Fn(&BatchResult) + Send + Sync,
{
    fn report(&self, snapshot: &BatchResult) {
        self(snapshot)
    }
}

/// Sink that discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _snapshot: &BatchResult) {}
}

/// Shared cancel flag, checked between units of work. In-flight calls finish.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
