//! Progress events for long-running task tracking
//!
//! The tracker reports what it observes through an optional callback so the
//! CLI can print status lines while a library caller can ignore them.

use std::time::Duration;

use crate::luau::TaskState;

/// Progress events emitted while a task is being waited on
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Tracking has begun
    Started { task_path: String },
    /// A fetch returned the task in this state
    Polling {
        task_path: String,
        state: TaskState,
        elapsed: Duration,
    },
    /// Task reached COMPLETE
    Completed { task_path: String },
    /// Task ended FAILED or CANCELLED, or could not be fetched
    Failed { task_path: String, error: String },
}

/// Callback type for progress updates
///
/// The CLI uses this to print state changes; library callers usually pass `None`.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Helper to emit progress events
pub(crate) fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}
