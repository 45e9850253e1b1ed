//! Generic "fetch until told to stop" driver
//!
//! [`poll`] spawns one tokio task that repeatedly awaits `fetch`, hands the
//! value and a [`Done`] signal to `handler`, and sleeps between attempts
//! until the handler calls [`Done::done`]. The poller knows nothing about
//! what it is fetching; a fetch that can fail should return a `Result` and
//! let the handler decide what a failure means.
//!
//! # Example
//!
//! ```rust,no_run
//! use opencloudctl_core::poll::poll;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let calls = Arc::new(AtomicU32::new(0));
//! let counter = calls.clone();
//!
//! let handle = poll(
//!     move || {
//!         let counter = counter.clone();
//!         async move { counter.fetch_add(1, Ordering::SeqCst) + 1 }
//!     },
//!     |attempt, done| {
//!         if attempt == 3 {
//!             done.done();
//!         }
//!     },
//!     Some(Duration::from_millis(100)),
//! );
//!
//! let outcome = handle.join().await;
//! assert_eq!(outcome.attempts(), 3);
//! # }
//! ```

use std::cell::Cell;
use std::future::Future;
use std::panic;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};

/// Interval between attempts when the caller does not pick one
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollState {
    Running,
    Stopped,
}

/// Single-fire completion signal passed to the poll handler
///
/// The first call to [`Done::done`] moves the poll from running to stopped;
/// later calls do nothing. No fetch happens after the handler returns from
/// the iteration in which it fired.
#[derive(Debug)]
pub struct Done {
    state: Cell<PollState>,
}

impl Done {
    fn new() -> Self {
        Self {
            state: Cell::new(PollState::Running),
        }
    }

    /// Signal that polling should stop
    pub fn done(&self) {
        if self.state.get() == PollState::Running {
            self.state.set(PollState::Stopped);
            trace!("poll completion signalled");
        }
    }

    pub fn is_done(&self) -> bool {
        self.state.get() == PollState::Stopped
    }
}

/// How a poll ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The handler called `done()`
    Completed { attempts: u32 },
    /// The cancellation token fired first
    Cancelled { attempts: u32 },
}

impl PollOutcome {
    /// Number of fetches that completed
    pub fn attempts(&self) -> u32 {
        match *self {
            PollOutcome::Completed { attempts } | PollOutcome::Cancelled { attempts } => attempts,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PollOutcome::Completed { .. })
    }
}

/// Handle to a running poll
///
/// Dropping the handle does not stop the poll; call [`PollHandle::cancel`]
/// or hold a guard from [`PollHandle::drop_guard`].
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// Stop at the next fetch or sleep boundary
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Guard that cancels the poll when dropped
    pub fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the poll to stop
    ///
    /// A panic inside `fetch` or `handler` is resumed on the caller.
    pub async fn join(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
            // The task is never aborted, so the only other case is runtime shutdown
            Err(_) => PollOutcome::Cancelled { attempts: 0 },
        }
    }
}

/// Start polling on a background task and return immediately
///
/// `interval` defaults to [`DEFAULT_POLL_INTERVAL`]. `fetch` runs once
/// before the first sleep; fetches never overlap.
pub fn poll<T, F, Fut, H>(fetch: F, handler: H, interval: Option<Duration>) -> PollHandle
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    H: FnMut(T, &Done) + Send + 'static,
{
    poll_with_cancellation(fetch, handler, interval, CancellationToken::new())
}

/// Like [`poll`], but also stops when `token` is cancelled
pub fn poll_with_cancellation<T, F, Fut, H>(
    fetch: F,
    handler: H,
    interval: Option<Duration>,
    token: CancellationToken,
) -> PollHandle
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    H: FnMut(T, &Done) + Send + 'static,
{
    let interval = interval.unwrap_or(DEFAULT_POLL_INTERVAL);
    let task = tokio::spawn(run(fetch, handler, interval, token.clone()));
    PollHandle { token, task }
}

async fn run<T, F, Fut, H>(
    mut fetch: F,
    mut handler: H,
    interval: Duration,
    token: CancellationToken,
) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
    H: FnMut(T, &Done),
{
    let done = Done::new();
    let mut attempts = 0u32;

    debug!(?interval, "poll started");

    loop {
        // The fetch arm is lazy so a cancelled poll never starts another fetch
        let value = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(attempts, "poll cancelled");
                return PollOutcome::Cancelled { attempts };
            }
            value = async { fetch().await } => value,
        };
        attempts += 1;

        handler(value, &done);
        if done.is_done() {
            debug!(attempts, "poll completed");
            return PollOutcome::Completed { attempts };
        }

        trace!(attempts, "waiting before next attempt");
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(attempts, "poll cancelled");
                return PollOutcome::Cancelled { attempts };
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
