//! Wait for a Luau task to reach a terminal state
//!
//! [`TaskTracker`] drives the generic poller with "get the task" as the fetch
//! and "is the state terminal?" as the handler. A fetch that errors ends the
//! wait with that error; a stale read that appears to move the task backwards
//! is logged and skipped.
//!
//! # Example
//!
//! ```rust,no_run
//! use opencloudctl_core::OpenCloudClient;
//! use opencloudctl_core::luau::{TaskPath, TaskTracker, WaitOptions};
//! use std::time::Duration;
//!
//! # async fn demo(client: OpenCloudClient) -> opencloudctl_core::Result<()> {
//! let path = TaskPath::parse("universes/1/places/2/luau-execution-session-tasks/T1")?;
//! let task = TaskTracker::new(client)
//!     .wait_for_task(&path, WaitOptions::default().with_timeout(Duration::from_secs(300)))
//!     .wait()
//!     .await?;
//! println!("finished as {}", task.state);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::DropGuard;
use tracing::{debug, info, warn};

use super::handler::LuauExecutionHandler;
use super::task::{LuauExecutionTask, TaskPath, TaskState};
use crate::client::OpenCloudClient;
use crate::error::{CoreError, Result};
use crate::poll::{Done, PollHandle, poll};
use crate::progress::{ProgressCallback, ProgressEvent, emit};

/// How to wait for a task
#[derive(Default)]
pub struct WaitOptions {
    /// Time between fetches; the poller default when `None`
    pub interval: Option<Duration>,
    /// Give up after this long
    pub timeout: Option<Duration>,
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl WaitOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

/// Tracks Luau tasks to completion
#[derive(Debug, Clone)]
pub struct TaskTracker {
    tasks: LuauExecutionHandler,
}

impl TaskTracker {
    pub fn new(client: OpenCloudClient) -> Self {
        Self {
            tasks: LuauExecutionHandler::new(client),
        }
    }

    /// Start polling `path` in the background
    pub fn wait_for_task(&self, path: &TaskPath, options: WaitOptions) -> TaskWatch {
        let task_path = path.resource_path();
        let started = Instant::now();
        let (sender, receiver) = oneshot::channel();

        emit(
            &options.on_progress,
            ProgressEvent::Started {
                task_path: task_path.clone(),
            },
        );
        info!(task_path = %task_path, "waiting for Luau task");

        let fetch = {
            let tasks = self.tasks.clone();
            let path = path.clone();
            move || {
                let tasks = tasks.clone();
                let path = path.clone();
                async move { tasks.get_task(&path).await }
            }
        };

        let mut observer = StateObserver {
            task_path: task_path.clone(),
            started,
            last_state: None,
            on_progress: options.on_progress,
            sender: Some(sender),
        };
        let handler = move |fetched: Result<LuauExecutionTask>, done: &Done| {
            observer.observe(fetched, done)
        };

        let poll = poll(fetch, handler, options.interval);
        TaskWatch {
            task_path,
            guard: poll.drop_guard(),
            poll,
            receiver,
            deadline: options.timeout.map(|limit| (started + limit, limit)),
        }
    }

    /// Wait for a task and treat FAILED or CANCELLED as an error
    pub async fn wait_for_success(
        &self,
        path: &TaskPath,
        options: WaitOptions,
    ) -> Result<LuauExecutionTask> {
        let task = self.wait_for_task(path, options).wait().await?;
        match task.failure_reason() {
            Some(reason) => Err(CoreError::TaskFailed(reason)),
            None => Ok(task),
        }
    }
}

/// Poll handler state for one tracked task
struct StateObserver {
    task_path: String,
    started: Instant,
    last_state: Option<TaskState>,
    on_progress: Option<ProgressCallback>,
    sender: Option<oneshot::Sender<Result<LuauExecutionTask>>>,
}

impl StateObserver {
    fn observe(&mut self, fetched: Result<LuauExecutionTask>, done: &Done) {
        let task = match fetched {
            Ok(task) => task,
            Err(err) => {
                warn!(task_path = %self.task_path, error = %err, "fetching task failed, stopping");
                emit(
                    &self.on_progress,
                    ProgressEvent::Failed {
                        task_path: self.task_path.clone(),
                        error: err.to_string(),
                    },
                );
                self.finish(Err(err), done);
                return;
            }
        };

        if let Some(previous) = self.last_state
            && task.state.rank() < previous.rank()
        {
            warn!(
                task_path = %self.task_path,
                previous = %previous,
                observed = %task.state,
                "ignoring stale task state"
            );
            return;
        }
        self.last_state = Some(task.state);

        debug!(task_path = %self.task_path, state = %task.state, "observed task state");
        emit(
            &self.on_progress,
            ProgressEvent::Polling {
                task_path: self.task_path.clone(),
                state: task.state,
                elapsed: self.started.elapsed(),
            },
        );

        if !task.state.is_terminal() {
            return;
        }

        match task.failure_reason() {
            None => emit(
                &self.on_progress,
                ProgressEvent::Completed {
                    task_path: self.task_path.clone(),
                },
            ),
            Some(error) => emit(
                &self.on_progress,
                ProgressEvent::Failed {
                    task_path: self.task_path.clone(),
                    error,
                },
            ),
        }
        info!(task_path = %self.task_path, state = %task.state, "Luau task finished");
        self.finish(Ok(task), done);
    }

    fn finish(&mut self, result: Result<LuauExecutionTask>, done: &Done) {
        if let Some(sender) = self.sender.take() {
            // The watch may already have been dropped
            let _ = sender.send(result);
        }
        done.done();
    }
}

/// A task being waited on in the background
///
/// Dropping the watch, or a pending [`TaskWatch::wait`] future, stops the
/// poll.
#[derive(Debug)]
pub struct TaskWatch {
    task_path: String,
    poll: PollHandle,
    guard: DropGuard,
    receiver: oneshot::Receiver<Result<LuauExecutionTask>>,
    deadline: Option<(Instant, Duration)>,
}

impl TaskWatch {
    pub fn task_path(&self) -> &str {
        &self.task_path
    }

    /// Stop polling; a pending [`TaskWatch::wait`] returns `PollCancelled`
    pub fn cancel(&self) {
        self.poll.cancel();
    }

    /// Wait for the task to reach a terminal state
    ///
    /// FAILED and CANCELLED tasks are returned as `Ok`; inspect `state`.
    pub async fn wait(self) -> Result<LuauExecutionTask> {
        // Held until this future finishes or is dropped
        let TaskWatch {
            task_path,
            poll,
            guard: _guard,
            receiver,
            deadline,
        } = self;

        let received = match deadline {
            Some((at, limit)) => match tokio::time::timeout_at(at, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(task_path = %task_path, ?limit, "timed out waiting for Luau task");
                    poll.cancel();
                    poll.join().await;
                    return Err(CoreError::TaskTimeout(limit));
                }
            },
            None => receiver.await,
        };

        let outcome = poll.join().await;
        debug!(task_path = %task_path, attempts = outcome.attempts(), "poll finished");

        // A dropped sender means the poll stopped without a final answer
        received.unwrap_or(Err(CoreError::PollCancelled))
    }
}
