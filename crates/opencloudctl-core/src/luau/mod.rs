//! Luau execution session tasks
//!
//! Create a task, then hand its path to a [`TaskTracker`] to wait for it.

pub mod handler;
pub mod task;
pub mod tracker;

pub use handler::{
    BinaryInput, CreateTaskRequest, LogPageOptions, LuauExecutionHandler, TaskLogChunk, TaskLogs,
};
pub use task::{LuauExecutionTask, TaskError, TaskErrorCode, TaskOutput, TaskPath, TaskState};
pub use tracker::{TaskTracker, TaskWatch, WaitOptions};
