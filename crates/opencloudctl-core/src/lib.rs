//! # opencloudctl-core
//!
//! Async client core for the Roblox Open Cloud API, shared by the
//! `opencloudctl` CLI and any program that wants to script against Open Cloud.
//!
//! ## Layers
//!
//! - [`transport`]: injects the API key or OAuth bearer token into every request
//! - [`client`]: builds requests, turns non-2xx into [`HttpFault`], decodes bodies on demand
//! - [`poll`]: generic "fetch until the handler says done" driver
//! - [`luau`]: Luau execution tasks and the [`TaskTracker`](luau::TaskTracker) that waits on them
//! - [`universes`]: universe and place operations with local validation
//! - [`config`]: TOML profiles and credential resolution
//!
//! ## Example
//!
//! ```rust,no_run
//! use opencloudctl_core::OpenCloudClient;
//! use opencloudctl_core::luau::{CreateTaskRequest, LuauExecutionHandler, TaskTracker, WaitOptions};
//!
//! # async fn demo() -> opencloudctl_core::Result<()> {
//! let client = OpenCloudClient::builder().api_key("my-key").build()?;
//!
//! let created = LuauExecutionHandler::new(client.clone())
//!     .create_task("1234", "5678", None, &CreateTaskRequest::script("return 1 + 1"))
//!     .await?;
//!
//! let finished = TaskTracker::new(client)
//!     .wait_for_success(&created.task_path()?, WaitOptions::default())
//!     .await?;
//! println!("{:?}", finished.results());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod luau;
pub mod poll;
pub mod progress;
pub mod transport;
pub mod universes;

pub use client::{
    ApiResponse, ClientSettings, Discard, Method, OpenCloudClient, OpenCloudClientBuilder, Query,
};
pub use error::{CoreError, HttpFault, Result};
pub use poll::{DEFAULT_POLL_INTERVAL, Done, PollHandle, PollOutcome, poll, poll_with_cancellation};
pub use progress::{ProgressCallback, ProgressEvent};
pub use transport::{AuthenticatingTransport, Credential, RequestSender};
