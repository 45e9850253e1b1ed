//! Unified error handling for opencloudctl-core
//!
//! Every fallible operation in the crate returns [`CoreError`]. Transport
//! failures, rejected requests, and undecodable bodies are kept apart so a
//! caller can tell "the server said no" from "the server said yes but sent
//! something we can't read".
//!
//! # Example
//!
//! ```rust
//! use opencloudctl_core::{CoreError, HttpFault};
//!
//! fn describe(err: &CoreError) -> &'static str {
//!     if err.is_not_found() {
//!         "missing"
//!     } else if err.is_retryable() {
//!         "try again later"
//!     } else {
//!         "failed"
//!     }
//! }
//!
//! let err = CoreError::Http(HttpFault::new(404, "404 Not Found", b"{}".to_vec()));
//! assert_eq!(describe(&err), "missing");
//! ```

use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::ConfigError;

/// Core error type for every remote and local failure
#[derive(Error, Debug)]
pub enum CoreError {
    /// Connection, DNS, timeout, or body-read failure from the underlying sender
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote API answered with a non-2xx status
    #[error(transparent)]
    Http(#[from] HttpFault),

    /// A 2xx body could not be decoded into the requested type
    #[error("Failed to decode response into {target}: {source}")]
    Decode {
        target: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A request body could not be encoded as JSON
    #[error("Failed to serialize request body: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Caller-supplied data failed a local precondition
    #[error("Validation error: {0}")]
    Validation(String),

    /// Base URL, request path, or out-of-band URL could not be parsed
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A tracked task ended in FAILED or CANCELLED
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// A tracked task did not reach a terminal state in time
    #[error("Task timed out after {0:?}")]
    TaskTimeout(Duration),

    /// The poll tracking a task was cancelled before it finished
    #[error("Polling was cancelled before the task reached a terminal state")]
    PollCancelled,

    /// Configuration or profile error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// HTTP status code, if this error came from a non-2xx response
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            CoreError::Http(fault) => Some(fault.status),
            CoreError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns true if this is an authentication/authorization error (401/403)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// Returns true if this is a rate limiting error (429)
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Returns true if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    /// Returns true if this is a bad request error (400) or a local validation failure
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        match self {
            CoreError::Validation(_) => true,
            _ => self.status() == Some(400),
        }
    }

    /// Returns true if this is a timeout error
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            CoreError::Transport(e) => e.is_timeout(),
            CoreError::TaskTimeout(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error is potentially retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Transport(e) => e.is_timeout() || e.is_connect(),
            CoreError::Http(_) => self.is_rate_limited() || self.is_server_error(),
            CoreError::TaskTimeout(_) => true,
            _ => false,
        }
    }
}

/// A non-2xx response from the remote API
///
/// Carries the raw body so the caller can reconstruct whatever error payload
/// the server returned; no schema is assumed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP error: {status_text}")]
pub struct HttpFault {
    /// Numeric status code
    pub status: u16,
    /// Status line text, e.g. `"404 Not Found"`
    pub status_text: String,
    /// Raw response body
    pub body: Vec<u8>,
}

impl HttpFault {
    pub fn new(status: u16, status_text: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body,
        }
    }

    /// Body as UTF-8 text, lossy
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the error body into a caller-chosen shape
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|source| CoreError::Decode {
            target: std::any::type_name::<T>(),
            source,
        })
    }
}
