//! Configuration and profile management
//!
//! Profiles live in a TOML file and name the credential kind, the secret
//! (plaintext, `${ENV}` expansion, or a `keyring:` reference), and an
//! optional base URL override.

#![allow(clippy::module_inception)]

pub mod config;
pub mod credential;
pub mod error;

pub use config::{API_KEY_ENV, AuthKind, Config, DEFAULT_BASE_URL, OAUTH_TOKEN_ENV, Profile};
pub use credential::{CredentialStorage, CredentialStore};
pub use error::{ConfigError, Result};
