//! Error types for opencloudctl
//!
//! Every command returns [`CliError`]; `main` prints it as a cargo-style
//! diagnostic with suggestions and exits non-zero.

use colored::Colorize;
use opencloudctl_core::CoreError;
use opencloudctl_core::config::ConfigError;
use thiserror::Error;

/// Cargo-style diagnostic formatter for CLI errors.
///
/// Produces structured output like:
/// ```text
/// error: Profile 'prod' not found
///
///   tip: List available profiles: opencloudctl profile list
/// ```
pub struct CliDiagnostic {
    message: String,
    tips: Vec<String>,
}

impl CliDiagnostic {
    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            tips: Vec::new(),
        }
    }

    pub fn tip(mut self, description: &str) -> Self {
        self.tips.push(description.to_string());
        self
    }

    /// Render without colors
    pub fn render(&self) -> String {
        let mut out = format!("error: {}", self.message);
        for tip in &self.tips {
            out.push_str(&format!("\n\n  tip: {tip}"));
        }
        out
    }

    /// Print the diagnostic to stderr with colored formatting.
    pub fn print(&self) {
        eprint!("{}{}", "error".red().bold(), ": ".bold());
        eprintln!("{}", self.message);

        for tip in &self.tips {
            eprintln!();
            eprint!("  {}{}", "tip".yellow().bold(), ": ".bold());
            eprintln!("{}", tip);
        }
    }
}

/// Main error type for the opencloudctl application
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("No profile configured. Use 'opencloudctl profile set' to configure a profile.")]
    NoProfileConfigured,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("API error: {message}")]
    ApiError { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("File error for '{path}': {message}")]
    FileError { path: String, message: String },

    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("Task failed: {message}")]
    TaskFailed { message: String },

    #[error("Output formatting error: {message}")]
    OutputError { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type for opencloudctl commands
pub type Result<T> = std::result::Result<T, CliError>;

impl CliError {
    /// Get helpful suggestions for resolving this error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            CliError::ProfileNotFound { name } => vec![
                "List available profiles: opencloudctl profile list".to_string(),
                format!("Create profile '{name}': opencloudctl profile set {name} --token <token>"),
                "Check profile name spelling".to_string(),
            ],
            CliError::NoProfileConfigured => vec![
                "Create an API key profile: opencloudctl profile set prod --auth api-key --token <key>".to_string(),
                "Or set OPENCLOUD_API_KEY for a one-off call".to_string(),
                "View profile documentation: opencloudctl profile --help".to_string(),
            ],
            CliError::AuthenticationFailed { .. } => vec![
                "Check your credentials: opencloudctl profile show <profile>".to_string(),
                "Verify the API key has the scopes this operation needs".to_string(),
                "Check that the key's IP allowlist includes this machine".to_string(),
            ],
            CliError::ConnectionError { .. } => vec![
                "Check network connectivity".to_string(),
                "Verify the base URL is correct: opencloudctl profile show <profile>".to_string(),
            ],
            CliError::ApiError { message } if message.starts_with("404") => vec![
                "Verify the universe, place, and task IDs are correct".to_string(),
                "Check that you're using the correct profile".to_string(),
            ],
            CliError::ApiError { message } if message.starts_with("429") => vec![
                "The API is rate limiting this key; wait before retrying".to_string(),
                "Use a larger --interval when waiting on tasks".to_string(),
            ],
            CliError::Timeout { .. } => vec![
                "Raise the limit with --timeout".to_string(),
                "Check on the task later: opencloudctl luau task <task-path>".to_string(),
            ],
            CliError::InvalidInput { .. } => vec![
                "Check the command syntax: opencloudctl <command> --help".to_string(),
            ],
            CliError::FileError { path, .. } => vec![
                format!("Check that file exists: {path}"),
                "Verify file permissions are correct".to_string(),
            ],
            _ => vec![],
        }
    }

    pub fn diagnostic(&self) -> CliDiagnostic {
        self.suggestions()
            .iter()
            .fold(CliDiagnostic::error(&self.to_string()), |diag, tip| {
                diag.tip(tip)
            })
    }

    /// Print a cargo-style diagnostic to stderr using colored formatting.
    pub fn print_diagnostic(&self) {
        self.diagnostic().print();
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Http(fault) => {
                let body = fault.body_text();
                let message = if body.trim().is_empty() {
                    fault.status_text.clone()
                } else {
                    format!("{}: {}", fault.status_text, body.trim())
                };
                if matches!(fault.status, 401 | 403) {
                    CliError::AuthenticationFailed { message }
                } else {
                    CliError::ApiError { message }
                }
            }
            CoreError::Transport(e) if e.is_timeout() => CliError::Timeout {
                message: e.to_string(),
            },
            CoreError::Transport(e) => CliError::ConnectionError {
                message: e.to_string(),
            },
            CoreError::TaskTimeout(duration) => CliError::Timeout {
                message: format!("Task did not finish within {} seconds", duration.as_secs()),
            },
            CoreError::TaskFailed(message) => CliError::TaskFailed { message },
            CoreError::Validation(message) => CliError::InvalidInput { message },
            CoreError::InvalidUrl { .. } => CliError::InvalidInput {
                message: err.to_string(),
            },
            CoreError::Config(config_err) => CliError::from(config_err),
            CoreError::Decode { .. } | CoreError::Serialization(_) | CoreError::PollCancelled => {
                CliError::ApiError {
                    message: err.to_string(),
                }
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound { name },
            ConfigError::NoProfiles { .. } => CliError::NoProfileConfigured,
            other => CliError::Configuration(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::OutputError {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::OutputError {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain on one line
        CliError::Other(format!("{err:#}"))
    }
}
