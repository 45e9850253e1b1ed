//! CLI structure and command definitions
//!
//! Two layers, the same way the API is layered:
//! 1. Raw API access (`api`)
//! 2. Typed commands for Luau execution and universes (`luau`, `universe`)

use clap::{Parser, Subcommand};
use opencloudctl_core::Method;
use opencloudctl_core::config::AuthKind;

pub mod luau;
pub mod universe;

pub use luau::*;
pub use universe::*;

/// Command-line client for the Roblox Open Cloud API
#[derive(Parser, Debug)]
#[command(name = "opencloudctl")]
#[command(version, about = "Command-line client for the Roblox Open Cloud API")]
#[command(long_about = "
Command-line client for the Roblox Open Cloud API

EXAMPLES:
    # Store an API key in a profile
    opencloudctl profile set prod --auth api-key --token <key>

    # Run a script in a place and wait for the result
    opencloudctl luau run 1234 5678 --script 'return 1 + 1' --wait

    # Check on a task you started earlier
    opencloudctl luau task universes/1234/places/5678/luau-execution-session-tasks/<id>

    # Direct API access
    opencloudctl api get /cloud/v2/universes/1234

For more help on a specific command, run:
    opencloudctl <command> --help
")]
pub struct Cli {
    /// Profile to use for this command
    #[arg(long, short, global = true, env = "OPENCLOUDCTL_PROFILE")]
    pub profile: Option<String>,

    /// Path to alternate configuration file
    #[arg(long, global = true, env = "OPENCLOUDCTL_CONFIG_FILE")]
    pub config_file: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "auto")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Choose based on the command
    Auto,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Human-readable table format
    Table,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Raw API access - direct REST endpoint calls
    #[command(name = "api")]
    #[command(after_help = "EXAMPLES:
    # GET a universe
    opencloudctl api get /cloud/v2/universes/1234

    # GET with query parameters
    opencloudctl api get /cloud/v2/universes/1234/places/5678/luau-execution-session-tasks/<id>/logs \\
        --query maxPageSize=10

    # POST with JSON data
    opencloudctl api post /cloud/v2/universes/1234:publishMessage \\
        --data '{\"topic\":\"news\",\"message\":\"hello\"}'

    # POST from file
    opencloudctl api post /cloud/v2/universes/1234/places/5678/luau-execution-session-tasks \\
        --data @task.json
")]
    Api {
        /// HTTP method
        #[arg(value_parser = parse_http_method)]
        method: HttpMethod,

        /// API endpoint path (e.g., /cloud/v2/universes/1234)
        path: String,

        /// Request body (JSON string or @file)
        #[arg(long)]
        data: Option<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(long = "query", short = 'q', value_name = "KEY=VALUE", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,
    },

    /// Run Luau scripts in places and track their tasks
    #[command(subcommand, visible_alias = "lu")]
    Luau(LuauCommands),

    /// Universe and place operations
    #[command(subcommand, visible_alias = "uni")]
    Universe(UniverseCommands),

    /// Profile management
    #[command(subcommand, visible_alias = "prof", visible_alias = "pr")]
    #[command(after_help = "EXAMPLES:
    # Create an API key profile
    opencloudctl profile set prod --auth api-key --token <key>

    # Create an OAuth profile against another host
    opencloudctl profile set staging --auth oauth --token <token> --base-url https://apis.example.test

    # List all profiles
    opencloudctl profile list

    # Show profile details
    opencloudctl profile show prod

    # Change the default profile
    opencloudctl profile default prod
")]
    Profile(ProfileCommands),

    /// Version information
    #[command(visible_alias = "ver")]
    Version,
}

/// HTTP methods for raw API access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// Parse HTTP method case-insensitively
fn parse_http_method(s: &str) -> Result<HttpMethod, String> {
    match s.to_lowercase().as_str() {
        "get" => Ok(HttpMethod::Get),
        "post" => Ok(HttpMethod::Post),
        "put" => Ok(HttpMethod::Put),
        "patch" => Ok(HttpMethod::Patch),
        "delete" => Ok(HttpMethod::Delete),
        _ => Err(format!(
            "invalid HTTP method: {} (valid: get, post, put, patch, delete)",
            s
        )),
    }
}

/// Parse `key=value`; the value may itself contain '='
fn parse_query_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid query parameter '{s}' (expected key=value)")),
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Patch => write!(f, "PATCH"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// Profile management commands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List all configured profiles
    #[command(visible_alias = "ls", visible_alias = "l")]
    List,

    /// Show the path to the configuration file
    Path,

    /// Show details of a specific profile
    #[command(visible_alias = "sh", visible_alias = "get")]
    Show {
        /// Profile name to show
        name: String,
    },

    /// Set or create a profile
    #[command(visible_alias = "add", visible_alias = "create")]
    #[command(after_help = "EXAMPLES:
    # API key profile, made the default
    opencloudctl profile set prod --auth api-key --token <key> --default

    # Token read from the environment each time the profile is used
    opencloudctl profile set ci --auth api-key --token '${OPENCLOUD_CI_KEY}'

    # Longer per-request timeout
    opencloudctl profile set slow --auth oauth --token <token> --timeout-secs 120
")]
    Set {
        /// Profile name
        name: String,

        /// Credential kind stored in the profile
        #[arg(long, value_enum, default_value = "api-key")]
        auth: AuthKind,

        /// API key or OAuth access token
        #[arg(long)]
        token: String,

        /// API host override
        #[arg(long)]
        base_url: Option<String>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Make this the default profile
        #[arg(long)]
        default: bool,

        /// Store the token in the OS keyring instead of the config file
        #[cfg(feature = "secure-storage")]
        #[arg(long)]
        use_keyring: bool,
    },

    /// Remove a profile
    #[command(visible_alias = "rm", visible_alias = "del", visible_alias = "delete")]
    Remove {
        /// Profile name to remove
        name: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Set the default profile
    #[command(visible_alias = "def")]
    Default {
        /// Profile name
        name: String,
    },
}
