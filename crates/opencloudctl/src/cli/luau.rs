//! Luau execution command definitions

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Options shared by commands that can wait on a task
#[derive(Args, Debug, Clone)]
pub struct WaitArgs {
    /// Wait for the task to reach a terminal state
    #[arg(long)]
    pub wait: bool,

    /// Polling interval in seconds
    #[arg(long, default_value = "5", requires = "wait")]
    pub interval: u64,

    /// Give up waiting after this many seconds
    #[arg(long, requires = "wait")]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum LuauCommands {
    /// Run a script in a place
    #[command(visible_alias = "exec")]
    #[command(after_help = "EXAMPLES:
    # Inline script, print the created task
    opencloudctl luau run 1234 5678 --script 'return game.PlaceId'

    # Script file against a specific place version, wait up to two minutes
    opencloudctl luau run 1234 5678 --version 12 --file main.luau --wait --timeout 120

    # Send a binary input and save the binary output
    opencloudctl luau run 1234 5678 --file build.luau \\
        --binary-input model.rbxm --binary-output result.bin --wait
")]
    Run {
        /// Universe ID
        universe: String,

        /// Place ID
        place: String,

        /// Place version to run against (latest when omitted)
        #[arg(long = "version", value_name = "VERSION")]
        place_version: Option<String>,

        /// Script source
        #[arg(long, conflicts_with = "file", required_unless_present_any = ["file", "binary_input"])]
        script: Option<String>,

        /// Read the script source from a file
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Maximum script run time in seconds, enforced by the server
        #[arg(long, value_name = "SECS")]
        script_timeout: Option<u64>,

        /// Upload this file as the task's binary input
        #[arg(long, value_name = "PATH")]
        binary_input: Option<PathBuf>,

        /// Enable binary output and save it to this file once the task completes
        #[arg(long, value_name = "PATH", requires = "wait")]
        binary_output: Option<PathBuf>,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Get a task by path, optionally waiting for it to finish
    #[command(visible_alias = "get")]
    Task {
        /// Task path, e.g. universes/1/places/2/luau-execution-session-tasks/<id>
        path: String,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// List the log output of a task
    Logs {
        /// Task path
        path: String,

        /// Log chunks per page
        #[arg(long)]
        max_page_size: Option<u32>,

        /// Continue from a previous page
        #[arg(long)]
        page_token: Option<String>,

        /// Follow page tokens until every page has been read
        #[arg(long, conflicts_with = "page_token")]
        all: bool,
    },
}
