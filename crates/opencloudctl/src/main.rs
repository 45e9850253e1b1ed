use anyhow::Result;
use clap::Parser;
use opencloudctl_core::config::Config;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod connection;
mod error;
mod output;

use cli::{Cli, Commands};
use connection::ConnectionManager;
use error::CliError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level
    init_tracing(cli.verbose);

    let mut conn_mgr = match load_connection_manager(cli.config_file.as_deref()) {
        Ok(conn_mgr) => conn_mgr,
        Err(e) => {
            e.print_diagnostic();
            std::process::exit(1);
        }
    };

    if let Err(e) = execute_command(&cli, &mut conn_mgr).await {
        e.print_diagnostic();
        std::process::exit(1);
    }

    Ok(())
}

/// Load configuration from the specified path or the default location
fn load_connection_manager(config_file: Option<&str>) -> Result<ConnectionManager, CliError> {
    if let Some(config_file) = config_file {
        let path = std::path::PathBuf::from(config_file);
        debug!("Loading config from explicit path: {:?}", path);
        let config = Config::load_from_path(&path)?;
        Ok(ConnectionManager::with_config_path(config, Some(path)))
    } else {
        debug!("Loading config from default location");
        Ok(ConnectionManager::with_config_path(Config::load()?, None))
    }
}

fn init_tracing(verbose: u8) {
    // Check for RUST_LOG env var first, then fall back to verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "opencloudctl=warn,opencloudctl_core=warn",
            1 => "opencloudctl=info,opencloudctl_core=info",
            2 => "opencloudctl=debug,opencloudctl_core=debug",
            _ => "opencloudctl=trace,opencloudctl_core=trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}

async fn execute_command(cli: &Cli, conn_mgr: &mut ConnectionManager) -> Result<(), CliError> {
    // Log command execution with sanitized parameters
    info!("Command: {}", format_command(&cli.command));

    let start = std::time::Instant::now();
    let profile = cli.profile.as_deref();
    let result = match &cli.command {
        Commands::Version => {
            debug!("Showing version information");
            match cli.output {
                cli::OutputFormat::Json | cli::OutputFormat::Yaml => {
                    let output_data = serde_json::json!({
                        "version": env!("CARGO_PKG_VERSION"),
                        "name": env!("CARGO_PKG_NAME"),
                    });
                    output::print_output(
                        &output_data,
                        output::OutputFormat::resolve(cli.output, output::OutputFormat::Json),
                    )
                    .map_err(CliError::from)
                }
                _ => {
                    println!("opencloudctl {}", env!("CARGO_PKG_VERSION"));
                    Ok(())
                }
            }
        }

        Commands::Profile(profile_cmd) => {
            debug!("Executing profile command");
            commands::profile::handle_profile_command(profile_cmd, conn_mgr, cli.output).await
        }

        Commands::Api {
            method,
            path,
            data,
            query,
        } => {
            info!(
                "API call: {} {} {}",
                method,
                path,
                if data.is_some() { "with data" } else { "no data" }
            );
            commands::api::handle_api_command(
                conn_mgr,
                commands::api::ApiCommandParams {
                    profile_name: profile,
                    method: *method,
                    path,
                    data: data.as_deref(),
                    query,
                    output_format: cli.output,
                },
            )
            .await
        }

        Commands::Luau(luau_cmd) => {
            commands::luau::handle_luau_command(luau_cmd, conn_mgr, profile, cli.output).await
        }

        Commands::Universe(universe_cmd) => {
            commands::universe::handle_universe_command(universe_cmd, conn_mgr, profile, cli.output)
                .await
        }
    };

    let duration = start.elapsed();
    match &result {
        Ok(_) => info!("Command completed successfully in {:?}", duration),
        Err(e) => error!("Command failed after {:?}: {}", duration, e),
    }

    result
}

/// Describe a command for logs; scripts and tokens never appear
fn format_command(command: &Commands) -> String {
    match command {
        Commands::Version => "version".to_string(),
        Commands::Profile(cmd) => {
            use cli::ProfileCommands::*;
            match cmd {
                List => "profile list".to_string(),
                Path => "profile path".to_string(),
                Show { name } => format!("profile show {}", name),
                Set { name, .. } => format!("profile set {} [credentials redacted]", name),
                Remove { name, .. } => format!("profile remove {}", name),
                Default { name } => format!("profile default {}", name),
            }
        }
        Commands::Api { method, path, .. } => format!("api {} {}", method, path),
        Commands::Luau(cmd) => {
            use cli::LuauCommands::*;
            match cmd {
                Run {
                    universe, place, ..
                } => format!("luau run {} {} [script redacted]", universe, place),
                Task { path, .. } => format!("luau task {}", path),
                Logs { path, .. } => format!("luau logs {}", path),
            }
        }
        Commands::Universe(cmd) => {
            use cli::UniverseCommands::*;
            match cmd {
                Get { universe } => format!("universe get {}", universe),
                Place { universe, place } => format!("universe place {} {}", universe, place),
                UpdatePlace {
                    universe, place, ..
                } => format!("universe update-place {} {}", universe, place),
                Publish {
                    universe, topic, ..
                } => format!("universe publish {} {}", universe, topic),
                Restart { universe } => format!("universe restart {}", universe),
            }
        }
    }
}
