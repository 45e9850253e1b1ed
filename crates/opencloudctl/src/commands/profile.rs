//! Profile management command implementations

use std::io::{self, BufRead, Write};

use opencloudctl_core::config::{CredentialStore, DEFAULT_BASE_URL, Profile};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::cli::{self, ProfileCommands};
use crate::connection::ConnectionManager;
use crate::error::{CliError, Result as CliResult};
use crate::output::{OutputFormat, print_output};

/// Profile as shown to the user, with the secret masked
#[derive(Debug, Serialize)]
struct ProfileView<'a> {
    name: &'a str,
    auth: String,
    token: String,
    base_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    is_default: bool,
}

impl<'a> ProfileView<'a> {
    fn new(name: &'a str, profile: &'a Profile, default_profile: Option<&str>) -> Self {
        Self {
            name,
            auth: profile.auth.to_string(),
            token: mask_secret(&profile.token),
            base_url: &profile.base_url,
            timeout_secs: profile.timeout_secs,
            is_default: default_profile == Some(name),
        }
    }
}

/// Handle profile management commands
pub async fn handle_profile_command(
    profile_cmd: &ProfileCommands,
    conn_mgr: &mut ConnectionManager,
    output_format: cli::OutputFormat,
) -> CliResult<()> {
    use ProfileCommands::*;

    match profile_cmd {
        List => handle_list(conn_mgr, output_format),
        Path => handle_path(conn_mgr, output_format),
        Show { name } => handle_show(conn_mgr, name, output_format),
        Set {
            name,
            auth,
            token,
            base_url,
            timeout_secs,
            default,
            #[cfg(feature = "secure-storage")]
            use_keyring,
        } => {
            #[cfg(feature = "secure-storage")]
            let token = if *use_keyring {
                store_in_keyring(name, token)?
            } else {
                token.clone()
            };
            #[cfg(not(feature = "secure-storage"))]
            let token = token.clone();

            let profile = Profile {
                auth: *auth,
                token,
                base_url: base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout_secs: *timeout_secs,
            };
            handle_set(conn_mgr, name, profile, *default)
        }
        Remove { name, yes } => handle_remove(conn_mgr, name, *yes),
        Default { name } => handle_default(conn_mgr, name),
    }
}

fn handle_list(conn_mgr: &ConnectionManager, output_format: cli::OutputFormat) -> CliResult<()> {
    debug!("Listing all configured profiles");
    let profiles = conn_mgr.config.list_profiles();
    trace!("Found {} profiles", profiles.len());

    let default_profile = conn_mgr.config.default_profile.as_deref();
    let views: Vec<ProfileView<'_>> = profiles
        .iter()
        .map(|(name, profile)| ProfileView::new(name, profile, default_profile))
        .collect();

    let format = OutputFormat::resolve(output_format, OutputFormat::Table);
    if views.is_empty() && format == OutputFormat::Table {
        println!("No profiles configured.");
        println!("Use 'opencloudctl profile set' to create a profile.");
        return Ok(());
    }

    print_output(views, format)?;
    Ok(())
}

fn handle_path(conn_mgr: &ConnectionManager, output_format: cli::OutputFormat) -> CliResult<()> {
    let config_path = conn_mgr.config_file()?;

    match output_format {
        cli::OutputFormat::Json | cli::OutputFormat::Yaml => {
            let output_data = serde_json::json!({
                "config_path": config_path.to_string_lossy()
            });
            print_output(
                &output_data,
                OutputFormat::resolve(output_format, OutputFormat::Json),
            )?;
        }
        _ => println!("{}", config_path.display()),
    }
    Ok(())
}

fn handle_show(
    conn_mgr: &ConnectionManager,
    name: &str,
    output_format: cli::OutputFormat,
) -> CliResult<()> {
    let profile = conn_mgr
        .config
        .profiles
        .get(name)
        .ok_or_else(|| CliError::ProfileNotFound { name: name.into() })?;

    let view = ProfileView::new(name, profile, conn_mgr.config.default_profile.as_deref());
    print_output(view, OutputFormat::resolve(output_format, OutputFormat::Table))?;
    Ok(())
}

fn handle_set(
    conn_mgr: &mut ConnectionManager,
    name: &str,
    profile: Profile,
    make_default: bool,
) -> CliResult<()> {
    debug!("Setting profile: {} ({})", name, profile.auth);

    let existed = conn_mgr.config.profiles.contains_key(name);
    conn_mgr.config.set_profile(name.to_string(), profile);

    // The first profile becomes the default
    if make_default || conn_mgr.config.default_profile.is_none() {
        conn_mgr.config.default_profile = Some(name.to_string());
    }

    conn_mgr.save_config()?;

    if existed {
        println!("Profile '{}' updated successfully.", name);
    } else {
        println!("Profile '{}' created successfully.", name);
    }
    if conn_mgr.config.default_profile.as_deref() == Some(name) {
        println!("Profile '{}' is the default profile.", name);
    }
    Ok(())
}

fn handle_remove(conn_mgr: &mut ConnectionManager, name: &str, yes: bool) -> CliResult<()> {
    debug!("Removing profile: {}", name);

    if !conn_mgr.config.profiles.contains_key(name) {
        return Err(CliError::ProfileNotFound { name: name.into() });
    }

    if !yes && !confirm(&format!("Are you sure you want to remove profile '{}'?", name))? {
        println!("Profile removal cancelled.");
        return Ok(());
    }

    let was_default = conn_mgr.config.default_profile.as_deref() == Some(name);
    if let Some(removed) = conn_mgr.config.remove_profile(name) {
        forget_keyring_token(&removed);
    }
    conn_mgr.save_config()?;

    println!("Profile '{}' removed successfully.", name);
    if was_default {
        println!("Default profile cleared.");
    }
    Ok(())
}

fn handle_default(conn_mgr: &mut ConnectionManager, name: &str) -> CliResult<()> {
    debug!("Setting default profile: {}", name);

    if !conn_mgr.config.profiles.contains_key(name) {
        return Err(CliError::ProfileNotFound { name: name.into() });
    }

    conn_mgr.config.default_profile = Some(name.to_string());
    conn_mgr.save_config()?;

    println!("Default profile set to '{}'.", name);
    Ok(())
}

/// Ask a yes/no question on stdin; anything but y/yes is no
fn confirm(question: &str) -> CliResult<bool> {
    print!("{} (y/N): ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

#[cfg(feature = "secure-storage")]
fn store_in_keyring(name: &str, token: &str) -> CliResult<String> {
    let store = CredentialStore::new();
    if store.storage_backend() != "keyring" {
        return Err(CliError::Configuration(
            "OS keyring is not available on this system".to_string(),
        ));
    }
    Ok(store.store_credential(&format!("{name}-token"), token)?)
}

/// Delete a removed profile's keyring entry; failures only warn
fn forget_keyring_token(profile: &Profile) {
    let Some(key) = profile.token.strip_prefix("keyring:") else {
        return;
    };
    if let Err(e) = CredentialStore::new().delete_credential(key) {
        warn!("Failed to delete keyring entry '{}': {}", key, e);
    }
}

/// Mask a stored secret for display
///
/// References (`keyring:...`, `${VAR}`) are shown as-is since they are not
/// secrets themselves.
fn mask_secret(secret: &str) -> String {
    if CredentialStore::is_keyring_reference(secret) || secret.starts_with("${") {
        return secret.to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}
