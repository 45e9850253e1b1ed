//! Connection management for Open Cloud clients

use std::path::PathBuf;

use anyhow::Context;
use opencloudctl_core::OpenCloudClient;
use opencloudctl_core::config::{API_KEY_ENV, Config, DEFAULT_BASE_URL, OAUTH_TOKEN_ENV};
use tracing::{debug, info, trace};

use crate::error::{CliError, Result as CliResult};

/// Environment variable that overrides the API host when no profile is configured
pub const BASE_URL_ENV: &str = "OPENCLOUD_BASE_URL";

/// Connection manager for creating authenticated clients
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    pub config: Config,
    pub config_path: Option<PathBuf>,
}

impl ConnectionManager {
    /// Create a new connection manager with a custom config path
    pub fn with_config_path(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// Save the configuration to the appropriate location
    pub fn save_config(&self) -> CliResult<()> {
        if let Some(ref path) = self.config_path {
            self.config
                .save_to_path(path)
                .context("Failed to save configuration")?;
        } else {
            self.config.save().context("Failed to save configuration")?;
        }
        Ok(())
    }

    /// Path of the configuration file in use
    pub fn config_file(&self) -> CliResult<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Config::config_path()?),
        }
    }

    /// Create a client from profile credentials
    ///
    /// With no profiles configured and no explicit `--config-file`, the
    /// client is built from `OPENCLOUD_API_KEY` or `OPENCLOUD_OAUTH_TOKEN`
    /// (plus `OPENCLOUD_BASE_URL`) so one-off calls need no setup.
    pub fn create_client(&self, profile_name: Option<&str>) -> CliResult<OpenCloudClient> {
        trace!("Profile name: {:?}", profile_name);

        if profile_name.is_none() && self.config.profiles.is_empty() && self.config_path.is_none()
        {
            if let Some(client) = Self::client_from_env()? {
                return Ok(client);
            }
            return Err(CliError::NoProfileConfigured);
        }

        let resolved = self.config.resolve_profile(profile_name)?;
        let profile = self.config.profile(Some(&resolved))?;
        info!("Using profile: {} ({})", resolved, profile.auth);
        debug!("Base URL: {}", profile.resolved_base_url());

        Ok(OpenCloudClient::from_profile(profile)?)
    }

    fn client_from_env() -> CliResult<Option<OpenCloudClient>> {
        let builder = if let Ok(key) = std::env::var(API_KEY_ENV) {
            info!("Using API key from {}", API_KEY_ENV);
            OpenCloudClient::builder().api_key(key)
        } else if let Ok(token) = std::env::var(OAUTH_TOKEN_ENV) {
            info!("Using OAuth token from {}", OAUTH_TOKEN_ENV);
            OpenCloudClient::builder().oauth_token(token)
        } else {
            return Ok(None);
        };

        let base_url = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        debug!("Base URL: {}", base_url);
        Ok(Some(builder.base_url(base_url).build()?))
    }
}
