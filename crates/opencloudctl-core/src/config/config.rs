//! Configuration management for opencloudctl
//!
//! Handles configuration loading from files and environment variables.
//! Configuration is stored in TOML format with support for multiple named profiles.

#[cfg(target_os = "macos")]
use directories::BaseDirs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::credential::CredentialStore;
use super::error::{ConfigError, Result};
use crate::transport::Credential;

/// Default Open Cloud API host
pub const DEFAULT_BASE_URL: &str = "https://apis.roblox.com";

/// Environment variable that overrides an API key profile's secret
pub const API_KEY_ENV: &str = "OPENCLOUD_API_KEY";

/// Environment variable that overrides an OAuth profile's secret
pub const OAUTH_TOKEN_ENV: &str = "OPENCLOUD_OAUTH_TOKEN";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Profile used when none is given explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    /// Map of profile name -> profile configuration
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// Individual profile configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    /// Which credential kind `token` holds
    pub auth: AuthKind,
    /// API key or OAuth access token (plaintext, `${VAR}`, or `keyring:<name>`)
    pub token: String,
    /// API host override
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Supported credential kinds
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// `x-api-key` header
    ApiKey,
    /// `Authorization: Bearer` header
    Oauth,
}

impl std::fmt::Display for AuthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthKind::ApiKey => write!(f, "api_key"),
            AuthKind::Oauth => write!(f, "oauth"),
        }
    }
}

impl AuthKind {
    fn env_var(self) -> &'static str {
        match self {
            AuthKind::ApiKey => API_KEY_ENV,
            AuthKind::Oauth => OAUTH_TOKEN_ENV,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Profile {
    /// Create an API key profile against the default host
    pub fn api_key(token: impl Into<String>) -> Self {
        Self {
            auth: AuthKind::ApiKey,
            token: token.into(),
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }

    /// Create an OAuth profile against the default host
    pub fn oauth(token: impl Into<String>) -> Self {
        Self {
            auth: AuthKind::Oauth,
            token: token.into(),
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }

    /// Resolve the profile secret into a [`Credential`]
    ///
    /// The matching environment variable wins over the stored value.
    /// Otherwise `${VAR}` references are expanded here, never at load time,
    /// and `keyring:` references are looked up in the OS keyring.
    pub fn resolve_credential(&self) -> Result<Credential> {
        let store = CredentialStore::new();
        let secret = store
            .get_credential(&expand_env_vars(&self.token), Some(self.auth.env_var()))
            .map_err(|e| {
                ConfigError::CredentialError(format!("Failed to resolve {} token: {e}", self.auth))
            })?;

        Ok(match self.auth {
            AuthKind::ApiKey => Credential::ApiKey(secret),
            AuthKind::Oauth => Credential::OAuthBearer(secret),
        })
    }

    /// Base URL with `${VAR}` references expanded
    pub fn resolved_base_url(&self) -> String {
        expand_env_vars(&self.base_url)
    }
}

impl Config {
    /// Resolve the profile name to use
    ///
    /// Order: explicit name, `default_profile`, then the first profile
    /// alphabetically.
    pub fn resolve_profile(&self, explicit_profile: Option<&str>) -> Result<String> {
        if let Some(name) = explicit_profile {
            if !self.profiles.contains_key(name) {
                return Err(ConfigError::ProfileNotFound {
                    name: name.to_string(),
                });
            }
            return Ok(name.to_string());
        }

        if let Some(ref default) = self.default_profile {
            return Ok(default.clone());
        }

        self.list_profiles()
            .first()
            .map(|(name, _)| (*name).clone())
            .ok_or_else(|| ConfigError::NoProfiles {
                suggestion: "Use 'opencloudctl profile set' to create a profile.".to_string(),
            })
    }

    /// Look up a resolved profile
    pub fn profile(&self, explicit_profile: Option<&str>) -> Result<&Profile> {
        let name = self.resolve_profile(explicit_profile)?;
        self.profiles
            .get(&name)
            .ok_or(ConfigError::ProfileNotFound { name })
    }

    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields the default (empty) configuration.
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        // `${VAR}` references stay literal so saving never writes secrets back
        let config: Config = toml::from_str(&content)?;

        Ok(config)
    }

    /// Save configuration to the standard location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to_path(&config_path)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(config_path, content).map_err(|e| ConfigError::SaveError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Set or update a profile
    pub fn set_profile(&mut self, name: String, profile: Profile) {
        self.profiles.insert(name, profile);
    }

    /// Remove a profile by name, clearing the default if it pointed there
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    /// List all profiles sorted by name
    pub fn list_profiles(&self) -> Vec<(&String, &Profile)> {
        let mut profiles: Vec<_> = self.profiles.iter().collect();
        profiles.sort_by_key(|(name, _)| *name);
        profiles
    }

    /// Get the path to the configuration file
    ///
    /// On macOS, `~/.config/opencloudctl/config.toml` is preferred when it
    /// (or its directory) exists, falling back to the platform location.
    ///
    /// On Linux: ~/.config/opencloudctl/config.toml
    /// On Windows: %APPDATA%\typical-developers\opencloudctl\config.toml
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(base_dirs) = BaseDirs::new() {
                let linux_style_path = base_dirs
                    .home_dir()
                    .join(".config")
                    .join("opencloudctl")
                    .join("config.toml");

                if linux_style_path.exists()
                    || linux_style_path
                        .parent()
                        .map(|p| p.exists())
                        .unwrap_or(false)
                {
                    return Ok(linux_style_path);
                }
            }
        }

        let proj_dirs = ProjectDirs::from("com", "typical-developers", "opencloudctl")
            .ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

/// Expand `${VAR}` and `${VAR:-default}` references in a profile value
///
/// Unset variables without a default are left as-is.
fn expand_env_vars(value: &str) -> String {
    shellexpand::env_with_context_no_errors(value, |var| std::env::var(var).ok()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.set_profile("prod".to_string(), Profile::api_key("test-key"));
        config.default_profile = Some("prod".to_string());

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.default_profile, deserialized.default_profile);
        assert_eq!(deserialized.profiles["prod"], Profile::api_key("test-key"));
    }

    #[test]
    fn test_profile_defaults() {
        let content = r#"
[profiles.dev]
auth = "oauth"
token = "abc"
"#;
        let config: Config = toml::from_str(content).unwrap();
        let profile = &config.profiles["dev"];
        assert_eq!(profile.auth, AuthKind::Oauth);
        assert_eq!(profile.base_url, DEFAULT_BASE_URL);
        assert_eq!(profile.timeout_secs, None);
    }

    #[test]
    #[serial_test::serial]
    fn test_resolve_credential_kinds() {
        unsafe {
            std::env::remove_var(API_KEY_ENV);
            std::env::remove_var(OAUTH_TOKEN_ENV);
        }

        let key = Profile::api_key("k").resolve_credential().unwrap();
        assert_eq!(key, Credential::ApiKey("k".to_string()));

        let token = Profile::oauth("t").resolve_credential().unwrap();
        assert_eq!(token, Credential::OAuthBearer("t".to_string()));
    }

    #[test]
    #[serial_test::serial]
    fn test_resolve_credential_env_override() {
        unsafe {
            std::env::set_var(OAUTH_TOKEN_ENV, "from-env");
        }

        let token = Profile::oauth("from-file").resolve_credential().unwrap();
        assert_eq!(token, Credential::OAuthBearer("from-env".to_string()));

        unsafe {
            std::env::remove_var(OAUTH_TOKEN_ENV);
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_env_var_expansion_at_resolve_time() {
        unsafe {
            std::env::remove_var(API_KEY_ENV);
            std::env::set_var("OPENCLOUDCTL_TEST_KEY", "expanded-key");
            std::env::remove_var("OPENCLOUDCTL_TEST_MISSING");
        }

        let content = r#"
[profiles.prod]
auth = "api_key"
token = "${OPENCLOUDCTL_TEST_KEY}"
base_url = "${OPENCLOUDCTL_TEST_MISSING:-https://example.test}"
"#;

        let config: Config = toml::from_str(content).unwrap();
        let profile = &config.profiles["prod"];
        assert_eq!(profile.token, "${OPENCLOUDCTL_TEST_KEY}");
        assert_eq!(
            profile.resolve_credential().unwrap(),
            Credential::ApiKey("expanded-key".to_string())
        );
        assert_eq!(profile.resolved_base_url(), "https://example.test");

        unsafe {
            std::env::remove_var("OPENCLOUDCTL_TEST_KEY");
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_save_keeps_env_references_literal() {
        unsafe {
            std::env::set_var("OPENCLOUDCTL_TEST_SECRET", "hunter2-secret");
        }

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[profiles.ci]
auth = "api_key"
token = "${OPENCLOUDCTL_TEST_SECRET}"
"#,
        )
        .unwrap();

        let mut config = Config::load_from_path(&path).unwrap();
        config.set_profile("other".to_string(), Profile::oauth("plain"));
        config.save_to_path(&path).unwrap();

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("${OPENCLOUDCTL_TEST_SECRET}"));
        assert!(!saved.contains("hunter2-secret"));

        unsafe {
            std::env::remove_var("OPENCLOUDCTL_TEST_SECRET");
        }
    }

    #[test]
    fn test_profile_resolution_order() {
        let mut config = Config::default();
        config.set_profile("zeta".to_string(), Profile::api_key("z"));
        config.set_profile("alpha".to_string(), Profile::api_key("a"));

        // First alphabetically when no default
        assert_eq!(config.resolve_profile(None).unwrap(), "alpha");

        config.default_profile = Some("zeta".to_string());
        assert_eq!(config.resolve_profile(None).unwrap(), "zeta");

        // Explicit wins
        assert_eq!(config.resolve_profile(Some("alpha")).unwrap(), "alpha");
    }

    #[test]
    fn test_profile_resolution_errors() {
        let config = Config::default();
        assert!(matches!(
            config.resolve_profile(None),
            Err(ConfigError::NoProfiles { .. })
        ));
        assert!(matches!(
            config.resolve_profile(Some("missing")),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_profile_clears_default() {
        let mut config = Config::default();
        config.set_profile("prod".to_string(), Profile::api_key("k"));
        config.default_profile = Some("prod".to_string());

        assert!(config.remove_profile("prod").is_some());
        assert!(config.default_profile.is_none());
        assert!(config.remove_profile("prod").is_none());
    }
}
