//! Credential storage abstraction with optional keyring support
//!
//! Secrets in the config file are resolved in this order:
//! - environment variable override
//! - OS keyring, when the value is a `keyring:<name>` reference
//! - the plaintext value itself

use super::error::{ConfigError, Result};
use std::env;

/// Prefix that indicates a value should be retrieved from the keyring
const KEYRING_PREFIX: &str = "keyring:";

/// Service name for keyring entries
#[cfg(feature = "secure-storage")]
const SERVICE_NAME: &str = "opencloudctl";

/// Storage backend for credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStorage {
    /// Store in OS keyring
    #[cfg(feature = "secure-storage")]
    Keyring,
    /// Store as plaintext
    Plaintext,
}

/// Credential store abstraction
#[derive(Debug)]
pub struct CredentialStore {
    storage: CredentialStorage,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// Create a new credential store with automatic backend selection
    pub fn new() -> Self {
        #[cfg(feature = "secure-storage")]
        {
            if Self::is_keyring_available() {
                return Self {
                    storage: CredentialStorage::Keyring,
                };
            }
        }
        Self {
            storage: CredentialStorage::Plaintext,
        }
    }

    #[cfg(feature = "secure-storage")]
    fn is_keyring_available() -> bool {
        match keyring::Entry::new(SERVICE_NAME, "__probe__") {
            Ok(entry) => {
                let _ = entry.get_password();
                true
            }
            Err(_) => false,
        }
    }

    /// Store a secret and return the value to write into the config file
    ///
    /// With a keyring backend this is a `keyring:<key>` reference; otherwise
    /// the secret itself.
    pub fn store_credential(&self, key: &str, value: &str) -> Result<String> {
        match self.storage {
            #[cfg(feature = "secure-storage")]
            CredentialStorage::Keyring => {
                let entry = keyring::Entry::new(SERVICE_NAME, key)
                    .map_err(|e| ConfigError::KeyringError(e.to_string()))?;
                entry.set_password(value).map_err(|e| {
                    ConfigError::KeyringError(format!("Failed to store credential in keyring: {e}"))
                })?;
                Ok(format!("{KEYRING_PREFIX}{key}"))
            }
            CredentialStorage::Plaintext => {
                let _ = key;
                Ok(value.to_string())
            }
        }
    }

    /// Retrieve a secret value
    ///
    /// Resolution order:
    /// 1. Environment variable (if `env_var` is provided and set)
    /// 2. Keyring, if the value starts with `keyring:`
    /// 3. The value as-is
    pub fn get_credential(&self, value: &str, env_var: Option<&str>) -> Result<String> {
        if let Some(var) = env_var
            && let Ok(env_value) = env::var(var)
        {
            return Ok(env_value);
        }

        let Some(key) = value.strip_prefix(KEYRING_PREFIX) else {
            return Ok(value.to_string());
        };

        #[cfg(feature = "secure-storage")]
        {
            let entry = keyring::Entry::new(SERVICE_NAME, key)
                .map_err(|e| ConfigError::KeyringError(e.to_string()))?;
            entry.get_password().map_err(|e| {
                ConfigError::KeyringError(format!(
                    "Failed to retrieve credential '{key}' from keyring: {e}"
                ))
            })
        }
        #[cfg(not(feature = "secure-storage"))]
        {
            Err(ConfigError::CredentialError(format!(
                "Credential '{key}' references keyring but secure-storage feature is not enabled"
            )))
        }
    }

    /// Delete a secret from storage; plaintext secrets live in the config file
    pub fn delete_credential(&self, key: &str) -> Result<()> {
        match self.storage {
            #[cfg(feature = "secure-storage")]
            CredentialStorage::Keyring => {
                let entry = keyring::Entry::new(SERVICE_NAME, key)
                    .map_err(|e| ConfigError::KeyringError(e.to_string()))?;
                match entry.delete_credential() {
                    Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                    Err(e) => Err(ConfigError::KeyringError(format!(
                        "Failed to delete credential from keyring: {e}"
                    ))),
                }
            }
            CredentialStorage::Plaintext => {
                let _ = key;
                Ok(())
            }
        }
    }

    /// Check if a value is a keyring reference
    pub fn is_keyring_reference(value: &str) -> bool {
        value.starts_with(KEYRING_PREFIX)
    }

    /// Name of the active storage backend
    pub fn storage_backend(&self) -> &'static str {
        match self.storage {
            #[cfg(feature = "secure-storage")]
            CredentialStorage::Keyring => "keyring",
            CredentialStorage::Plaintext => "plaintext",
        }
    }
}
