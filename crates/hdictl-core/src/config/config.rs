//! Profile configuration stored as TOML
//!
//! ```toml
//! default_profile = "prod"
//!
//! [profiles.prod]
//! subscription_id = "${AZURE_SUBSCRIPTION_ID}"
//! token = "keyring:prod-token"
//! poll_interval_secs = 30
//!
//! [profiles.prod.timeouts]
//! create = 5400
//! ```

#[cfg(target_os = "macos")]
use directories::BaseDirs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::credential::CredentialStore;
use super::error::{ConfigError, Result};
use crate::context::{DEFAULT_POLL_INTERVAL, Timeouts};

/// Public Azure cloud Resource Manager endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

const TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";
const SUBSCRIPTION_ENV: &str = "AZURE_SUBSCRIPTION_ID";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    /// Map of profile name -> profile configuration
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// One Azure subscription and how to reach it
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Profile {
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer token, literal or `keyring:` reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<Timeouts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

/// Fully resolved connection settings for a profile
#[derive(Debug, Clone)]
pub struct Connection {
    pub endpoint: String,
    pub subscription_id: String,
    pub token: String,
    pub timeouts: Timeouts,
    pub poll_interval: Duration,
}

impl Profile {
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts.unwrap_or_default()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    /// Resolve the token and subscription, applying environment overrides
    pub fn resolve(&self, name: &str) -> Result<Connection> {
        let store = CredentialStore::new();

        let subscription_id = store
            .get_credential(&self.subscription_id, Some(SUBSCRIPTION_ENV))
            .map_err(|e| {
                ConfigError::CredentialError(format!("Failed to resolve subscription: {}", e))
            })?;
        if subscription_id.is_empty() {
            return Err(ConfigError::MissingSetting {
                profile: name.to_string(),
                field: "subscription_id",
                suggestion: format!("Set it in the profile or export {}.", SUBSCRIPTION_ENV),
            });
        }

        let token = store
            .get_credential(self.token.as_deref().unwrap_or_default(), Some(TOKEN_ENV))
            .map_err(|e| ConfigError::CredentialError(format!("Failed to resolve token: {}", e)))?;
        if token.is_empty() {
            return Err(ConfigError::MissingSetting {
                profile: name.to_string(),
                field: "token",
                suggestion: format!(
                    "Export {} (e.g. from `az account get-access-token`).",
                    TOKEN_ENV
                ),
            });
        }

        Ok(Connection {
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
            subscription_id,
            token,
            timeouts: self.timeouts(),
            poll_interval: self.poll_interval(),
        })
    }
}

impl Config {
    /// Pick the profile name to use.
    ///
    /// Resolution order: explicit name, `default_profile`, then the first
    /// profile alphabetically.
    pub fn resolve_profile(&self, explicit_profile: Option<&str>) -> Result<String> {
        if let Some(name) = explicit_profile {
            return Ok(name.to_string());
        }
        if let Some(ref default) = self.default_profile {
            return Ok(default.clone());
        }
        self.list_profiles()
            .first()
            .map(|(name, _)| (*name).clone())
            .ok_or_else(|| ConfigError::NoProfiles {
                suggestion: "Use 'hdictl profile set' to create one.".to_string(),
            })
    }

    /// Resolve a profile, falling back to environment-only settings when
    /// no profiles exist at all.
    pub fn connection(&self, explicit_profile: Option<&str>) -> Result<Connection> {
        if explicit_profile.is_none() && self.profiles.is_empty() {
            return Profile {
                endpoint: default_endpoint(),
                ..Profile::default()
            }
            .resolve("env");
        }

        let name = self.resolve_profile(explicit_profile)?;
        let profile = self
            .profiles
            .get(&name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.clone() })?;
        profile.resolve(&name)
    }

    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        let expanded_content = Self::expand_env_vars(&content);
        let config: Config = toml::from_str(&expanded_content)?;

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

    /// Path to the configuration file
    ///
    /// On Linux: ~/.config/hdictl/config.toml. On macOS ~/.config/hdictl is
    /// used when it exists, the platform directory otherwise.
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(base_dirs) = BaseDirs::new() {
                let linux_style = base_dirs.home_dir().join(".config").join("hdictl");
                if linux_style.exists() {
                    return Ok(linux_style.join("config.toml"));
                }
            }
        }

        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Default location of the state file, next to the platform data dir
    pub fn default_state_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("state.json"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "hdictl", "hdictl").ok_or(ConfigError::ConfigDirError)
    }

    /// Expand `${VAR}` and `${VAR:-default}`; unknown variables are left as-is
    fn expand_env_vars(content: &str) -> String {
        shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok())
            .to_string()
    }
}
