//! Console configuration management.
//!
//! This module handles loading and saving the console configuration: the
//! API base URL, request timeout, polling intervals, where the session
//! token is persisted, and the last used username.
//!
//! Configuration is stored at `~/.config/sentio-console/config.json`.
//! `SENTIO_API_URL` and `SENTIO_TOKEN_STORAGE` override the file.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{CredentialStore, FileTokenStorage, KeyringTokenStorage, MemoryTokenStorage};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sentio-console";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const API_URL_ENV: &str = "SENTIO_API_URL";
pub const TOKEN_STORAGE_ENV: &str = "SENTIO_TOKEN_STORAGE";

const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";

/// Where the session token lives between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorageKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for TokenStorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("Unknown token storage {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub anomalies_poll_secs: u64,
    pub predictions_poll_secs: u64,
    pub status_refresh_secs: u64,
    /// How long an unobserved query result is kept before eviction.
    pub eviction_grace_secs: u64,
    pub token_storage: TokenStorageKind,
    /// Sign out when the backend answers 401 to an authenticated request.
    pub logout_on_unauthorized: bool,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: crate::api::DEFAULT_REQUEST_TIMEOUT_SECS,
            anomalies_poll_secs: 30,
            predictions_poll_secs: 60,
            status_refresh_secs: 15,
            eviction_grace_secs: crate::cache::DEFAULT_EVICTION_GRACE_SECS,
            token_storage: TokenStorageKind::File,
            logout_on_unauthorized: true,
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the user config directory, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Record the account last signed in with. Only that field is written
    /// back, so environment overrides never end up in the file.
    pub fn remember_username(&mut self, username: &str) -> Result<()> {
        self.last_username = Some(username.to_string());
        let path = Self::config_path()?;
        let mut stored = Self::load_from(&path)?;
        stored.last_username = self.last_username.clone();
        stored.save_to(&path)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(API_URL_ENV).ok(),
            std::env::var(TOKEN_STORAGE_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, api_url: Option<String>, token_storage: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(raw) = token_storage {
            match raw.parse() {
                Ok(kind) => self.token_storage = kind,
                Err(e) => warn!(error = %e, "Ignoring {}", TOKEN_STORAGE_ENV),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn anomalies_poll_interval(&self) -> Duration {
        Duration::from_secs(self.anomalies_poll_secs.max(1))
    }

    pub fn predictions_poll_interval(&self) -> Duration {
        Duration::from_secs(self.predictions_poll_secs.max(1))
    }

    /// `None` when status auto-refresh is disabled (0).
    pub fn status_refresh_interval(&self) -> Option<Duration> {
        (self.status_refresh_secs > 0).then(|| Duration::from_secs(self.status_refresh_secs))
    }

    pub fn eviction_grace(&self) -> Duration {
        Duration::from_secs(self.eviction_grace_secs)
    }

    /// Open the credential store on the configured backend.
    pub fn credential_store(&self) -> Result<CredentialStore> {
        Ok(match self.token_storage {
            TokenStorageKind::File => CredentialStore::new(FileTokenStorage::new(self.cache_dir()?)),
            TokenStorageKind::Keyring => CredentialStore::new(KeyringTokenStorage),
            TokenStorageKind::Memory => CredentialStore::new(MemoryTokenStorage::new()),
        })
    }
}
