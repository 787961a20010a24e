use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name for the token entry
const SERVICE_NAME: &str = "sentio-console";

/// Well-known key the token is stored under, in every backend.
pub const TOKEN_KEY: &str = "token";

/// Durable home for the session token.
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, token: &str) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    token: String,
    created_at: DateTime<Utc>,
}

/// Stores the token as JSON in the cache directory.
pub struct FileTokenStorage {
    cache_dir: PathBuf,
}

impl FileTokenStorage {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<String>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data: SessionFile =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(data.token))
    }

    fn save(&self, token: &str) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let data = SessionFile {
            token: token.to_string(),
            created_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&data)?;
        std::fs::write(path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Stores the token in the OS keychain.
pub struct KeyringTokenStorage;

impl KeyringTokenStorage {
    fn entry() -> Result<Entry> {
        Entry::new(SERVICE_NAME, TOKEN_KEY).context("Failed to create keyring entry")
    }
}

impl TokenStorage for KeyringTokenStorage {
    fn load(&self) -> Result<Option<String>> {
        match Self::entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        Self::entry()?
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn remove(&self) -> Result<()> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

/// Process-local storage; nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStorage {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.token.lock().clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.token.lock() = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.token.lock() = None;
        Ok(())
    }
}
