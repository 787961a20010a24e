use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::storage::TokenStorage;

struct Inner {
    storage: Box<dyn TokenStorage>,
    token: RwLock<Option<String>>,
    authenticated: watch::Sender<bool>,
}

/// Holds the current session token.
///
/// The token is loaded from durable storage once, then mirrored in memory
/// so every request can read it without touching disk. Each `set`/`clear`
/// updates the mirror first, notifies watchers, then persists.
///
/// Clone is cheap and every clone observes the same session.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

impl CredentialStore {
    /// Create a store backed by `storage`, loading any persisted token.
    /// An unreadable store starts unauthenticated rather than failing.
    pub fn new(storage: impl TokenStorage + 'static) -> Self {
        let token = match storage.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session, starting signed out");
                None
            }
        };
        debug!(has_token = token.is_some(), "Credential store loaded");

        let (authenticated, _) = watch::channel(token.is_some());
        Self {
            inner: Arc::new(Inner {
                storage: Box::new(storage),
                token: RwLock::new(token),
                authenticated,
            }),
        }
    }

    /// Current token, if any.
    pub fn get(&self) -> Option<String> {
        self.inner.token.read().clone()
    }

    pub fn has_token(&self) -> bool {
        self.inner.token.read().is_some()
    }

    /// Replace the session token. The in-memory session is updated even when
    /// persisting fails; the error is returned so the caller can report it.
    pub fn set(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        *self.inner.token.write() = Some(token.clone());
        self.inner.authenticated.send_replace(true);
        info!("Session token stored");
        self.inner.storage.save(&token)
    }

    /// Drop the session token from memory and durable storage.
    pub fn clear(&self) -> Result<()> {
        let had_token = self.inner.token.write().take().is_some();
        self.inner.authenticated.send_replace(false);
        if had_token {
            info!("Session token cleared");
        }
        self.inner.storage.remove()
    }

    /// Watch the authenticated flag. The receiver sees every `set`/`clear`.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.authenticated.subscribe()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("has_token", &self.has_token())
            .finish()
    }
}
