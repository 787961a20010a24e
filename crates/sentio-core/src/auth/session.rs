use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::console::Console;

use super::CredentialStore;

/// Decides whether the console may be used.
///
/// The gate reads the authenticated flag straight from the credential store,
/// so it follows every `set`/`clear` synchronously, including the implicit
/// clear the API client performs on a rejected token. While signed out the
/// only thing it offers is [`SessionGate::login`].
#[derive(Clone)]
pub struct SessionGate {
    api: ApiClient,
}

impl SessionGate {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn credentials(&self) -> &CredentialStore {
        self.api.credentials()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials().has_token()
    }

    /// Watch authentication transitions. The current value is marked seen.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.credentials().watch()
    }

    /// Exchange credentials for a token and store it.
    ///
    /// The session is active in memory even if persisting the token fails;
    /// that failure is only logged, matching how a lost session file is
    /// treated on load.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let response = self.api.login(username, password).await?;
        if response.access_token.is_empty() {
            return Err(ApiError::DecodeError("login response carried an empty token".into()));
        }

        if let Err(e) = self.credentials().set(response.access_token) {
            warn!(error = %e, "Signed in, but failed to persist session");
        }
        info!(username = %username, "Signed in");
        Ok(())
    }

    /// Drop the session. Always signs out in memory; a failure to remove the
    /// persisted token is returned.
    pub fn logout(&self) -> anyhow::Result<()> {
        info!("Signing out");
        self.credentials().clear()
    }

    /// Resolve once the session is gone, whether by logout or because the
    /// server rejected the token. Returns at once when already signed out.
    pub async fn signed_out(&self) {
        let mut rx = self.credentials().watch();
        // The sender lives as long as the store, which `self` keeps alive
        let _ = rx.wait_for(|authenticated| !authenticated).await;
    }

    /// Open the console, if signed in.
    pub fn admit(&self, config: &Config) -> Option<Console> {
        if !self.is_authenticated() {
            return None;
        }
        Some(Console::new(self.api.clone(), config))
    }
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
