//! Authentication module for the console session.
//!
//! This module provides:
//! - `CredentialStore`: the single holder of the session token
//! - `TokenStorage`: durable backends (file, OS keychain, memory)
//! - `SessionGate`: the authority on whether the console may be used
//!
//! Presence of a token is the only authentication signal; expiry is the
//! backend's concern and surfaces as a 401.

pub mod credentials;
pub mod session;
pub mod storage;

pub use credentials::CredentialStore;
pub use session::SessionGate;
pub use storage::{FileTokenStorage, KeyringTokenStorage, MemoryTokenStorage, TokenStorage, TOKEN_KEY};
