//! Sentio core - data layer for the Sentio IoT observability console.
//!
//! This crate holds everything between the operator-facing surface and the
//! Sentio backend:
//! - `auth`: the session token, its durable storage, and the gate that
//!   admits the console only while signed in
//! - `api`: the authenticated HTTP client and its error type
//! - `cache`: the shared, self-refreshing query cache
//! - `scheduler`: background polling of time-sensitive resources
//! - `console`: the standard dashboard resources wired together
//!
//! A typical consumer builds an [`ApiClient`] from [`Config`], wraps it in a
//! [`SessionGate`], signs in, and then asks the gate for a [`Console`].

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod console;
pub mod models;
pub mod scheduler;

pub use api::{ApiClient, ApiError};
pub use auth::{CredentialStore, SessionGate};
pub use cache::{CacheEntry, QueryCache, QueryOptions, QueryStatus, Subscription};
pub use config::Config;
pub use console::Console;
pub use scheduler::{PollingScheduler, Registration};
