//! REST API client module for the Sentio backend.
//!
//! This module provides the `ApiClient` (the authenticated transport) and
//! the `ApiError` taxonomy every call resolves to.
//!
//! The API uses bearer token authentication obtained from `/auth/login`.

pub mod client;
pub mod error;

pub use client::{ApiClient, RequestEnvelope, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
