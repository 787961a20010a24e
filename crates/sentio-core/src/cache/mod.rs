//! In-memory resource query cache.
//!
//! This module provides the `QueryCache` for sharing one result per named
//! resource across every consumer. Each key has at most one fetch in
//! flight, can refresh itself on a fixed interval while observed, and keeps
//! its last good payload through refreshes and failures.
//!
//! Entries nobody observes are evicted after a short grace period
//! (`DEFAULT_EVICTION_GRACE_SECS`).

pub mod entry;
pub mod manager;
pub mod subscription;

pub use entry::{CacheEntry, QueryStatus};
pub use manager::{
    FetchFuture, Fetcher, Payload, QueryCache, QueryOptions, Refresh, DEFAULT_EVICTION_GRACE_SECS,
};
pub use subscription::Subscription;
