use futures::Stream;
use tokio::sync::watch;

use super::entry::CacheEntry;
use super::manager::{Payload, QueryCache};

/// A consumer's handle on one cache key.
///
/// Holding it keeps the entry alive (and its refresh timer running);
/// dropping the last one for a key starts the eviction grace period.
pub struct Subscription<T: Payload> {
    id: u64,
    key: String,
    rx: watch::Receiver<CacheEntry<T>>,
    cache: QueryCache<T>,
}

impl<T: Payload> Subscription<T> {
    pub(crate) fn new(id: u64, key: String, rx: watch::Receiver<CacheEntry<T>>, cache: QueryCache<T>) -> Self {
        Self { id, key, rx, cache }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Latest entry state.
    pub fn snapshot(&self) -> CacheEntry<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change. `None` once the entry has been dropped
    /// from the cache.
    pub async fn changed(&mut self) -> Option<CacheEntry<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until no fetch is running and at least one has finished.
    pub async fn settled(&mut self) -> CacheEntry<T> {
        let settled = self
            .rx
            .wait_for(CacheEntry::is_settled)
            .await
            .map(|entry| entry.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    /// Ask the cache to re-fetch this key now.
    pub fn refetch(&self) {
        self.cache.invalidate(&self.key);
    }

    /// Every subsequent change as a stream. Ends when the entry is dropped.
    pub fn into_stream(self) -> impl Stream<Item = CacheEntry<T>> {
        futures::stream::unfold(self, |mut subscription| async move {
            let entry = subscription.changed().await?;
            Some((entry, subscription))
        })
    }
}

impl<T: Payload> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cache.unsubscribe(&self.key, self.id);
    }
}

impl<T: Payload + std::fmt::Debug> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("entry", &*self.rx.borrow())
            .finish()
    }
}
