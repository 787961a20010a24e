use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::entry::{CacheEntry, QueryStatus};
use super::subscription::Subscription;
use crate::api::ApiError;

/// Keep an unobserved entry this long before discarding it.
pub const DEFAULT_EVICTION_GRACE_SECS: u64 = 30;

/// Anything a query can produce.
pub trait Payload: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Payload for T {}

pub type FetchFuture<T> = BoxFuture<'static, Result<T, ApiError>>;
pub type Fetcher<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

/// Per-subscription options.
#[derive(Clone)]
pub struct QueryOptions<T> {
    /// Re-fetch this often while this subscription lives. A key observed
    /// with several intervals refreshes at the shortest live one.
    pub refresh_interval: Option<Duration>,
    /// Shown until the first fetch for the key succeeds.
    pub default_value: Option<T>,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            refresh_interval: None,
            default_value: None,
        }
    }
}

impl<T> QueryOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_every(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    pub fn default_value(mut self, value: T) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Something whose keys can be re-fetched on demand.
pub trait Refresh: Send + Sync {
    /// Mark `key` stale and re-fetch it in the background unless a fetch is
    /// already running. Returns false when no entry exists for `key`.
    fn refresh(&self, key: &str) -> bool;
}

struct Slot<T> {
    tx: watch::Sender<CacheEntry<T>>,
    fetcher: Fetcher<T>,
    /// Generation of the newest fetch; only that one may complete.
    generation: u64,
    in_flight: Option<AbortHandle>,
    stale: bool,
    subscribers: usize,
    /// Interval requested by each live subscription that asked for one.
    intervals: HashMap<u64, Duration>,
    /// Period of the running refresh timer.
    refresh_interval: Option<Duration>,
    refresh_task: Option<JoinHandle<()>>,
    /// Bumped on every subscribe/unsubscribe so an older eviction timer is void.
    eviction_epoch: u64,
}

struct Inner<T> {
    slots: Mutex<HashMap<String, Slot<T>>>,
    grace: Duration,
    /// Shared by every slot, so a recreated slot never reuses a generation.
    generations: AtomicU64,
    next_subscription: AtomicU64,
}

/// Keyed cache of resource query results.
///
/// One entry per key, shared by every subscriber to that key, with at most
/// one fetch in flight per key. All methods that may start a fetch must be
/// called from inside a tokio runtime.
///
/// Clone is cheap - clones share the same entries.
pub struct QueryCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Payload> Default for QueryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Payload> QueryCache<T> {
    pub fn new() -> Self {
        Self::with_grace(Duration::from_secs(DEFAULT_EVICTION_GRACE_SECS))
    }

    /// Create a cache whose idle entries are evicted after `grace`.
    /// A zero grace evicts as soon as the last subscriber leaves.
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                grace,
                generations: AtomicU64::new(0),
                next_subscription: AtomicU64::new(0),
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner<T>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Subscribe to `key`, fetching it if there is no fresh entry.
    ///
    /// The most recent subscriber's `fetch` becomes the key's fetcher. It is
    /// invoked on a spawned task, never with the cache locked.
    pub fn subscribe<F, Fut>(
        &self,
        key: impl Into<String>,
        fetch: F,
        options: QueryOptions<T>,
    ) -> Subscription<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let key = key.into();
        let fetcher: Fetcher<T> = Arc::new(move || fetch().boxed());
        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);

        let mut slots = self.inner.slots.lock();
        let slot = slots.entry(key.clone()).or_insert_with(|| {
            debug!(key = %key, "Creating cache entry");
            let (tx, _) = watch::channel(CacheEntry::new(&key, None));
            Slot {
                tx,
                fetcher: Arc::clone(&fetcher),
                generation: 0,
                in_flight: None,
                stale: true,
                subscribers: 0,
                intervals: HashMap::new(),
                refresh_interval: None,
                refresh_task: None,
                eviction_epoch: 0,
            }
        });

        slot.fetcher = fetcher;
        slot.subscribers += 1;
        slot.eviction_epoch += 1;
        if let Some(default) = options.default_value {
            slot.tx.send_if_modified(|entry| entry.set_placeholder(default));
        }

        if let Some(interval) = options.refresh_interval {
            slot.intervals.insert(id, interval);
            self.reschedule(&key, slot);
        }

        if slot.stale && slot.in_flight.is_none() {
            self.start_fetch(&key, slot);
        }

        let rx = slot.tx.subscribe();
        drop(slots);

        Subscription::new(id, key, rx, self.clone())
    }

    /// One-shot read: subscribe, wait for the entry to settle, unsubscribe.
    /// A fresh cached entry is returned without a fetch.
    pub async fn fetch<F, Fut>(
        &self,
        key: impl Into<String>,
        fetch: F,
        options: QueryOptions<T>,
    ) -> CacheEntry<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let mut subscription = self.subscribe(key, fetch, options);
        subscription.settled().await
    }

    /// Force the next read of `key` to bypass the cached payload. If the key
    /// is observed, a new fetch starts now and supersedes any running one.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut slots = self.inner.slots.lock();
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };
        debug!(key = %key, subscribers = slot.subscribers, "Invalidating cache entry");
        slot.stale = true;
        if slot.subscribers > 0 {
            self.start_fetch(key, slot);
        }
        true
    }

    /// Invalidate every key.
    pub fn invalidate_all(&self) {
        for key in self.keys() {
            self.invalidate(&key);
        }
    }

    pub fn get_snapshot(&self, key: &str) -> Option<CacheEntry<T>> {
        self.inner
            .slots
            .lock()
            .get(key)
            .map(|slot| slot.tx.borrow().clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.slots.lock().keys().cloned().collect()
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .slots
            .lock()
            .get(key)
            .map_or(0, |slot| slot.subscribers)
    }

    /// Drop every entry, cancelling fetches and timers. Live subscriptions
    /// stop receiving updates.
    pub fn clear(&self) {
        let drained: Vec<Slot<T>> = self.inner.slots.lock().drain().map(|(_, slot)| slot).collect();
        for slot in drained {
            Self::cancel_tasks(slot);
        }
    }

    fn next_generation(&self) -> u64 {
        self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Run the refresh timer at the shortest interval any live subscription
    /// asked for, or stop it when none did.
    fn reschedule(&self, key: &str, slot: &mut Slot<T>) {
        let wanted = slot.intervals.values().min().copied();
        if wanted == slot.refresh_interval {
            return;
        }
        if let Some(task) = slot.refresh_task.take() {
            task.abort();
        }
        debug!(key = %key, interval = ?wanted, "Rescheduling refresh");
        slot.refresh_interval = wanted;
        slot.refresh_task = wanted.map(|period| self.spawn_refresh(key.to_string(), period));
    }

    fn cancel_tasks(slot: Slot<T>) {
        if let Some(handle) = slot.in_flight {
            handle.abort();
        }
        if let Some(task) = slot.refresh_task {
            task.abort();
        }
    }

    fn background_refresh(&self, key: &str) -> bool {
        let mut slots = self.inner.slots.lock();
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };
        slot.stale = true;
        if slot.in_flight.is_some() {
            debug!(key = %key, "Fetch already running, skipping refresh");
        } else {
            self.start_fetch(key, slot);
        }
        true
    }

    /// Issue a new generation for `slot`. Runs with the slot map locked, so
    /// the fetch task cannot complete before `in_flight` is recorded. The
    /// fetcher itself is called from the task, after the lock is released.
    fn start_fetch(&self, key: &str, slot: &mut Slot<T>) {
        if let Some(previous) = slot.in_flight.take() {
            debug!(key = %key, generation = slot.generation, "Superseding in-flight fetch");
            previous.abort();
        }

        let generation = self.next_generation();
        slot.generation = generation;
        slot.tx.send_modify(|entry| entry.status = QueryStatus::Loading);
        debug!(key = %key, generation, "Fetching");

        let fetcher = Arc::clone(&slot.fetcher);
        let weak = Arc::downgrade(&self.inner);
        let key = key.to_string();
        let task = tokio::spawn(async move {
            let result = fetcher().await;
            if let Some(cache) = Self::from_weak(&weak) {
                cache.complete(&key, generation, result);
            }
        });
        slot.in_flight = Some(task.abort_handle());
    }

    fn complete(&self, key: &str, generation: u64, result: Result<T, ApiError>) {
        let mut slots = self.inner.slots.lock();
        let Some(slot) = slots.get_mut(key) else {
            debug!(key = %key, generation, "Entry evicted, discarding result");
            return;
        };
        if slot.generation != generation {
            debug!(key = %key, generation, current = slot.generation, "Discarding superseded result");
            return;
        }
        slot.in_flight = None;

        match result {
            Ok(data) => {
                slot.stale = false;
                slot.tx.send_modify(|entry| {
                    entry.data = Some(data);
                    entry.status = QueryStatus::Success;
                    entry.error = None;
                    entry.last_updated = Some(Utc::now());
                });
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Fetch failed, keeping last payload");
                slot.tx.send_modify(|entry| {
                    entry.status = QueryStatus::Error;
                    entry.error = Some(err);
                });
            }
        }
    }

    fn spawn_refresh(&self, key: String, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = Self::from_weak(&weak) else {
                    break;
                };
                if !cache.background_refresh(&key) {
                    break;
                }
            }
        })
    }

    pub(crate) fn unsubscribe(&self, key: &str, id: u64) {
        let mut slots = self.inner.slots.lock();
        let Some(slot) = slots.get_mut(key) else {
            return;
        };
        slot.subscribers = slot.subscribers.saturating_sub(1);
        slot.eviction_epoch += 1;
        if slot.intervals.remove(&id).is_some() {
            self.reschedule(key, slot);
        }
        if slot.subscribers > 0 {
            return;
        }

        if let Some(handle) = slot.in_flight.take() {
            debug!(key = %key, "Last subscriber left, cancelling fetch");
            handle.abort();
            slot.generation = self.next_generation();
            slot.stale = true;
            slot.tx.send_modify(|entry| entry.status = entry.resting_status());
        }

        let epoch = slot.eviction_epoch;
        let grace = self.inner.grace;
        if grace.is_zero() {
            debug!(key = %key, "Evicting cache entry");
            if let Some(slot) = slots.remove(key) {
                Self::cancel_tasks(slot);
            }
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let weak = Arc::downgrade(&self.inner);
                let key = key.to_string();
                runtime.spawn(async move {
                    tokio::time::sleep(grace).await;
                    if let Some(cache) = Self::from_weak(&weak) {
                        cache.evict_if_idle(&key, epoch);
                    }
                });
            }
            Err(_) => {
                // No runtime to time the grace period
                if let Some(slot) = slots.remove(key) {
                    Self::cancel_tasks(slot);
                }
            }
        }
    }

    fn evict_if_idle(&self, key: &str, epoch: u64) {
        let mut slots = self.inner.slots.lock();
        let idle = slots
            .get(key)
            .is_some_and(|slot| slot.subscribers == 0 && slot.eviction_epoch == epoch);
        if idle {
            debug!(key = %key, "Evicting cache entry");
            if let Some(slot) = slots.remove(key) {
                Self::cancel_tasks(slot);
            }
        }
    }
}

impl<T: Payload> Refresh for QueryCache<T> {
    fn refresh(&self, key: &str) -> bool {
        self.background_refresh(key)
    }
}
