//! Polling scheduler for time-sensitive resources.
//!
//! Registrations are independent of who is displaying the data: as long as
//! one registration for a key is alive, its timer keeps asking the target
//! cache to refresh that key. Each key runs on its own task, and a refresh
//! only starts a background fetch, so a slow backend for one key never
//! holds up another key's timer.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::Refresh;

struct KeyTimer {
    target: Arc<dyn Refresh>,
    registrations: HashMap<u64, Duration>,
    interval: Duration,
    task: JoinHandle<()>,
}

impl KeyTimer {
    fn shortest_interval(&self) -> Option<Duration> {
        self.registrations.values().min().copied()
    }
}

#[derive(Default)]
struct State {
    next_id: u64,
    timers: HashMap<String, KeyTimer>,
}

/// Drives periodic refreshes of registered cache keys.
///
/// Clone is cheap - clones share registrations.
#[derive(Clone, Default)]
pub struct PollingScheduler {
    state: Arc<Mutex<State>>,
}

/// Keeps a key polled until dropped or passed to [`PollingScheduler::unregister`].
#[must_use = "the key stops being polled when the registration is dropped"]
pub struct Registration {
    id: u64,
    key: String,
    state: Weak<Mutex<State>>,
}

impl Registration {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            PollingScheduler { state }.remove(&self.key, self.id);
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

impl PollingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh `key` on `target` every `interval`, first tick one interval
    /// from now. With several registrations for one key, the shortest
    /// interval drives the timer. Must be called inside a tokio runtime.
    pub fn register(
        &self,
        target: Arc<dyn Refresh>,
        key: impl Into<String>,
        interval: Duration,
    ) -> Registration {
        let key = key.into();
        let interval = interval.max(Duration::from_millis(1));
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;

        match state.timers.get_mut(&key) {
            Some(timer) => {
                timer.registrations.insert(id, interval);
                timer.target = target;
                if interval < timer.interval {
                    debug!(key = %key, ?interval, "Shortening poll interval");
                    timer.task.abort();
                    timer.interval = interval;
                    timer.task = Self::spawn_timer(Arc::clone(&timer.target), key.clone(), interval);
                }
            }
            None => {
                info!(key = %key, ?interval, "Polling started");
                let task = Self::spawn_timer(Arc::clone(&target), key.clone(), interval);
                state.timers.insert(
                    key.clone(),
                    KeyTimer {
                        target,
                        registrations: HashMap::from([(id, interval)]),
                        interval,
                        task,
                    },
                );
            }
        }

        Registration {
            id,
            key,
            state: Arc::downgrade(&self.state),
        }
    }

    pub fn unregister(&self, registration: Registration) {
        drop(registration);
    }

    /// Stop polling `key` regardless of outstanding registrations.
    pub fn stop(&self, key: &str) {
        if let Some(timer) = self.state.lock().timers.remove(key) {
            info!(key = %key, "Polling stopped");
            timer.task.abort();
        }
    }

    pub fn stop_all(&self) {
        let timers: Vec<(String, KeyTimer)> = self.state.lock().timers.drain().collect();
        for (key, timer) in timers {
            info!(key = %key, "Polling stopped");
            timer.task.abort();
        }
    }

    pub fn is_polling(&self, key: &str) -> bool {
        self.state.lock().timers.contains_key(key)
    }

    /// Interval currently driving `key`.
    pub fn interval(&self, key: &str) -> Option<Duration> {
        self.state.lock().timers.get(key).map(|timer| timer.interval)
    }

    pub fn polled_keys(&self) -> Vec<String> {
        self.state.lock().timers.keys().cloned().collect()
    }

    fn remove(&self, key: &str, id: u64) {
        let mut state = self.state.lock();
        let Some(timer) = state.timers.get_mut(key) else {
            return;
        };
        if timer.registrations.remove(&id).is_none() {
            return;
        }

        match timer.shortest_interval() {
            None => {
                if let Some(timer) = state.timers.remove(key) {
                    info!(key = %key, "Polling stopped");
                    timer.task.abort();
                }
            }
            Some(interval) if interval != timer.interval => {
                debug!(key = %key, ?interval, "Poll interval changed");
                timer.task.abort();
                timer.interval = interval;
                timer.task = Self::spawn_timer(Arc::clone(&timer.target), key.to_string(), interval);
            }
            Some(_) => {}
        }
    }

    fn spawn_timer(target: Arc<dyn Refresh>, key: String, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !target.refresh(&key) {
                    debug!(key = %key, "No cache entry to refresh yet");
                }
            }
        })
    }
}

impl Drop for State {
    fn drop(&mut self) {
        for timer in self.timers.values() {
            timer.task.abort();
        }
    }
}
