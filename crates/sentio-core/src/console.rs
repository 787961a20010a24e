//! The signed-in console: shared dashboard resources over one API client.
//!
//! Each resource family gets its own typed [`QueryCache`], so every consumer
//! asking for "devices" (say) shares one entry and one in-flight fetch. The
//! AI resources are kept fresh by the [`PollingScheduler`] once
//! [`Console::start_polling`] is called, until the session ends.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::cache::{QueryCache, QueryOptions, Subscription};
use crate::config::Config;
use crate::models::{
    AlertList, AlertRule, AnomalyList, Deleted, Device, DeviceList, PredictionList, SystemStatus,
};
use crate::scheduler::{PollingScheduler, Registration};

pub const STATUS_KEY: &str = "status";
pub const ANOMALIES_KEY: &str = "anomalies";
pub const PREDICTIONS_KEY: &str = "predictions";
pub const DEVICES_KEY: &str = "devices";
pub const ALERTS_KEY: &str = "alerts";

/// Registrations and pinned subscriptions that keep the polled keys alive
/// while nobody else is looking at them.
struct Polling {
    _registrations: Vec<Registration>,
    _anomalies: Subscription<AnomalyList>,
    _predictions: Subscription<PredictionList>,
    session_watch: AbortHandle,
}

impl Drop for Polling {
    fn drop(&mut self) {
        self.session_watch.abort();
    }
}

pub struct Console {
    api: ApiClient,
    status: QueryCache<SystemStatus>,
    anomalies: QueryCache<AnomalyList>,
    predictions: QueryCache<PredictionList>,
    devices: QueryCache<DeviceList>,
    alerts: QueryCache<AlertList>,
    scheduler: PollingScheduler,
    anomalies_interval: Duration,
    predictions_interval: Duration,
    status_interval: Option<Duration>,
    polling: Arc<Mutex<Option<Polling>>>,
}

impl Console {
    pub(crate) fn new(api: ApiClient, config: &Config) -> Self {
        let grace = config.eviction_grace();
        Self {
            api,
            status: QueryCache::with_grace(grace),
            anomalies: QueryCache::with_grace(grace),
            predictions: QueryCache::with_grace(grace),
            devices: QueryCache::with_grace(grace),
            alerts: QueryCache::with_grace(grace),
            scheduler: PollingScheduler::new(),
            anomalies_interval: config.anomalies_poll_interval(),
            predictions_interval: config.predictions_poll_interval(),
            status_interval: config.status_refresh_interval(),
            polling: Arc::new(Mutex::new(None)),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn scheduler(&self) -> &PollingScheduler {
        &self.scheduler
    }

    /// Bind a call on the API client into a re-runnable fetcher.
    fn fetcher<T, F, Fut>(&self, call: F) -> impl Fn() -> Fut + Send + Sync + 'static
    where
        F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let api = self.api.clone();
        move || call(api.clone())
    }

    // ===== Subscriptions =====

    /// Component health, refreshed on its own interval while observed.
    pub fn status(&self) -> Subscription<SystemStatus> {
        let mut options = QueryOptions::new();
        if let Some(interval) = self.status_interval {
            options = options.refresh_every(interval);
        }
        let fetch = self.fetcher(|api| async move { api.status().await });
        self.status.subscribe(STATUS_KEY, fetch, options)
    }

    pub fn anomalies(&self) -> Subscription<AnomalyList> {
        let fetch = self.fetcher(|api| async move { api.anomalies().await });
        self.anomalies.subscribe(ANOMALIES_KEY, fetch, QueryOptions::new())
    }

    pub fn predictions(&self) -> Subscription<PredictionList> {
        let fetch = self.fetcher(|api| async move { api.predictions().await });
        self.predictions.subscribe(PREDICTIONS_KEY, fetch, QueryOptions::new())
    }

    /// Device inventory. Shows the demo inventory until the first
    /// successful fetch.
    pub fn devices(&self) -> Subscription<DeviceList> {
        let fetch = self.fetcher(|api| async move { api.list_devices().await });
        let options = QueryOptions::new().default_value(DeviceList::placeholder());
        self.devices.subscribe(DEVICES_KEY, fetch, options)
    }

    /// Alert rules. Shows the demo rules until the first successful fetch.
    pub fn alerts(&self) -> Subscription<AlertList> {
        let fetch = self.fetcher(|api| async move { api.list_alerts().await });
        let options = QueryOptions::new().default_value(AlertList::placeholder());
        self.alerts.subscribe(ALERTS_KEY, fetch, options)
    }

    // ===== Polling =====

    /// Start refreshing anomalies and predictions on their configured
    /// intervals. Does nothing if already polling or signed out.
    ///
    /// Polling stops by itself when the session ends, whether by logout or
    /// because the server rejected the token. Every timer on
    /// [`Console::scheduler`] is stopped with it.
    pub fn start_polling(&self) {
        let mut polling = self.polling.lock();
        if polling.is_some() {
            return;
        }
        if !self.api.credentials().has_token() {
            warn!("Not signed in, not starting dashboard polling");
            return;
        }
        info!(
            anomalies = ?self.anomalies_interval,
            predictions = ?self.predictions_interval,
            "Starting dashboard polling"
        );

        let registrations = vec![
            self.scheduler.register(
                Arc::new(self.anomalies.clone()),
                ANOMALIES_KEY,
                self.anomalies_interval,
            ),
            self.scheduler.register(
                Arc::new(self.predictions.clone()),
                PREDICTIONS_KEY,
                self.predictions_interval,
            ),
        ];
        *polling = Some(Polling {
            _registrations: registrations,
            _anomalies: self.anomalies(),
            _predictions: self.predictions(),
            session_watch: self.watch_session(),
        });
    }

    fn watch_session(&self) -> AbortHandle {
        let mut authenticated = self.api.credentials().watch();
        let polling = Arc::clone(&self.polling);
        let scheduler = self.scheduler.clone();
        let task = tokio::spawn(async move {
            // Also resolves if the store is gone
            let _ = authenticated.wait_for(|signed_in| !signed_in).await;
            let stopped = polling.lock().take();
            scheduler.stop_all();
            if stopped.is_some() {
                info!("Session ended, stopped dashboard polling");
            }
        });
        task.abort_handle()
    }

    pub fn stop_polling(&self) {
        let stopped = self.polling.lock().take();
        if stopped.is_some() {
            info!("Stopped dashboard polling");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.polling.lock().is_some()
    }

    /// Re-fetch every dashboard resource that is currently cached.
    pub fn refresh_all(&self) {
        debug!("Refreshing all dashboard resources");
        self.status.invalidate(STATUS_KEY);
        self.anomalies.invalidate(ANOMALIES_KEY);
        self.predictions.invalidate(PREDICTIONS_KEY);
        self.devices.invalidate(DEVICES_KEY);
        self.alerts.invalidate(ALERTS_KEY);
    }

    // ===== Mutations =====

    pub async fn create_device(&self, device: &Device) -> Result<Device, ApiError> {
        let created = self.api.create_device(device).await?;
        self.devices.invalidate(DEVICES_KEY);
        Ok(created)
    }

    pub async fn update_device(&self, id: &str, device: &Device) -> Result<Device, ApiError> {
        let updated = self.api.update_device(id, device).await?;
        self.devices.invalidate(DEVICES_KEY);
        Ok(updated)
    }

    pub async fn delete_device(&self, id: &str) -> Result<Deleted, ApiError> {
        let deleted = self.api.delete_device(id).await?;
        self.devices.invalidate(DEVICES_KEY);
        Ok(deleted)
    }

    pub async fn create_alert(&self, alert: &AlertRule) -> Result<AlertRule, ApiError> {
        let created = self.api.create_alert(alert).await?;
        self.alerts.invalidate(ALERTS_KEY);
        Ok(created)
    }

    pub async fn update_alert(&self, id: &str, alert: &AlertRule) -> Result<AlertRule, ApiError> {
        let updated = self.api.update_alert(id, alert).await?;
        self.alerts.invalidate(ALERTS_KEY);
        Ok(updated)
    }

    pub async fn delete_alert(&self, id: &str) -> Result<Deleted, ApiError> {
        let deleted = self.api.delete_alert(id).await?;
        self.alerts.invalidate(ALERTS_KEY);
        Ok(deleted)
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.stop_polling();
        self.scheduler.stop_all();
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("base_url", &self.api.base_url())
            .field("polling", &self.is_polling())
            .finish()
    }
}
