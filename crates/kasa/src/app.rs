//! Application context shared by the CLI commands and the HTTP API.
//!
//! Owns the registry, the persistent store and the cancellation token for
//! background work. Every change the registry reports is written through
//! to the store, so one-shot commands and the server see the same devices.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kasa_core::{
    CoreError, DeviceCounts, DeviceHandle, DeviceRecord, DeviceRegistry, DiscoveryAttempt,
    Monitor, PersistentStore, ProbeOutcome, RegistryConfig, StoreError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct AppContext {
    registry: Arc<DeviceRegistry>,
    store: Arc<dyn PersistentStore>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl AppContext {
    pub fn new(config: RegistryConfig, store: Arc<dyn PersistentStore>) -> Self {
        Self {
            registry: Arc::new(DeviceRegistry::new(config)),
            store,
            cancel: CancellationToken::new(),
            task_handles: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    // ── Membership ───────────────────────────────────────────────────

    /// Register every stored device and probe it once.
    ///
    /// Devices that do not answer stay in the store, marked offline.
    /// Returns how many answered.
    pub async fn rehydrate(&self) -> Result<usize, AppError> {
        let mut online = 0;
        for stored in self.with_store(|s| s.list_all()).await? {
            let id = stored.device_id.clone();
            if !self.registry.restore(stored).await {
                continue;
            }
            let handle = self.registry.get_device(&id).await?;
            let record = match handle.discover().await {
                Ok(record) => {
                    online += 1;
                    record
                }
                Err(e) => {
                    debug!(device_id = %id, error = %e, "stored device did not answer");
                    handle.record()
                }
            };
            self.upsert(record).await?;
        }
        info!(online, "rehydrated devices from store");
        Ok(online)
    }

    /// Sweep `candidates`, persisting every confirmed record and every attempt.
    pub async fn discover_all(
        &self,
        candidates: &[SocketAddr],
    ) -> Result<Vec<ProbeOutcome>, AppError> {
        let outcomes = self.registry.sweep(candidates).await;
        let writes: Vec<_> = outcomes
            .iter()
            .map(|outcome| match outcome.record() {
                Some(record) => (Some(record.clone()), DiscoveryAttempt::succeeded(record)),
                None => (None, DiscoveryAttempt::failed(outcome.addr.to_string())),
            })
            .collect();

        self.with_store(move |store| {
            for (record, attempt) in writes {
                if let Some(record) = record {
                    store.upsert(&record)?;
                }
                store.record_discovery_attempt(attempt)?;
            }
            Ok(())
        })
        .await?;
        Ok(outcomes)
    }

    pub async fn add_device(&self, addr: SocketAddr) -> Result<DeviceRecord, AppError> {
        match self.registry.add_device(addr).await {
            Ok(record) => {
                let saved = record.clone();
                self.with_store(move |store| {
                    store.upsert(&saved)?;
                    store.record_discovery_attempt(DiscoveryAttempt::succeeded(&saved))
                })
                .await?;
                Ok(record)
            }
            Err(e) => {
                if e.is_unreachable() {
                    let attempt = DiscoveryAttempt::failed(addr.to_string());
                    self.with_store(move |store| store.record_discovery_attempt(attempt))
                        .await?;
                }
                Err(e.into())
            }
        }
    }

    /// Forget a device in both the registry and the store.
    pub async fn remove_device(&self, device_id: &str) -> Result<DeviceRecord, AppError> {
        let registered = self.registry.remove_device(device_id).await.ok();
        let id = device_id.to_owned();
        let stored = self
            .with_store(move |store| {
                let stored = store.get(&id)?;
                store.remove(&id)?;
                Ok(stored)
            })
            .await?;
        registered
            .or(stored)
            .ok_or_else(|| not_found(device_id))
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Live record when registered, else the stored one.
    pub async fn get(&self, device_id: &str) -> Result<DeviceRecord, AppError> {
        if let Ok(handle) = self.registry.get_device(device_id).await {
            return Ok(handle.record());
        }
        self.stored(device_id)
            .await?
            .ok_or_else(|| not_found(device_id))
    }

    /// `None` lists everything; `Some(online)` filters by reachability.
    pub async fn list(&self, online: Option<bool>) -> Result<Vec<DeviceRecord>, AppError> {
        Ok(self
            .with_store(move |store| match online {
                None => store.list_all(),
                Some(online) => store.list_by_online(online),
            })
            .await?)
    }

    pub async fn counts(&self) -> Result<DeviceCounts, AppError> {
        Ok(self.with_store(|store| store.counts()).await?)
    }

    // ── Control ──────────────────────────────────────────────────────

    pub async fn set_power(&self, device_id: &str, on: bool) -> Result<DeviceRecord, AppError> {
        self.control(device_id, |h| async move { h.set_power(on).await })
            .await
    }

    pub async fn toggle_power(&self, device_id: &str) -> Result<DeviceRecord, AppError> {
        self.control(device_id, |h| async move { h.toggle_power().await })
            .await
    }

    pub async fn set_brightness(
        &self,
        device_id: &str,
        brightness: i64,
    ) -> Result<DeviceRecord, AppError> {
        self.control(device_id, |h| async move {
            h.set_brightness(brightness).await
        })
        .await
    }

    pub async fn set_color(
        &self,
        device_id: &str,
        hue: i64,
        saturation: i64,
        value: i64,
    ) -> Result<DeviceRecord, AppError> {
        self.control(device_id, |h| async move {
            h.set_color(hue, saturation, value).await
        })
        .await
    }

    pub async fn set_color_temp(
        &self,
        device_id: &str,
        kelvin: i64,
    ) -> Result<DeviceRecord, AppError> {
        self.control(device_id, |h| async move { h.set_color_temp(kelvin).await })
            .await
    }

    /// Run `op` on the device and write the outcome through to the store.
    ///
    /// A device unreachable during `op` is stored offline before the error
    /// is returned.
    async fn control<F, Fut>(&self, device_id: &str, op: F) -> Result<DeviceRecord, AppError>
    where
        F: FnOnce(Arc<DeviceHandle>) -> Fut,
        Fut: Future<Output = Result<DeviceRecord, CoreError>>,
    {
        let handle = self.handle(device_id).await?;
        match op(Arc::clone(&handle)).await {
            Ok(record) => {
                self.upsert(record.clone()).await?;
                Ok(record)
            }
            Err(e) => {
                if e.is_unreachable() {
                    self.upsert(handle.record()).await?;
                }
                Err(e.into())
            }
        }
    }

    /// Registered handle, or one restored from the store on demand.
    async fn handle(&self, device_id: &str) -> Result<Arc<DeviceHandle>, AppError> {
        if let Ok(handle) = self.registry.get_device(device_id).await {
            return Ok(handle);
        }
        let stored = self
            .stored(device_id)
            .await?
            .ok_or_else(|| not_found(device_id))?;
        self.registry.restore(stored).await;
        Ok(self.registry.get_device(device_id).await?)
    }

    // ── Store access ─────────────────────────────────────────────────

    /// Run store calls on the blocking pool.
    async fn with_store<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn PersistentStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| StoreError::Interrupted {
                message: e.to_string(),
            })?
    }

    async fn upsert(&self, record: DeviceRecord) -> Result<(), StoreError> {
        self.with_store(move |store| store.upsert(&record)).await
    }

    async fn stored(&self, device_id: &str) -> Result<Option<DeviceRecord>, StoreError> {
        let id = device_id.to_owned();
        self.with_store(move |store| store.get(&id)).await
    }

    // ── Background work ──────────────────────────────────────────────

    /// Start the offline-device monitor. Recovered records are persisted
    /// on the blocking pool.
    pub async fn spawn_monitor(&self) {
        let store = Arc::clone(&self.store);
        let task = Monitor::new(Arc::clone(&self.registry), self.cancel.clone()).spawn(
            move |outcome| {
                let Some(record) = outcome.record().cloned() else {
                    return;
                };
                info!(device_id = %record.device_id, addr = %outcome.addr, "device back online");
                let store = Arc::clone(&store);
                tokio::task::spawn_blocking(move || {
                    if let Err(e) = store.upsert(&record) {
                        warn!(error = %e, "failed to persist recovered device");
                    }
                });
            },
        );
        self.task_handles.lock().await.push(task);
    }

    /// Cancel background work and wait for it to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut handles = self.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        debug!("application context shut down");
    }
}

fn not_found(device_id: &str) -> AppError {
    AppError::Core(CoreError::NotFound {
        device_id: device_id.to_owned(),
    })
}
