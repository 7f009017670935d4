// ── Device registry ──
//
// Membership lives in one `RwLock<IndexMap>` keyed by device id. The lock
// is only held for map manipulation: probes and control calls run on an
// `Arc<DeviceHandle>` cloned out of the map, so a slow device never blocks
// lookups, listings or other devices.

use std::net::SocketAddr;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::error::CoreError;
use crate::handle::DeviceHandle;
use crate::model::{DeviceCounts, DeviceRecord};

/// Result of probing one candidate address.
#[derive(Debug)]
pub struct ProbeOutcome {
    pub addr: SocketAddr,
    pub result: Result<DeviceRecord, CoreError>,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn record(&self) -> Option<&DeviceRecord> {
        self.result.as_ref().ok()
    }
}

/// What to do when a probe reports an id that is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnDuplicate {
    Relocate,
    Reject,
}

/// The set of known devices, keyed by the id each device reports.
#[derive(Debug)]
pub struct DeviceRegistry {
    config: RegistryConfig,
    devices: RwLock<IndexMap<String, Arc<DeviceHandle>>>,
}

impl DeviceRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            devices: RwLock::new(IndexMap::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ── Membership ───────────────────────────────────────────────────

    /// Probe each candidate in order and admit every device that answers.
    ///
    /// A device already known under the same id is relocated to the
    /// address it answered on. Returns one outcome per candidate.
    pub async fn sweep(&self, candidates: &[SocketAddr]) -> Vec<ProbeOutcome> {
        let mut outcomes = Vec::with_capacity(candidates.len());
        for &addr in candidates {
            let result = match self.probe(addr).await {
                Ok(fresh) => self.admit(fresh, OnDuplicate::Relocate).await,
                Err(e) => Err(e),
            };
            outcomes.push(ProbeOutcome { addr, result });
        }

        let found = outcomes.iter().filter(|o| o.is_success()).count();
        info!(candidates = candidates.len(), found, "discovery sweep finished");
        outcomes
    }

    /// [`sweep`](Self::sweep), keeping only the confirmed records in
    /// candidate order.
    pub async fn discover(&self, candidates: &[SocketAddr]) -> Vec<DeviceRecord> {
        self.sweep(candidates)
            .await
            .into_iter()
            .filter_map(|o| o.result.ok())
            .collect()
    }

    /// Probe one address and register the device.
    ///
    /// Fails with [`CoreError::AlreadyRegistered`] if the id is known; the
    /// existing handle is left untouched.
    pub async fn add_device(&self, addr: SocketAddr) -> Result<DeviceRecord, CoreError> {
        let fresh = self.probe(addr).await?;
        self.admit(fresh, OnDuplicate::Reject).await
    }

    /// Register a previously known device without probing it. It starts
    /// offline and is picked up by the next monitor sweep. Returns `false`
    /// if the id is already registered or the record has no id.
    pub async fn restore(&self, record: DeviceRecord) -> bool {
        if !record.has_identity() {
            return false;
        }
        let mut devices = self.devices.write().await;
        match devices.entry(record.device_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!(device_id = %record.device_id, addr = %record.addr(), "restored device");
                slot.insert(Arc::new(DeviceHandle::from_record(
                    record,
                    self.config.transport.clone(),
                )));
                true
            }
        }
    }

    /// Remove a device. Its handle stays usable by anyone still holding it,
    /// but it is no longer reachable by id.
    pub async fn remove_device(&self, device_id: &str) -> Result<DeviceRecord, CoreError> {
        let removed = self.devices.write().await.shift_remove(device_id);
        let handle = removed.ok_or_else(|| CoreError::not_found(device_id))?;
        info!(device_id, "device removed");
        Ok(handle.record())
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Arc<DeviceHandle>, CoreError> {
        self.devices
            .read()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(device_id))
    }

    pub async fn contains(&self, device_id: &str) -> bool {
        self.devices.read().await.contains_key(device_id)
    }

    /// Every handle, in insertion order.
    pub async fn handles(&self) -> Vec<Arc<DeviceHandle>> {
        self.devices.read().await.values().cloned().collect()
    }

    // ── Listing ──────────────────────────────────────────────────────

    pub async fn list_all(&self) -> Vec<DeviceRecord> {
        self.list_where(|_| true).await
    }

    pub async fn list_online(&self) -> Vec<DeviceRecord> {
        self.list_where(|r| r.is_online).await
    }

    pub async fn list_offline(&self) -> Vec<DeviceRecord> {
        self.list_where(|r| !r.is_online).await
    }

    pub async fn counts(&self) -> DeviceCounts {
        DeviceCounts::tally(&self.list_all().await)
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }

    async fn list_where(&self, keep: impl Fn(&DeviceRecord) -> bool) -> Vec<DeviceRecord> {
        self.devices
            .read()
            .await
            .values()
            .map(|h| h.record())
            .filter(|r| keep(r))
            .collect()
    }

    // ── Control by id ────────────────────────────────────────────────

    pub async fn set_power(&self, device_id: &str, on: bool) -> Result<DeviceRecord, CoreError> {
        self.get_device(device_id).await?.set_power(on).await
    }

    pub async fn toggle_power(&self, device_id: &str) -> Result<DeviceRecord, CoreError> {
        self.get_device(device_id).await?.toggle_power().await
    }

    pub async fn set_brightness(
        &self,
        device_id: &str,
        brightness: i64,
    ) -> Result<DeviceRecord, CoreError> {
        self.get_device(device_id)
            .await?
            .set_brightness(brightness)
            .await
    }

    pub async fn set_color(
        &self,
        device_id: &str,
        hue: i64,
        saturation: i64,
        value: i64,
    ) -> Result<DeviceRecord, CoreError> {
        self.get_device(device_id)
            .await?
            .set_color(hue, saturation, value)
            .await
    }

    pub async fn set_color_temp(
        &self,
        device_id: &str,
        kelvin: i64,
    ) -> Result<DeviceRecord, CoreError> {
        self.get_device(device_id)
            .await?
            .set_color_temp(kelvin)
            .await
    }

    // ── Reachability ─────────────────────────────────────────────────

    /// Re-probe every device currently marked offline. Online devices are
    /// left alone.
    pub async fn probe_offline(&self) -> Vec<ProbeOutcome> {
        let offline: Vec<_> = self
            .handles()
            .await
            .into_iter()
            .filter(|h| !h.is_online())
            .collect();

        let mut outcomes = Vec::with_capacity(offline.len());
        for handle in offline {
            let addr = handle.addr();
            let result = handle.discover().await;
            if let Ok(record) = &result {
                info!(device_id = %record.device_id, %addr, "device back online");
            }
            outcomes.push(ProbeOutcome { addr, result });
        }
        outcomes
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Handshake with a candidate on a handle that is not yet in the map.
    async fn probe(&self, addr: SocketAddr) -> Result<DeviceHandle, CoreError> {
        let fresh = DeviceHandle::new(addr, self.config.transport.clone());
        fresh.discover().await?;
        Ok(fresh)
    }

    async fn admit(
        &self,
        fresh: DeviceHandle,
        on_duplicate: OnDuplicate,
    ) -> Result<DeviceRecord, CoreError> {
        let record = fresh.record();

        let existing = {
            let mut devices = self.devices.write().await;
            match devices.entry(record.device_id.clone()) {
                Entry::Occupied(slot) => Arc::clone(slot.get()),
                Entry::Vacant(slot) => {
                    info!(
                        device_id = %record.device_id,
                        addr = %record.addr(),
                        model = %record.model,
                        "device registered"
                    );
                    slot.insert(Arc::new(fresh));
                    return Ok(record);
                }
            }
        };

        match on_duplicate {
            OnDuplicate::Relocate => Ok(existing.relocate(fresh).await),
            OnDuplicate::Reject => Err(CoreError::AlreadyRegistered {
                device_id: record.device_id,
                addr: existing.addr(),
            }),
        }
    }
}
