// ── Persistence boundary ──
//
// The registry itself keeps nothing on disk. Callers that want device
// records and discovery history to survive restarts hand a
// `PersistentStore` to the application layer.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{DeviceCounts, DeviceRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot access store at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt store at {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("Store query failed at {}: {source}", path.display())]
    Backend {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Store operation did not complete: {message}")]
    Interrupted { message: String },

    #[error("Cannot serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One probe of one address, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryAttempt {
    pub ip: String,
    pub device_id: Option<String>,
    pub model: Option<String>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl DiscoveryAttempt {
    pub fn succeeded(record: &DeviceRecord) -> Self {
        Self {
            ip: record.addr().to_string(),
            device_id: Some(record.device_id.clone()),
            model: Some(record.model.clone()),
            success: true,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            device_id: None,
            model: None,
            success: false,
            timestamp: Utc::now(),
        }
    }
}

/// Durable storage for device records and discovery history.
pub trait PersistentStore: Send + Sync {
    /// Insert or replace the record with the same device id.
    fn upsert(&self, record: &DeviceRecord) -> Result<(), StoreError>;

    /// Returns `false` if no record had that id.
    fn remove(&self, device_id: &str) -> Result<bool, StoreError>;

    fn get(&self, device_id: &str) -> Result<Option<DeviceRecord>, StoreError>;

    fn list_all(&self) -> Result<Vec<DeviceRecord>, StoreError>;

    fn list_by_online(&self, online: bool) -> Result<Vec<DeviceRecord>, StoreError> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|r| r.is_online == online)
            .collect())
    }

    fn record_discovery_attempt(&self, attempt: DiscoveryAttempt) -> Result<(), StoreError>;

    fn counts(&self) -> Result<DeviceCounts, StoreError> {
        Ok(DeviceCounts::tally(&self.list_all()?))
    }
}

// ── In-memory store ──────────────────────────────────────────────────

/// Store that lives only as long as the process. Used when persistence
/// is disabled and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    devices: IndexMap<String, DeviceRecord>,
    history: Vec<DiscoveryAttempt>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<DiscoveryAttempt> {
        self.lock().history.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistentStore for MemoryStore {
    fn upsert(&self, record: &DeviceRecord) -> Result<(), StoreError> {
        self.lock()
            .devices
            .insert(record.device_id.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, device_id: &str) -> Result<bool, StoreError> {
        Ok(self.lock().devices.shift_remove(device_id).is_some())
    }

    fn get(&self, device_id: &str) -> Result<Option<DeviceRecord>, StoreError> {
        Ok(self.lock().devices.get(device_id).cloned())
    }

    fn list_all(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        Ok(self.lock().devices.values().cloned().collect())
    }

    fn record_discovery_attempt(&self, attempt: DiscoveryAttempt) -> Result<(), StoreError> {
        self.lock().history.push(attempt);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(id: &str, online: bool) -> DeviceRecord {
        let mut r = DeviceRecord::new("10.0.0.9:9999".parse().unwrap());
        r.device_id = id.into();
        r.is_online = online;
        r
    }

    #[test]
    fn upsert_replaces_by_id() {
        let store = MemoryStore::new();
        store.upsert(&record("A", false)).unwrap();
        store.upsert(&record("A", true)).unwrap();

        assert_eq!(store.list_all().unwrap().len(), 1);
        assert!(store.get("A").unwrap().unwrap().is_online);
    }

    #[test]
    fn filters_and_counts_by_online() {
        let store = MemoryStore::new();
        store.upsert(&record("A", true)).unwrap();
        store.upsert(&record("B", false)).unwrap();
        store.upsert(&record("C", false)).unwrap();

        assert_eq!(store.list_by_online(false).unwrap().len(), 2);
        let counts = store.counts().unwrap();
        assert_eq!((counts.total, counts.online, counts.offline), (3, 1, 2));
    }

    #[test]
    fn remove_reports_absence() {
        let store = MemoryStore::new();
        store.upsert(&record("A", true)).unwrap();
        assert!(store.remove("A").unwrap());
        assert!(!store.remove("A").unwrap());
    }

    #[test]
    fn history_keeps_failures() {
        let store = MemoryStore::new();
        store
            .record_discovery_attempt(DiscoveryAttempt::failed("10.0.0.1:9999"))
            .unwrap();
        store
            .record_discovery_attempt(DiscoveryAttempt::succeeded(&record("A", true)))
            .unwrap();

        let history = store.history();
        assert_eq!(history.len(), 2);
        assert!(!history[0].success);
        assert_eq!(history[1].device_id.as_deref(), Some("A"));
    }
}
