//! SQLite device store.
//!
//! Two tables: `devices`, one row per device id, and `discovery_history`,
//! one row per probe. Every method opens its own connection in WAL mode,
//! so the store is safe to share across threads. Calls block; async
//! callers run them on the blocking pool.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OpenFlags, Row, params};

use kasa_core::{DeviceRecord, DiscoveryAttempt, PersistentStore, StoreError};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS devices (
    device_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    ip TEXT NOT NULL,
    port INTEGER NOT NULL,
    model TEXT NOT NULL DEFAULT '',
    mac TEXT NOT NULL DEFAULT '',
    kind TEXT NOT NULL DEFAULT 'unknown',
    is_online BOOLEAN NOT NULL DEFAULT FALSE,
    is_on BOOLEAN NOT NULL DEFAULT FALSE,
    brightness INTEGER NOT NULL DEFAULT 0,
    color_temp INTEGER NOT NULL DEFAULT 4000,
    hue INTEGER NOT NULL DEFAULT 0,
    saturation INTEGER NOT NULL DEFAULT 0,
    last_seen TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_devices_ip ON devices(ip);
CREATE INDEX IF NOT EXISTS idx_devices_online ON devices(is_online);

CREATE TABLE IF NOT EXISTS discovery_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ip TEXT NOT NULL,
    device_id TEXT,
    model TEXT,
    success BOOLEAN NOT NULL,
    discovered_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_discovery_time ON discovery_history(discovered_at DESC);
";

const DEVICE_COLUMNS: &str = "device_id, name, ip, port, model, mac, kind, is_online, is_on, \
                              brightness, color_temp, hue, saturation, last_seen";

#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open the database at `path`, creating the file, its directory and
    /// the schema as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        }

        let store = Self { path };
        store.conn()?.execute_batch(SCHEMA).map_err(store.db_err())?;
        tracing::debug!(path = %store.path.display(), "store opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(self.db_err())?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;
        ",
        )
        .map_err(self.db_err())?;
        Ok(conn)
    }

    fn db_err(&self) -> impl Fn(rusqlite::Error) -> StoreError + '_ {
        |e| match e.sqlite_error_code() {
            Some(ErrorCode::NotADatabase) => StoreError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            },
            _ => StoreError::Backend {
                path: self.path.clone(),
                source: Box::new(e),
            },
        }
    }

    fn query_devices(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<DeviceRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM devices {filter} ORDER BY name, device_id"
            ))
            .map_err(self.db_err())?;
        let rows = stmt
            .query_map(params, device_from_row)
            .map_err(self.db_err())?;
        rows.collect::<Result<Vec<_>, _>>().map_err(self.db_err())
    }

    #[cfg(test)]
    fn history_len(&self) -> usize {
        let conn = self.conn().unwrap();
        conn.query_row("SELECT COUNT(*) FROM discovery_history", [], |row| {
            row.get(0)
        })
        .unwrap()
    }
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<DeviceRecord> {
    let ip: String = row.get(2)?;
    let ip: IpAddr = ip
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let kind: String = row.get(6)?;
    let last_seen: Option<String> = row.get(13)?;

    Ok(DeviceRecord {
        device_id: row.get(0)?,
        name: row.get(1)?,
        ip,
        port: row.get(3)?,
        model: row.get(4)?,
        mac: row.get(5)?,
        kind: kind.parse().unwrap_or_default(),
        is_online: row.get(7)?,
        is_on: row.get(8)?,
        brightness: row.get(9)?,
        color_temp: row.get(10)?,
        hue: row.get(11)?,
        saturation: row.get(12)?,
        last_seen: last_seen.as_deref().and_then(parse_datetime),
    })
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl PersistentStore for SqliteStore {
    fn upsert(&self, record: &DeviceRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO devices ({DEVICE_COLUMNS}, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, datetime('now'))"
            ),
            params![
                record.device_id,
                record.name,
                record.ip.to_string(),
                record.port,
                record.model,
                record.mac,
                record.kind.to_string(),
                record.is_online,
                record.is_on,
                record.brightness,
                record.color_temp,
                record.hue,
                record.saturation,
                record.last_seen.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(self.db_err())?;
        Ok(())
    }

    fn remove(&self, device_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let rows = conn
            .execute("DELETE FROM devices WHERE device_id = ?1", [device_id])
            .map_err(self.db_err())?;
        Ok(rows > 0)
    }

    fn get(&self, device_id: &str) -> Result<Option<DeviceRecord>, StoreError> {
        Ok(self
            .query_devices("WHERE device_id = ?1", [device_id])?
            .into_iter()
            .next())
    }

    /// Ordered by name, then id.
    fn list_all(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        self.query_devices("", [])
    }

    fn list_by_online(&self, online: bool) -> Result<Vec<DeviceRecord>, StoreError> {
        self.query_devices("WHERE is_online = ?1", [online])
    }

    fn record_discovery_attempt(&self, attempt: DiscoveryAttempt) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO discovery_history (ip, device_id, model, success, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                attempt.ip,
                attempt.device_id,
                attempt.model,
                attempt.success,
                attempt.timestamp.to_rfc3339(),
            ],
        )
        .map_err(self.db_err())?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kasa_core::{DeviceCounts, DeviceKind};
    use pretty_assertions::assert_eq;

    fn record(id: &str, name: &str, online: bool) -> DeviceRecord {
        let mut r = DeviceRecord::new("127.0.0.1:9999".parse().unwrap());
        r.device_id = id.into();
        r.name = name.into();
        r.kind = DeviceKind::Bulb;
        r.is_online = online;
        r
    }

    #[test]
    fn fresh_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("kasa.db")).unwrap();
        assert!(store.list_all().unwrap().is_empty());
        assert!(store.path().exists());
    }

    #[test]
    fn mutations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/kasa.db");

        let store = SqliteStore::open(&path).unwrap();
        let mut bulb = record("B1", "Kitchen", true);
        bulb.hue = 180;
        bulb.saturation = 50;
        bulb.last_seen = Some(Utc::now());
        store.upsert(&bulb).unwrap();
        store.upsert(&record("P1", "Desk", false)).unwrap();
        store
            .record_discovery_attempt(DiscoveryAttempt::failed("10.0.0.9:9999"))
            .unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        let restored = reopened.get("B1").unwrap().unwrap();
        assert_eq!(restored.device_id, bulb.device_id);
        assert_eq!(restored.hue, 180);
        assert_eq!(restored.saturation, 50);
        assert_eq!(restored.kind, DeviceKind::Bulb);
        assert_eq!(restored.addr(), bulb.addr());
        assert!(restored.last_seen.is_some());
        assert_eq!(
            reopened.counts().unwrap(),
            DeviceCounts {
                total: 2,
                online: 1,
                offline: 1
            }
        );
        assert_eq!(reopened.history_len(), 1);
    }

    #[test]
    fn list_all_is_ordered_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("kasa.db")).unwrap();
        store.upsert(&record("1", "Porch", true)).unwrap();
        store.upsert(&record("2", "Attic", true)).unwrap();

        let names: Vec<_> = store.list_all().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["Attic", "Porch"]);
    }

    #[test]
    fn upsert_replaces_and_remove_reports_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("kasa.db")).unwrap();
        store.upsert(&record("B1", "Old", true)).unwrap();
        store.upsert(&record("B1", "New", false)).unwrap();

        assert_eq!(store.list_all().unwrap().len(), 1);
        assert_eq!(store.list_by_online(false).unwrap()[0].name, "New");
        assert!(store.list_by_online(true).unwrap().is_empty());
        assert!(store.remove("B1").unwrap());
        assert!(!store.remove("B1").unwrap());
    }

    #[test]
    fn history_grows_without_touching_devices() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("kasa.db")).unwrap();
        let device = record("B1", "Lamp", true);
        store.upsert(&device).unwrap();
        for _ in 0..50 {
            store
                .record_discovery_attempt(DiscoveryAttempt::succeeded(&device))
                .unwrap();
        }

        assert_eq!(store.history_len(), 50);
        assert_eq!(store.list_all().unwrap(), vec![device]);
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kasa.db");
        fs::write(&path, vec![0x42; 4096]).unwrap();

        let err = SqliteStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }), "got {err:?}");
    }
}
