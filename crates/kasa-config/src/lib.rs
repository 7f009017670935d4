//! Configuration for the kasa binary.
//!
//! TOML file + `KASA_` environment overrides, layered with figment, and
//! translation to `kasa_core::RegistryConfig`. Core never reads files: the
//! binary loads a [`Config`] here and hands the translated pieces in.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kasa_core::{RegistryConfig, TransportConfig, parse_address};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Addresses probed by a sweep, as `"ip"` or `"ip:port"`.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,

    /// Port used for candidates given as a bare IP.
    #[serde(default = "default_device_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,

    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            port: default_device_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            io_timeout_ms: default_io_timeout_ms(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

fn default_candidates() -> Vec<String> {
    ["192.168.1", "192.168.0", "10.0.0"]
        .iter()
        .flat_map(|net| (100..=103).map(move |host| format!("{net}.{host}")))
        .collect()
}
fn default_device_port() -> u16 {
    kasa_core::RegistryConfig::default().default_port
}
fn default_connect_timeout_ms() -> u64 {
    2000
}
fn default_io_timeout_ms() -> u64 {
    5000
}
fn default_max_frame_len() -> usize {
    TransportConfig::default().max_frame_len
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_interval_secs() -> u64 {
    30
}

/// HTTP API listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_server_port(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_server_port() -> u16 {
    8080
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| invalid("server.bind", format!("not an IP address: {}", self.bind)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Device database. Defaults to `kasa.db` in the data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Reject values the rest of the program cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.candidates()?;
        self.server.socket_addr()?;
        if self.monitor.interval_secs == 0 {
            return Err(invalid("monitor.interval_secs", "must be greater than zero"));
        }
        if self.discovery.connect_timeout_ms == 0 || self.discovery.io_timeout_ms == 0 {
            return Err(invalid("discovery timeouts", "must be greater than zero"));
        }
        if self.discovery.max_frame_len == 0 {
            return Err(invalid("discovery.max_frame_len", "must be greater than zero"));
        }
        Ok(())
    }

    /// Parsed discovery candidates, in configured order.
    pub fn candidates(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.discovery
            .candidates
            .iter()
            .map(|c| {
                parse_address(c, self.discovery.port)
                    .map_err(|e| invalid("discovery.candidates", e.to_string()))
            })
            .collect()
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            transport: TransportConfig {
                connect_timeout: Duration::from_millis(self.discovery.connect_timeout_ms),
                io_timeout: Duration::from_millis(self.discovery.io_timeout_ms),
                max_frame_len: self.discovery.max_frame_len,
            },
            default_port: self.discovery.port,
            monitor_interval: Duration::from_secs(self.monitor.interval_secs),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.store.path.clone().unwrap_or_else(default_store_path)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("rs", "kasa", "kasa")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the device store.
pub fn default_store_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share").join("kasa.db"),
        |dirs| dirs.data_dir().join("kasa.db"),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("kasa");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys use `__` between section and field, e.g.
/// `KASA_MONITOR__INTERVAL_SECS=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("KASA_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.discovery.port, 9999);
        assert_eq!(cfg.discovery.candidates.len(), 12);
        assert_eq!(cfg.discovery.candidates[0], "192.168.1.100");
        assert_eq!(cfg.discovery.candidates[11], "10.0.0.103");
        assert_eq!(cfg.monitor.interval_secs, 30);
        assert!(cfg.monitor.enabled);
        assert_eq!(cfg.server.socket_addr().unwrap().port(), 8080);
        cfg.validate().unwrap();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.monitor, MonitorConfig::default());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
[discovery]
candidates = ["10.1.1.5", "10.1.1.6:10000"]
connect_timeout_ms = 500

[monitor]
interval_secs = 5
"#,
        );

        let cfg = load_config_from(&path).unwrap();

        assert_eq!(
            cfg.candidates().unwrap(),
            vec![
                "10.1.1.5:9999".parse::<SocketAddr>().unwrap(),
                "10.1.1.6:10000".parse().unwrap()
            ]
        );
        let registry = cfg.registry_config();
        assert_eq!(registry.transport.connect_timeout, Duration::from_millis(500));
        assert_eq!(registry.transport.io_timeout, Duration::from_secs(5));
        assert_eq!(registry.monitor_interval, Duration::from_secs(5));
        assert_eq!(cfg.server.bind, "0.0.0.0");
    }

    #[test]
    fn bad_candidate_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[discovery]\ncandidates = [\"kitchen-lamp\"]\n");
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation { ref field, .. } if field == "discovery.candidates"
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[monitor]\ninterval_secs = 0\n");
        assert!(matches!(
            load_config_from(&path).unwrap_err(),
            ConfigError::Validation { .. }
        ));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.server.port = 9090;
        cfg.store.path = Some(dir.path().join("kasa.db"));

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.server.port, 9090);
        assert_eq!(loaded.store_path(), dir.path().join("kasa.db"));
    }
}
