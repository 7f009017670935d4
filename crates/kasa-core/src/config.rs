// ── Runtime registry configuration ──
//
// Describes how the registry talks to devices and how often it re-probes
// them. Never touches disk: the binary builds a `RegistryConfig` (usually
// through kasa-config) and hands it in.

use std::time::Duration;

use kasa_proto::{DEFAULT_PORT, TransportConfig};

/// Configuration shared by every handle a registry creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Timeouts and frame limit for each device connection.
    pub transport: TransportConfig,
    /// Port assumed for candidates given as a bare IP.
    pub default_port: u16,
    /// Delay between monitor sweeps over offline devices.
    pub monitor_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            default_port: DEFAULT_PORT,
            monitor_interval: Duration::from_secs(30),
        }
    }
}
