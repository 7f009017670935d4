//! Device registry and control layer between `kasa-proto` and the binary.
//!
//! - **[`DeviceHandle`]**: exclusive owner of one device connection. Every
//!   exchange and every record mutation on a device is serialized behind
//!   its transport lock; the cached [`DeviceRecord`] is published through a
//!   `watch` channel so reads never wait on the network.
//!
//! - **[`DeviceRegistry`]**: the set of known devices keyed by the id each
//!   device reports. Discovery sweeps, add/remove, listings and control by
//!   id. The membership lock is never held across network I/O.
//!
//! - **[`Monitor`]**: background task that re-probes offline devices on a
//!   fixed interval and stops on a `CancellationToken`.
//!
//! - **[`PersistentStore`]**: collaborator trait for keeping records and
//!   discovery history across restarts.

pub mod config;
pub mod error;
pub mod handle;
pub mod model;
pub mod monitor;
pub mod registry;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::RegistryConfig;
pub use error::{CoreError, ErrorKind};
pub use handle::DeviceHandle;
pub use model::{
    Brightness, ColorTemp, DeviceCounts, DeviceKind, DeviceRecord, Hue, Saturation,
    parse_address, parse_device_address,
};
pub use monitor::Monitor;
pub use registry::{DeviceRegistry, ProbeOutcome};
pub use store::{DiscoveryAttempt, MemoryStore, PersistentStore, StoreError};

pub use kasa_proto::TransportConfig;
