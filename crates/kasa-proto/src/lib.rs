// kasa-proto: Async client for the Kasa smart plug / bulb wire protocol

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod transport;

pub use error::Error;
pub use message::{LightState, LightStateUpdate, RelayState, Request, Response, SysInfo};
pub use transport::{Transport, TransportConfig};

/// TCP port the devices listen on unless told otherwise.
pub const DEFAULT_PORT: u16 = 9999;
