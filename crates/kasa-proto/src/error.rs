use std::net::SocketAddr;

use thiserror::Error;

/// Top-level error type for the `kasa-proto` crate.
///
/// Covers every failure mode of a single exchange with a device:
/// establishing the connection, moving frames, and interpreting the reply.
/// `kasa-core` maps these into its own error kinds.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// TCP connect was refused or failed outright.
    #[error("Cannot connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// TCP connect did not complete within the configured bound.
    #[error("Connection to {addr} timed out after {timeout_ms}ms")]
    ConnectTimeout { addr: SocketAddr, timeout_ms: u64 },

    // ── Transport ───────────────────────────────────────────────────
    /// Short read/write, EOF, or peer reset during an established exchange.
    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A read or write did not complete within the configured bound.
    #[error("Timed out while {operation} after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    // ── Protocol ────────────────────────────────────────────────────
    /// A frame length outside what we are willing to buffer.
    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: u64, max: usize },

    /// Response bytes did not decode to the expected command tree.
    #[error("Malformed response: {message}")]
    Protocol { message: String, body: String },

    /// The device answered, but with a non-zero `err_code`.
    #[error("Device returned err_code {err_code}: {message}")]
    Device { err_code: i64, message: String },
}

impl Error {
    /// Returns `true` if the connection could not be established.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectTimeout { .. })
    }

    /// Returns `true` if an established exchange broke mid-flight.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if the reply could not be interpreted.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::FrameTooLarge { .. } | Self::Protocol { .. })
    }

    /// Returns `true` if the failure says nothing about reachability:
    /// the device spoke the protocol and declined the request.
    pub fn is_device_rejection(&self) -> bool {
        matches!(self, Self::Device { .. })
    }

    pub(crate) fn protocol(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            body: body.into(),
        }
    }
}
