// ── Core error types ──
//
// User-facing errors from kasa-core. Consumers never see raw frame or
// socket failures directly: the `From<kasa_proto::Error>` impl folds them
// into reachability and protocol variants.

use std::net::SocketAddr;

use thiserror::Error;

use crate::model::DeviceKind;

/// Coarse classification of a [`CoreError`], used by the CLI for exit codes
/// and by the HTTP layer for status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Connection,
    Transport,
    Protocol,
    NotFound,
    Unsupported,
    Rejected,
    AlreadyRegistered,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    #[error("Invalid {field}: {value} (expected {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Invalid device address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    // ── Reachability errors ──────────────────────────────────────────
    #[error("Cannot connect: {reason}")]
    Connection { reason: String, timed_out: bool },

    #[error("Exchange failed: {reason}")]
    Transport { reason: String, timed_out: bool },

    #[error("Unexpected reply: {reason}")]
    Protocol { reason: String },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device rejected the command with err_code {err_code}: {message}")]
    Rejected { err_code: i64, message: String },

    #[error("{operation} is not supported by {device_id} ({kind})")]
    Unsupported {
        operation: &'static str,
        device_id: String,
        kind: DeviceKind,
    },

    // ── Registry errors ──────────────────────────────────────────────
    #[error("Device not found: {device_id}")]
    NotFound { device_id: String },

    #[error("Device {device_id} is already registered at {addr}")]
    AlreadyRegistered { device_id: String, addr: SocketAddr },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfRange { .. } | Self::InvalidAddress { .. } => ErrorKind::Validation,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
        }
    }

    /// Returns `true` if the error means the device could not be talked to.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Connection | ErrorKind::Transport | ErrorKind::Protocol
        )
    }

    /// Returns `true` if a connect or I/O bound expired.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Connection {
                timed_out: true,
                ..
            } | Self::Transport {
                timed_out: true,
                ..
            }
        )
    }

    pub(crate) fn not_found(device_id: impl Into<String>) -> Self {
        Self::NotFound {
            device_id: device_id.into(),
        }
    }
}

// ── Conversion from protocol-layer errors ────────────────────────────

impl From<kasa_proto::Error> for CoreError {
    fn from(err: kasa_proto::Error) -> Self {
        use kasa_proto::Error as P;

        let reason = err.to_string();
        match err {
            P::Connect { .. } => Self::Connection {
                reason,
                timed_out: false,
            },
            P::ConnectTimeout { .. } => Self::Connection {
                reason,
                timed_out: true,
            },
            P::Io { .. } => Self::Transport {
                reason,
                timed_out: false,
            },
            P::Timeout { .. } => Self::Transport {
                reason,
                timed_out: true,
            },
            P::FrameTooLarge { .. } | P::Protocol { .. } => Self::Protocol { reason },
            P::Device { err_code, message } => Self::Rejected { err_code, message },
        }
    }
}
