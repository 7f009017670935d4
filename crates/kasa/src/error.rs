//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError`, config and store failures into user-facing errors
//! with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use kasa_config::ConfigError;
use kasa_core::{CoreError, DeviceKind, StoreError};

use crate::app::AppError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Reachability ─────────────────────────────────────────────────
    #[error("Could not reach the device: {reason}")]
    #[diagnostic(
        code(kasa::connection_failed),
        help(
            "Check that the device is powered and reachable on TCP port 9999.\n\
             Devices that changed address can be found again with: kasa discover"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Device did not answer in time: {reason}")]
    #[diagnostic(
        code(kasa::timeout),
        help("Increase the bound with --connect-timeout or check the network path.")
    )]
    Timeout { reason: String },

    #[error("Device sent an unexpected reply: {reason}")]
    #[diagnostic(
        code(kasa::protocol),
        help("The address may belong to something other than a Kasa device.")
    )]
    Protocol { reason: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device '{device_id}' not found")]
    #[diagnostic(
        code(kasa::not_found),
        help("Run: kasa list to see remembered devices, or kasa discover to find new ones")
    )]
    NotFound { device_id: String },

    #[error("Device '{device_id}' is already registered at {addr}")]
    #[diagnostic(code(kasa::conflict))]
    Conflict { device_id: String, addr: String },

    #[error("'{operation}' is not supported by {device_id} ({kind})")]
    #[diagnostic(
        code(kasa::unsupported),
        help("Brightness, color and color temperature only apply to bulbs.")
    )]
    Unsupported {
        operation: String,
        device_id: String,
        kind: DeviceKind,
    },

    #[error("Device rejected the command (err_code {err_code}): {message}")]
    #[diagnostic(code(kasa::rejected))]
    Rejected { err_code: i64, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(kasa::validation))]
    Validation { field: String, reason: String },

    // ── Configuration / persistence ──────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(kasa::config),
        help("Check the config file passed with --config or the KASA_* environment.")
    )]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(code(kasa::store), help("Point --store at a writable location."))]
    Store(#[from] StoreError),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(kasa::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::Config(ConfigError::Validation { .. }) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                reason: err.to_string(),
            };
        }
        match err {
            CoreError::Connection { reason, .. } | CoreError::Transport { reason, .. } => {
                Self::ConnectionFailed { reason }
            }
            CoreError::Protocol { reason } => Self::Protocol { reason },
            CoreError::NotFound { device_id } => Self::NotFound { device_id },
            CoreError::AlreadyRegistered { device_id, addr } => Self::Conflict {
                device_id,
                addr: addr.to_string(),
            },
            CoreError::Unsupported {
                operation,
                device_id,
                kind,
            } => Self::Unsupported {
                operation: operation.into(),
                device_id,
                kind,
            },
            CoreError::Rejected { err_code, message } => Self::Rejected { err_code, message },
            CoreError::OutOfRange { field, .. } => Self::Validation {
                field: field.into(),
                reason: err.to_string(),
            },
            CoreError::InvalidAddress { .. } => Self::Validation {
                field: "address".into(),
                reason: err.to_string(),
            },
        }
    }
}

impl From<AppError> for CliError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Core(e) => e.into(),
            AppError::Store(e) => e.into(),
        }
    }
}
