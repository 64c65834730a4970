// ── Core error types ──
//
// Errors surfaced to callers of the controller and the store. Selection
// and scheduling never produce these for recoverable inconsistencies;
// those are logged and dropped where they are found.

use thiserror::Error;

use crate::model::{ConfigKey, NetworkId, Uid};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Caller input ─────────────────────────────────────────────────
    #[error("Network not found: {id}")]
    NetworkNotFound { id: NetworkId },

    #[error("No saved network with key {key}")]
    UnknownConfigKey { key: ConfigKey },

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("uid {uid} is not allowed to {operation}")]
    PermissionDenied { uid: Uid, operation: String },

    // ── Selection ────────────────────────────────────────────────────
    #[error("No visible candidate network")]
    NoCandidate,

    // ── Persistence ──────────────────────────────────────────────────
    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    // ── Worker lifecycle ─────────────────────────────────────────────
    #[error("Selection worker is not running")]
    WorkerStopped,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence {
            message: format!("malformed state document: {err}"),
        }
    }
}
