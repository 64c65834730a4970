//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use roamer_config::ConfigError;
use roamer_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const NO_CANDIDATE: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(roamer::not_found),
        help("Run: roamer {list_command} to see saved {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("uid {uid} is not allowed to {operation}")]
    #[diagnostic(
        code(roamer::permission_denied),
        help(
            "Only the uid that saved a network, or the system uid, may change it.\n\
             Retry with --uid set to the creator's uid."
        )
    )]
    PermissionDenied { uid: u32, operation: String },

    // ── Selection ────────────────────────────────────────────────────

    #[error("No visible candidate network")]
    #[diagnostic(
        code(roamer::no_candidate),
        help(
            "No scan result matched an enabled saved network above the signal floor.\n\
             Check the saved networks with: roamer networks list"
        )
    )]
    NoCandidate,

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(roamer::validation))]
    Validation { field: String, reason: String },

    // ── Storage & configuration ──────────────────────────────────────

    #[error("Could not read or write the network store: {message}")]
    #[diagnostic(
        code(roamer::store),
        help("Point --store at a writable file, or fix the file at {path}.")
    )]
    Store { message: String, path: String },

    #[error(transparent)]
    #[diagnostic(
        code(roamer::config),
        help("Inspect the effective configuration with: roamer config show")
    )]
    Config(#[from] ConfigError),

    #[error("Selection engine failed: {message}")]
    #[diagnostic(code(roamer::engine))]
    Engine { message: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(roamer::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    #[error("Cancelled")]
    #[diagnostic(code(roamer::cancelled))]
    Cancelled,

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(roamer::render))]
    Render(String),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(roamer::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::PermissionDenied { .. } => exit_code::PERMISSION,
            Self::NoCandidate => exit_code::NO_CANDIDATE,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::Config(ConfigError::Validation { .. }) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the state file path to a persistence failure.
    pub fn with_store_path(self, path: &std::path::Path) -> Self {
        match self {
            Self::Store { message, .. } => Self::Store {
                message,
                path: path.display().to_string(),
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NetworkNotFound { id } => CliError::NotFound {
                resource_type: "network".into(),
                identifier: id.to_string(),
                list_command: "networks list".into(),
            },

            CoreError::UnknownConfigKey { key } => CliError::NotFound {
                resource_type: "network".into(),
                identifier: key.to_string(),
                list_command: "networks list".into(),
            },

            CoreError::PermissionDenied { uid, operation } => {
                CliError::PermissionDenied { uid, operation }
            }

            CoreError::NoCandidate => CliError::NoCandidate,

            CoreError::InvalidInput { field, reason } => CliError::Validation { field, reason },

            CoreError::Persistence { message } => CliError::Store {
                message,
                path: "(unknown)".into(),
            },

            CoreError::WorkerStopped => CliError::Engine {
                message: "the selection worker is not running".into(),
            },

            CoreError::Internal(message) => CliError::Engine { message },
        }
    }
}
