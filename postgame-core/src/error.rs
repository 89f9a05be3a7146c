//! Error types with clear, actionable messages
//!
//! Two enums cover the failure taxonomy:
//! - [`AutomationError`] for configuration, catalog and host wiring problems
//! - [`AcquisitionError`] for the community map search/download pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the automation core (settings, catalog, hooks)
#[derive(Error, Debug)]
pub enum AutomationError {
    /// A setting or data file is absent; callers degrade to defaults
    #[error("Configuration missing: {what}")]
    ConfigurationMissing { what: String },

    /// A second handler was registered for an event that already has one
    #[error("Event '{event}' already has a registered handler.\n\nCombine every concern that needs this event into a single handler.")]
    DuplicateHook { event: String },

    /// A scenario code with this value already exists in the catalog
    #[error("Scenario with code {code} already exists")]
    DuplicateScenario { code: String },

    /// No scenario with this code exists in the catalog
    #[error("Scenario not found: {code}")]
    UnknownScenario { code: String },

    /// A scenario code is not four groups of four hex digits
    #[error("Invalid scenario code '{code}' (expected XXXX-XXXX-XXXX-XXXX)")]
    InvalidCode { code: String },

    /// A snapshot could not be written; in-memory state is retained
    #[error("Failed to persist {what} to {path}")]
    Persistence {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize a snapshot
    #[error("Failed to serialize {what}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the acquisition pipeline
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// Remote search or download failed
    #[error("Network request failed: {message}")]
    Network { message: String },

    /// Every download slot is occupied
    #[error("Download queue is full ({limit} downloads already in flight)")]
    QueueFull { limit: usize },

    /// The requested entry or release is not known
    #[error("Unknown map or release: {0}")]
    NotFound(String),

    /// A path escaped the managed root
    #[error("Integrity violation: {path} resolves outside {root}")]
    PathEscape { path: PathBuf, root: PathBuf },

    /// The archive is corrupt, unsupported or has no map payload
    #[error("Malformed archive: {message}")]
    MalformedArchive { message: String },

    /// Release digest did not match the downloaded bytes
    #[error("Digest verification failed!\nExpected: {expected}\nActual: {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// A filesystem I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AcquisitionError {
    /// Integrity violations abort the whole operation and are never downgraded
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            AcquisitionError::PathEscape { .. }
                | AcquisitionError::MalformedArchive { .. }
                | AcquisitionError::DigestMismatch { .. }
        )
    }

    /// Log security-relevant failures on the dedicated target
    pub fn log_if_security_critical(&self) {
        if self.is_integrity_violation() {
            tracing::error!(target: "security", "INTEGRITY VIOLATION: {}", self);
        }
    }
}

impl From<reqwest::Error> for AcquisitionError {
    fn from(err: reqwest::Error) -> Self {
        AcquisitionError::Network {
            message: err.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for AcquisitionError {
    fn from(err: zip::result::ZipError) -> Self {
        AcquisitionError::MalformedArchive {
            message: err.to_string(),
        }
    }
}
