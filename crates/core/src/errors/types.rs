//! Core error type definitions

use std::time::Duration;

/// Result type alias for cairn operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cairn operations using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Backend or local file system I/O failures
    Io {
        path: String,
        operation: &'static str,
        #[source]
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },

    /// Metadata document (de)serialization failures
    Serialization {
        subject: String,
        operation: SerializationOp,
        #[source]
        source: serde_json::Error,
        recovery_hint: RecoveryHint,
    },

    /// Checksum mismatch beyond repair capacity or a malformed block
    Integrity {
        block: u64,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Usage errors such as seeking backwards on a forward-only stream
    UnsupportedOperation {
        operation: &'static str,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// A backing location could not be reached
    LocationUnavailable {
        location: String,
        recovery_hint: RecoveryHint,
    },

    /// No location holds the requested item
    NotFound {
        id: String,
        recovery_hint: RecoveryHint,
    },

    /// The item already exists and the open mode forbids replacing it
    AlreadyExists {
        id: String,
        recovery_hint: RecoveryHint,
    },

    /// Cipher setup or block encryption failures
    Cryptographic {
        operation: &'static str,
        details: String,
        recovery_hint: RecoveryHint,
    },

    /// Invalid pool or location configuration
    Configuration {
        message: String,
        recovery_hint: RecoveryHint,
    },
}

/// Recovery hints for error handling
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryHint {
    /// Retry the operation
    Retry { after: Duration },

    /// Retry the operation after a growing delay
    RetryWithBackoff {
        initial_delay_ms: u64,
        max_retries: u32,
        backoff_multiplier: f64,
    },

    /// Run an integrity sweep over the affected data
    VerifyIntegrity,

    /// Check backend permissions
    CheckPermissions { path: String },

    /// Fix the configuration and try again
    UpdateConfiguration,

    /// Operation can be safely ignored
    Ignore,

    /// No automated recovery possible
    Manual { instructions: String },

    /// No recovery possible
    NoRecovery,
}

/// Serialization operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationOp {
    Serialize,
    Deserialize,
}
