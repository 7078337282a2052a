//! Convenience constructors for cairn errors

use super::types::{Error, RecoveryHint, SerializationOp};
use std::time::Duration;

impl Error {
    /// Create an I/O error with path and operation context
    #[must_use]
    pub fn io(path: impl Into<String>, operation: &'static str, source: std::io::Error) -> Self {
        let path = path.into();
        let recovery_hint = match source.kind() {
            std::io::ErrorKind::PermissionDenied => RecoveryHint::CheckPermissions {
                path: path.clone(),
            },
            std::io::ErrorKind::Interrupted => RecoveryHint::Retry {
                after: Duration::from_millis(100),
            },
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                RecoveryHint::RetryWithBackoff {
                    initial_delay_ms: 100,
                    max_retries: 5,
                    backoff_multiplier: 2.0,
                }
            }
            _ => RecoveryHint::NoRecovery,
        };
        Error::Io {
            path,
            operation,
            source,
            recovery_hint,
        }
    }

    /// Attach a path and operation to an I/O error that arrived without one
    ///
    /// Errors that already name a path, and every other variant, are returned
    /// unchanged.
    #[must_use]
    pub fn in_context(self, path: impl Into<String>, operation: &'static str) -> Self {
        match self {
            Error::Io {
                path: existing,
                source,
                ..
            } if existing.is_empty() => Error::io(path, operation, source),
            other => other,
        }
    }

    /// Create a serialization error for the named document
    #[must_use]
    pub fn serialization(
        subject: impl Into<String>,
        operation: SerializationOp,
        source: serde_json::Error,
    ) -> Self {
        Error::Serialization {
            subject: subject.into(),
            operation,
            source,
            recovery_hint: RecoveryHint::Manual {
                instructions: "Restore the document from another location".to_string(),
            },
        }
    }

    /// Create an integrity error for a block
    #[must_use]
    pub fn integrity(block: u64, reason: impl Into<String>) -> Self {
        Error::Integrity {
            block,
            reason: reason.into(),
            recovery_hint: RecoveryHint::VerifyIntegrity,
        }
    }

    /// Create an unsupported operation error
    #[must_use]
    pub fn unsupported(operation: &'static str, reason: impl Into<String>) -> Self {
        Error::UnsupportedOperation {
            operation,
            reason: reason.into(),
            recovery_hint: RecoveryHint::NoRecovery,
        }
    }

    /// Create a location unavailable error
    #[must_use]
    pub fn unavailable(location: impl Into<String>) -> Self {
        Error::LocationUnavailable {
            location: location.into(),
            recovery_hint: RecoveryHint::Retry {
                after: Duration::from_secs(crate::constants::AVAILABILITY_TTL_SECS),
            },
        }
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            id: id.into(),
            recovery_hint: RecoveryHint::Ignore,
        }
    }

    /// Create an already exists error
    #[must_use]
    pub fn already_exists(id: impl Into<String>) -> Self {
        Error::AlreadyExists {
            id: id.into(),
            recovery_hint: RecoveryHint::Ignore,
        }
    }

    /// Create a cryptographic error
    #[must_use]
    pub fn cryptographic(operation: &'static str, details: impl Into<String>) -> Self {
        Error::Cryptographic {
            operation,
            details: details.into(),
            recovery_hint: RecoveryHint::NoRecovery,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            recovery_hint: RecoveryHint::UpdateConfiguration,
        }
    }
}
