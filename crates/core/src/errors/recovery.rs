//! Recovery utilities for cairn errors

use super::types::{Error, RecoveryHint};

impl Error {
    /// Get the recovery hint for this error
    #[must_use]
    pub const fn recovery_hint(&self) -> &RecoveryHint {
        match self {
            Self::Io { recovery_hint, .. }
            | Self::Serialization { recovery_hint, .. }
            | Self::Integrity { recovery_hint, .. }
            | Self::UnsupportedOperation { recovery_hint, .. }
            | Self::LocationUnavailable { recovery_hint, .. }
            | Self::NotFound { recovery_hint, .. }
            | Self::AlreadyExists { recovery_hint, .. }
            | Self::Cryptographic { recovery_hint, .. }
            | Self::Configuration { recovery_hint, .. } => recovery_hint,
        }
    }

    /// Check if this error is transient and can be retried
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.recovery_hint(),
            RecoveryHint::Retry { .. } | RecoveryHint::RetryWithBackoff { .. }
        )
    }

    /// Check if this error indicates data corruption
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }

    /// Check if this error is a normal negative lookup result
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_transient() {
        assert!(Error::unavailable("disk").is_transient());
        assert!(!Error::integrity(3, "bad crc").is_transient());
    }

    #[test]
    fn test_integrity_is_corruption() {
        let err = Error::integrity(7, "3 shards corrupted");
        assert!(err.is_corruption());
        assert_eq!(err.recovery_hint(), &RecoveryHint::VerifyIntegrity);
        assert_eq!(
            err.to_string(),
            "Integrity failure in block 7: 3 shards corrupted"
        );
    }

    #[test]
    fn test_not_found_is_ignorable() {
        let err = Error::not_found("f");
        assert!(err.is_not_found());
        assert_eq!(err.recovery_hint(), &RecoveryHint::Ignore);
    }

    #[test]
    fn test_timed_out_io_retries_with_backoff() {
        let err = Error::io(
            "objects/ab/x.cmg",
            "read item data",
            std::io::Error::from(std::io::ErrorKind::TimedOut),
        );
        assert!(err.is_transient());
        assert!(matches!(
            err.recovery_hint(),
            RecoveryHint::RetryWithBackoff { max_retries: 5, .. }
        ));
    }
}
