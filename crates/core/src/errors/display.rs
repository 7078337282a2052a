//! Display implementations for cairn errors

use super::types::Error;
use std::fmt;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io {
                path,
                operation,
                source,
                ..
            } => {
                if path.is_empty() {
                    write!(f, "I/O error during {operation}: {source}")
                } else {
                    write!(f, "I/O error during {operation} on '{path}': {source}")
                }
            }
            Self::Serialization {
                subject,
                operation,
                source,
                ..
            } => write!(f, "Failed to {operation:?} '{subject}': {source}"),
            Self::Integrity { block, reason, .. } => {
                write!(f, "Integrity failure in block {block}: {reason}")
            }
            Self::UnsupportedOperation {
                operation, reason, ..
            } => write!(f, "Unsupported operation '{operation}': {reason}"),
            Self::LocationUnavailable { location, .. } => {
                write!(f, "Location '{location}' is unavailable")
            }
            Self::NotFound { id, .. } => write!(f, "Item '{id}' not found"),
            Self::AlreadyExists { id, .. } => write!(f, "Item '{id}' already exists"),
            Self::Cryptographic {
                operation, details, ..
            } => write!(f, "Cryptographic operation '{operation}' failed: {details}"),
            Self::Configuration { message, .. } => write!(f, "Configuration error: {message}"),
        }
    }
}
