//! Error conversion utilities
//!
//! Stream codecs speak `std::io::Error`; these conversions carry a cairn
//! `Error` through an `io::Error` and recover it on the other side.

use super::types::{Error, SerializationOp};
use std::io;

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        let wraps_cairn = error.get_ref().is_some_and(|inner| inner.is::<Error>());
        if !wraps_cairn {
            return Error::io("", "stream access", error);
        }
        let kind = error.kind();
        match error.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(wrapped)) => *wrapped,
            _ => Error::io("", "stream access", io::Error::from(kind)),
        }
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        let kind = match &error {
            Error::Io { source, .. } => source.kind(),
            Error::Integrity { .. } | Error::Serialization { .. } => io::ErrorKind::InvalidData,
            Error::UnsupportedOperation { .. } => io::ErrorKind::Unsupported,
            Error::NotFound { .. } => io::ErrorKind::NotFound,
            Error::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
            Error::LocationUnavailable { .. } => io::ErrorKind::NotConnected,
            Error::Cryptographic { .. } | Error::Configuration { .. } => io::ErrorKind::Other,
        };
        io::Error::new(kind, error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        let operation = if error.is_io() {
            SerializationOp::Serialize
        } else {
            SerializationOp::Deserialize
        };
        Error::serialization("", operation, error)
    }
}
