//! Error types and recovery hints for cairn operations

mod builders;
mod conversions;
mod display;
mod recovery;
mod types;

pub use types::{Error, RecoveryHint, Result, SerializationOp};
