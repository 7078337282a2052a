//! Core domain types, errors, and constants shared by every cairn crate.
//!
//! ## Key Components
//!
//! - **`errors`**: the workspace-wide `Error` enum, its `Result` alias and the
//!   `RecoveryHint` attached to every failure.
//! - **`types`**: backend-neutral open modes, repair settings and key material.
//! - **`constants`**: reserved backend paths and block geometry.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, RecoveryHint, Result, SerializationOp},
    types::*,
};
