//! Shared utilities for the cairn workspace
//!
//! Logging setup and the randomized backoff used by the shared index lock.

pub mod backoff;
pub mod tracing;

pub use backoff::Backoff;
