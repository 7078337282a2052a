//! Configuration for cairn storage pools
//!
//! A pool is described by a JSON document listing its locations together
//! with the shared-lock timings and the availability cache lifetime:
//!
//! ```json
//! {
//!   "locations": [
//!     { "name": "primary", "kind": "disk", "connection": "/srv/cairn",
//!       "key_env": "CAIRN_PRIMARY_KEY", "priority": 1 },
//!     { "name": "backup", "kind": "disk", "connection": "/mnt/backup/cairn",
//!       "key_env": "CAIRN_BACKUP_KEY", "priority": 2,
//!       "sync_interval_secs": 60, "shared": true,
//!       "repair": { "data_shards": 6, "parity_shards": 2 } }
//!   ]
//! }
//! ```
//!
//! [`PoolConfigLoader`] resolves the document from an explicit path, the
//! `CAIRN_CONFIG` environment variable or the user config directory.

pub mod config;
pub mod loader;
pub mod validation;

#[cfg(test)]
mod config_tests;

pub use config::{LocationConfig, LocationKind, LockConfig, PoolConfig, PoolConfigBuilder};
pub use loader::{default_config_path, load_file, ConfigSource, PoolConfigLoader};
