//! Per-location and pool-wide settings

use cairn_config::{LocationConfig, LockConfig, PoolConfig};
use cairn_core::{RepairConfig, AVAILABILITY_TTL_SECS};
use std::time::Duration;

/// How a location participates in the pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationOptions {
    /// Lower values are preferred for reads and new items
    pub priority: i32,
    /// Period of background reconciliation, none disables it
    pub sync_interval: Option<Duration>,
    /// Guard index saves with the advisory lock file
    pub shared: bool,
    /// Erasure coding for every stream at this location
    pub repair: Option<RepairConfig>,
}

impl LocationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    pub fn repair(mut self, repair: RepairConfig) -> Self {
        self.repair = Some(repair);
        self
    }
}

impl From<&LocationConfig> for LocationOptions {
    fn from(config: &LocationConfig) -> Self {
        Self {
            priority: config.priority,
            sync_interval: config.sync_interval(),
            shared: config.shared,
            repair: config.repair,
        }
    }
}

/// Settings shared by every location of a pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub lock: LockConfig,
    /// How long an availability probe result is reused
    pub availability_ttl: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            availability_ttl: Duration::from_secs(AVAILABILITY_TTL_SECS),
        }
    }
}

impl From<&PoolConfig> for PoolSettings {
    fn from(config: &PoolConfig) -> Self {
        Self {
            lock: config.lock,
            availability_ttl: config.availability_ttl(),
        }
    }
}
