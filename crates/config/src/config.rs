//! Pool configuration model

use cairn_core::{
    Error, KeyMaterial, RepairConfig, Result, AVAILABILITY_TTL_SECS, LOCK_BACKOFF_SECS,
    LOCK_SETTLE_SECS, LOCK_STALE_AFTER_SECS,
};
use cairn_utils::Backoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::loader::ConfigSource;

/// Prefix marking an inline key as hex encoded
const HEX_KEY_PREFIX: &str = "hex:";

/// Backend implementation of a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// Directory on a local or mounted filesystem
    Disk,
    /// In-process buffers, lost when the process exits
    Memory,
}

/// One backing location of a pool
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationConfig {
    pub name: String,
    pub kind: LocationKind,
    /// Backend connection string, a directory for disk locations
    #[serde(default)]
    pub connection: String,
    /// Inline key, raw text or `hex:` followed by hex digits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Environment variable holding the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_env: Option<String>,
    /// Lower values are preferred for reads and new items
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval_secs: Option<u64>,
    /// Location is written by several processes and needs the index lock
    #[serde(default)]
    pub shared: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair: Option<RepairConfig>,
}

impl std::fmt::Debug for LocationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("connection", &self.connection)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("key_env", &self.key_env)
            .field("priority", &self.priority)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("shared", &self.shared)
            .field("repair", &self.repair)
            .finish()
    }
}

impl LocationConfig {
    pub fn new(name: impl Into<String>, kind: LocationKind, connection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            connection: connection.into(),
            key: None,
            key_env: None,
            priority: 0,
            sync_interval_secs: None,
            shared: false,
            repair: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_key_env(mut self, var: impl Into<String>) -> Self {
        self.key_env = Some(var.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_sync_interval(mut self, secs: u64) -> Self {
        self.sync_interval_secs = Some(secs);
        self
    }

    pub fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    pub fn with_repair(mut self, repair: RepairConfig) -> Self {
        self.repair = Some(repair);
        self
    }

    pub fn sync_interval(&self) -> Option<Duration> {
        self.sync_interval_secs.map(Duration::from_secs)
    }

    /// Resolve the location key from the inline value or the environment
    pub fn resolve_key(&self) -> Result<KeyMaterial> {
        let raw = match (&self.key, &self.key_env) {
            (Some(inline), _) => inline.clone(),
            (None, Some(var)) => std::env::var(var).map_err(|_| {
                Error::configuration(format!(
                    "location '{}' reads its key from ${var}, which is not set",
                    self.name
                ))
            })?,
            (None, None) => {
                return Err(Error::configuration(format!(
                    "location '{}' has no key or key_env",
                    self.name
                )))
            }
        };

        let key = match raw.strip_prefix(HEX_KEY_PREFIX) {
            Some(encoded) => KeyMaterial::from_hex(encoded)?,
            None => KeyMaterial::new(raw.into_bytes()),
        };
        if key.is_empty() {
            return Err(Error::configuration(format!(
                "location '{}' has an empty key",
                self.name
            )));
        }
        Ok(key)
    }
}

/// Timings of the advisory lock guarding shared index saves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    /// Age after which a lock file is treated as abandoned
    pub stale_after_secs: u64,
    /// Wait before polling a held lock again
    pub backoff_ms: u64,
    /// Upper bound of the random delay added to each backoff
    pub jitter_ms: u64,
    /// Wait between writing the lock file and confirming ownership
    pub settle_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: LOCK_STALE_AFTER_SECS,
            backoff_ms: LOCK_BACKOFF_SECS * 1000,
            jitter_ms: 1000,
            settle_ms: LOCK_SETTLE_SECS * 1000,
        }
    }
}

impl LockConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.backoff_ms),
            Duration::from_millis(self.jitter_ms),
        )
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

fn default_availability_ttl() -> u64 {
    AVAILABILITY_TTL_SECS
}

/// Complete description of a storage pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    #[serde(default)]
    pub locations: Vec<LocationConfig>,
    #[serde(default)]
    pub lock: LockConfig,
    /// How long a location availability probe stays valid
    #[serde(default = "default_availability_ttl")]
    pub availability_ttl_secs: u64,
    /// Where this configuration came from
    #[serde(skip)]
    pub source: ConfigSource,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            lock: LockConfig::default(),
            availability_ttl_secs: AVAILABILITY_TTL_SECS,
            source: ConfigSource::Default,
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    pub fn availability_ttl(&self) -> Duration {
        Duration::from_secs(self.availability_ttl_secs)
    }

    pub fn location(&self, name: &str) -> Option<&LocationConfig> {
        self.locations.iter().find(|location| location.name == name)
    }

    /// Check the configuration for contradictions
    pub fn validate(&self) -> Result<()> {
        crate::validation::validate(self)
    }
}

/// Builder for creating pool configurations
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    /// Add a location
    pub fn with_location(mut self, location: LocationConfig) -> Self {
        self.config.locations.push(location);
        self
    }

    /// Set lock timings
    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.config.lock = lock;
        self
    }

    /// Set availability cache lifetime
    pub fn with_availability_ttl(mut self, secs: u64) -> Self {
        self.config.availability_ttl_secs = secs;
        self
    }

    /// Set configuration source
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.config.source = source;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
