//! Consistency checks for pool configurations

use cairn_core::{Error, Result};
use std::collections::HashSet;

use crate::config::{LocationConfig, LocationKind, PoolConfig};

/// Validate a pool configuration
pub fn validate(config: &PoolConfig) -> Result<()> {
    let mut names = HashSet::new();
    for location in &config.locations {
        validate_location(location)?;
        if !names.insert(location.name.as_str()) {
            return Err(Error::configuration(format!(
                "location name '{}' is used more than once",
                location.name
            )));
        }
    }

    let lock = &config.lock;
    if lock.stale_after_secs == 0 {
        return Err(Error::configuration("lock.stale_after_secs must be positive"));
    }
    if lock.settle_ms >= lock.stale_after_secs.saturating_mul(1000) {
        return Err(Error::configuration(
            "lock.settle_ms must be shorter than lock.stale_after_secs",
        ));
    }
    Ok(())
}

fn validate_location(location: &LocationConfig) -> Result<()> {
    if location.name.trim().is_empty() {
        return Err(Error::configuration("location name must not be empty"));
    }
    if location.key.is_none() && location.key_env.is_none() {
        return Err(Error::configuration(format!(
            "location '{}' needs either key or key_env",
            location.name
        )));
    }
    if location.key.is_some() && location.key_env.is_some() {
        return Err(Error::configuration(format!(
            "location '{}' sets both key and key_env",
            location.name
        )));
    }
    if location.kind == LocationKind::Disk && location.connection.trim().is_empty() {
        return Err(Error::configuration(format!(
            "disk location '{}' needs a directory in connection",
            location.name
        )));
    }
    if location.sync_interval_secs == Some(0) {
        return Err(Error::configuration(format!(
            "location '{}' has a zero sync interval",
            location.name
        )));
    }
    if let Some(repair) = &location.repair {
        repair.validate()?;
    }
    Ok(())
}
