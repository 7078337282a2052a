//! Advisory lock file guarding saves to shared locations
//!
//! The lock is a plaintext `index-lock.cmg` holding `"<RFC 3339 UTC>|<lock id>"`.
//! A writer takes the lock when the file is absent or older than the stale
//! window, waits for the settle delay and then confirms its id is still the
//! one on disk. Losing that race sends it back to polling.

use cairn_config::LockConfig;
use cairn_core::{Error, FileAccess, FileMode, Result, INDEX_LOCK_FILE};
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::location::Location;

/// Parsed content of the lock file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub acquired: DateTime<Utc>,
    pub lock_id: String,
}

impl LockRecord {
    pub fn new(lock_id: impl Into<String>) -> Self {
        Self {
            acquired: Utc::now(),
            lock_id: lock_id.into(),
        }
    }

    pub fn parse(content: &str) -> Option<Self> {
        let (timestamp, lock_id) = content.trim().split_once('|')?;
        let acquired = DateTime::parse_from_rfc3339(timestamp)
            .ok()?
            .with_timezone(&Utc);
        Some(Self {
            acquired,
            lock_id: lock_id.to_string(),
        })
    }

    /// A lock from the future is never stale
    pub fn is_stale(&self, stale_after: Duration, now: DateTime<Utc>) -> bool {
        (now - self.acquired)
            .to_std()
            .is_ok_and(|age| age >= stale_after)
    }
}

impl fmt::Display for LockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.acquired.to_rfc3339(), self.lock_id)
    }
}

/// Held advisory lock, released on drop
pub struct IndexLock<'a> {
    location: &'a dyn Location,
    lock_id: String,
}

impl<'a> IndexLock<'a> {
    /// Block until this writer owns the lock file
    pub fn acquire(location: &'a dyn Location, config: &LockConfig) -> Result<Self> {
        let lock_id = Uuid::new_v4().to_string();
        let backoff = config.backoff();

        loop {
            match read_lock(location)? {
                Some(Some(record)) if !record.is_stale(config.stale_after(), Utc::now()) => {
                    debug!(
                        location = %location.name(),
                        holder = %record.lock_id,
                        "Index lock held, backing off"
                    );
                    backoff.sleep();
                    continue;
                }
                Some(Some(record)) => {
                    warn!(
                        location = %location.name(),
                        holder = %record.lock_id,
                        acquired = %record.acquired,
                        "Taking over abandoned index lock"
                    );
                }
                Some(None) => {
                    warn!(location = %location.name(), "Replacing unreadable index lock");
                }
                None => {}
            }

            write_lock(location, &LockRecord::new(&lock_id))?;
            std::thread::sleep(config.settle());

            match read_lock(location)? {
                Some(Some(record)) if record.lock_id == lock_id => {
                    debug!(location = %location.name(), lock_id = %lock_id, "Index lock acquired");
                    return Ok(Self { location, lock_id });
                }
                _ => {
                    debug!(location = %location.name(), "Lost index lock race, retrying");
                }
            }
        }
    }

    pub fn lock_id(&self) -> &str {
        &self.lock_id
    }
}

impl Drop for IndexLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.location.delete_file(INDEX_LOCK_FILE) {
            warn!(
                location = %self.location.name(),
                error = %e,
                "Failed to release index lock"
            );
        }
    }
}

/// `None` when no lock file exists, `Some(None)` when it cannot be parsed
fn read_lock(location: &dyn Location) -> Result<Option<Option<LockRecord>>> {
    let Some(mut file) = location.open_file(INDEX_LOCK_FILE, FileMode::Open, FileAccess::Read)?
    else {
        return Ok(None);
    };
    let mut content = String::new();
    match file.read_to_string(&mut content) {
        Ok(_) => Ok(Some(LockRecord::parse(&content))),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Ok(Some(None)),
        Err(e) => Err(Error::io(INDEX_LOCK_FILE, "read index lock", e)),
    }
}

fn write_lock(location: &dyn Location, record: &LockRecord) -> Result<()> {
    let mut file = location
        .open_file(INDEX_LOCK_FILE, FileMode::Create, FileAccess::Write)?
        .ok_or_else(|| Error::unavailable(location.name()))?;
    file.write_all(record.to_string().as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| Error::io(INDEX_LOCK_FILE, "write index lock", e))
}
