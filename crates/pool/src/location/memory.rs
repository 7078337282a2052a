//! In-process location

use cairn_codec::{RawStream, SharedBuffer};
use cairn_core::{Error, FileAccess, FileMode, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::Location;

#[derive(Debug)]
struct MemoryState {
    files: Mutex<BTreeMap<String, SharedBuffer>>,
    available: AtomicBool,
}

/// Keeps files in shared in-memory buffers
///
/// Clones share the same files and availability flag, so a test can keep a
/// handle after moving the location into a pool.
#[derive(Debug, Clone)]
pub struct MemoryLocation {
    name: String,
    connection: String,
    state: Arc<MemoryState>,
}

impl MemoryLocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection: String::new(),
            state: Arc::new(MemoryState {
                files: Mutex::new(BTreeMap::new()),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate the backend going offline or coming back
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// Paths of all stored files, sorted
    pub fn paths(&self) -> Vec<String> {
        self.state.files.lock().keys().cloned().collect()
    }

    /// Copy of a file's raw bytes
    pub fn read_raw(&self, path: &str) -> Option<Vec<u8>> {
        self.state.files.lock().get(path).map(SharedBuffer::snapshot)
    }

    /// Replace a file's raw bytes, creating it when absent
    pub fn write_raw(&self, path: &str, bytes: Vec<u8>) {
        self.state
            .files
            .lock()
            .insert(path.to_string(), SharedBuffer::from_bytes(bytes));
    }

    /// Mutate a file's raw bytes in place
    pub fn modify_raw<R>(&self, path: &str, f: impl FnOnce(&mut Vec<u8>) -> R) -> Option<R> {
        let buffer = self.state.files.lock().get(path).cloned()?;
        Some(buffer.with_bytes_mut(f))
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(Error::unavailable(&self.name))
        }
    }
}

impl Location for MemoryLocation {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_connection(&mut self, connection: &str) -> Result<()> {
        self.connection = connection.trim().to_string();
        Ok(())
    }

    fn open_file(
        &self,
        path: &str,
        mode: FileMode,
        _access: FileAccess,
    ) -> Result<Option<Box<dyn RawStream>>> {
        self.ensure_available()?;
        let mut files = self.state.files.lock();

        let buffer = match (mode, files.get(path)) {
            (FileMode::CreateNew, Some(_)) => return Err(Error::already_exists(path)),
            (FileMode::Open | FileMode::Append, Some(existing)) => existing.clone(),
            (FileMode::Create | FileMode::Truncate, Some(existing)) => {
                existing.with_bytes_mut(Vec::clear);
                existing.clone()
            }
            (FileMode::Open | FileMode::Truncate, None) => return Ok(None),
            (FileMode::Create | FileMode::CreateNew | FileMode::Append, None) => {
                let buffer = SharedBuffer::new();
                files.insert(path.to_string(), buffer.clone());
                buffer
            }
        };
        Ok(Some(Box::new(buffer)))
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        self.ensure_available()?;
        self.state.files.lock().remove(path);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.state.available.load(Ordering::SeqCst)
    }
}
