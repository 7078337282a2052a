//! Backing location interface and the bundled backends

mod disk;
mod memory;

pub use disk::DiskLocation;
pub use memory::MemoryLocation;

use cairn_codec::RawStream;
use cairn_core::{FileAccess, FileMode, Result};

/// A place where a pool keeps item data and its metadata index
///
/// Paths are relative, `/` separated and never contain `..`. Implementations
/// must be usable from several threads at once.
pub trait Location: Send + Sync {
    /// Name used in logs and configuration
    fn name(&self) -> &str;

    /// Point the backend at its storage, creating it when needed
    fn set_connection(&mut self, connection: &str) -> Result<()>;

    /// Open a file, returning `None` when it does not exist and `mode` does
    /// not create it
    fn open_file(
        &self,
        path: &str,
        mode: FileMode,
        access: FileAccess,
    ) -> Result<Option<Box<dyn RawStream>>>;

    /// Delete a file; deleting an absent file succeeds
    fn delete_file(&self, path: &str) -> Result<()>;

    /// Probe whether the backend can currently be reached
    fn is_available(&self) -> bool;
}

impl std::fmt::Debug for dyn Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Location").field("name", &self.name()).finish()
    }
}
