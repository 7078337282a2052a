//! Replicated, encrypted storage pool
//!
//! A [`StoragePool`] spreads tagged items over several [`Location`]s. Each
//! location keeps its own [`LocationIndex`]: item metadata persisted as an
//! encrypted `index.cmg`, a folded trie over ids and tags, and a queue of
//! changes made elsewhere in the pool. Writes land on the preferred
//! available location and are replicated to the others by their background
//! sync tasks.
//!
//! ```no_run
//! use cairn_core::{FileAccess, FileMode, KeyMaterial};
//! use cairn_pool::{DiskLocation, LocationOptions, StoragePool};
//! use std::io::Write;
//!
//! # fn main() -> cairn_core::Result<()> {
//! let pool = StoragePool::new();
//! pool.add_location(
//!     Box::new(DiskLocation::open("primary", "/srv/cairn")?),
//!     KeyMaterial::from("secret"),
//!     LocationOptions::new().priority(1),
//! )?;
//!
//! let mut stream = pool.open("report.pdf", FileMode::Create, FileAccess::Write, None)?;
//! stream.write_all(b"...")?;
//! stream.finish()?;
//! pool.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod change;
pub mod document;
pub mod index;
pub mod item;
pub mod location;
pub mod lock;
pub mod options;
pub mod paths;
pub mod pool;
pub mod stream;
pub mod sync;

pub use change::{ChangeKind, PendingChange};
pub use document::{MetadataDocument, DOCUMENT_VERSION};
pub use index::{DataStream, LocationIndex};
pub use item::Item;
pub use location::{DiskLocation, Location, MemoryLocation};
pub use lock::{IndexLock, LockRecord};
pub use options::{LocationOptions, PoolSettings};
pub use pool::StoragePool;
pub use stream::ItemStream;
pub use sync::{reconcile, SyncReport};
