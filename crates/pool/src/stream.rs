//! Caller-facing stream over one item

use cairn_core::{Error, FileAccess, Result};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::change::PendingChange;
use crate::index::{DataStream, LocationIndex};
use crate::item::Item;

/// Readable, writable and seekable view of an item's data
///
/// Changes are recorded in the owning location when the stream is finished
/// or dropped: the item's length and `last_modified` are updated and every
/// other location of the pool is queued to replicate it.
pub struct ItemStream {
    stream: Option<DataStream>,
    owner: Arc<LocationIndex>,
    peers: Vec<Arc<LocationIndex>>,
    item: Item,
    access: FileAccess,
    data_changed: bool,
    metadata_changed: bool,
    finished: bool,
}

impl ItemStream {
    pub(crate) fn new(
        stream: DataStream,
        owner: Arc<LocationIndex>,
        peers: Vec<Arc<LocationIndex>>,
        item: Item,
        access: FileAccess,
        data_changed: bool,
        metadata_changed: bool,
    ) -> Self {
        Self {
            stream: Some(stream),
            owner,
            peers,
            item,
            access,
            data_changed,
            metadata_changed,
            finished: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.item.id
    }

    /// Item metadata as of opening, or as recorded by `finish`
    pub fn item(&self) -> &Item {
        &self.item
    }

    /// Name of the location holding this copy
    pub fn location(&self) -> &str {
        self.owner.name()
    }

    /// Logical length of the data, when the backend stream is seekable
    pub fn len(&self) -> Option<u64> {
        self.stream.as_ref().and_then(DataStream::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Truncate or zero-extend the data
    pub fn set_len(&mut self, len: u64) -> Result<()> {
        self.require_write("set_len")?;
        self.data_mut()?.set_len(len)?;
        self.data_changed = true;
        Ok(())
    }

    /// Flush the data and record the change, returning the final metadata
    pub fn finish(mut self) -> Result<Item> {
        self.complete()
    }

    fn complete(&mut self) -> Result<Item> {
        if self.finished {
            return Ok(self.item.clone());
        }
        self.finished = true;

        let Some(mut stream) = self.stream.take() else {
            return Ok(self.item.clone());
        };
        stream.flush()?;
        if !self.data_changed && !self.metadata_changed {
            return Ok(self.item.clone());
        }

        if let Some(length) = stream.len() {
            self.item.length = length;
        }
        drop(stream);
        self.item.touch();
        self.owner.attach(self.item.clone());

        for peer in &self.peers {
            peer.enqueue(PendingChange::upsert(
                &self.owner,
                self.item.clone(),
                self.data_changed,
            ));
        }
        debug!(
            id = %self.item.id,
            location = %self.owner.name(),
            length = self.item.length,
            data_changed = self.data_changed,
            peers = self.peers.len(),
            "Item change recorded"
        );
        Ok(self.item.clone())
    }

    fn data_mut(&mut self) -> Result<&mut DataStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::unsupported("access item", "stream already finished"))
    }

    fn require_write(&self, operation: &'static str) -> Result<()> {
        if self.access.can_write() {
            Ok(())
        } else {
            Err(Error::unsupported(operation, "item was opened read-only"))
        }
    }
}

impl Read for ItemStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.access.can_read() {
            return Err(Error::unsupported("read", "item was opened write-only").into());
        }
        Ok(self.data_mut()?.read(buf)?)
    }
}

impl Write for ItemStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.require_write("write")?;
        let written = self.data_mut()?.write(buf)?;
        if written > 0 {
            self.data_changed = true;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.flush(),
            None => Ok(()),
        }
    }
}

impl Seek for ItemStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.data_mut()?.seek(pos)?)
    }
}

impl Drop for ItemStream {
    fn drop(&mut self) {
        if let Err(e) = self.complete() {
            warn!(id = %self.item.id, error = %e, "Failed to finish item stream");
        }
    }
}

impl std::fmt::Debug for ItemStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemStream")
            .field("id", &self.item.id)
            .field("location", &self.owner.name())
            .field("access", &self.access)
            .field("data_changed", &self.data_changed)
            .finish_non_exhaustive()
    }
}
