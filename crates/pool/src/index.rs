//! Metadata index of one location
//!
//! A [`LocationIndex`] owns the location's [`MetadataDocument`], a trie over
//! item ids and tags, and the queue of changes other locations made that
//! still need to be applied here. Persisting goes through the block codec;
//! shared locations serialize saves with the advisory [`IndexLock`].

use cairn_codec::{BlockCipherStream, RawStream};
use cairn_core::{
    Error, FileAccess, FileMode, KeyMaterial, RepairConfig, Result, INDEX_FILE,
};
use cairn_index::FoldedTrieIndex;
use chrono::{DateTime, Utc};
use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::change::PendingChange;
use crate::document::MetadataDocument;
use crate::item::Item;
use crate::location::Location;
use crate::lock::IndexLock;
use crate::options::{LocationOptions, PoolSettings};
use crate::paths::data_path;

/// Encrypted stream over one item's data file
pub type DataStream = BlockCipherStream<Box<dyn RawStream>>;

struct IndexState {
    document: MetadataDocument,
    /// Trie keys map to item ids
    trie: FoldedTrieIndex<String>,
    /// Bumped on every mutation of `document`
    generation: u64,
    /// Generation last written to the backend
    saved_generation: u64,
}

impl IndexState {
    fn new() -> Self {
        Self {
            document: MetadataDocument::default(),
            trie: FoldedTrieIndex::new(),
            generation: 0,
            saved_generation: 0,
        }
    }

    fn is_dirty(&self) -> bool {
        self.generation != self.saved_generation
    }

    fn attach(&mut self, item: Item) {
        if let Some(previous) = self.document.items.remove(&item.id) {
            self.unindex(&previous);
        }
        for key in item.trie_keys() {
            self.trie.insert(&key, item.id.clone());
        }
        self.document.items.insert(item.id.clone(), item);
        self.generation += 1;
    }

    fn detach(&mut self, id: &str) -> Option<Item> {
        let item = self.document.items.remove(id)?;
        self.unindex(&item);
        self.generation += 1;
        Some(item)
    }

    fn unindex(&mut self, item: &Item) {
        for key in item.trie_keys() {
            self.trie.remove(&key, &item.id);
        }
    }
}

/// Metadata, search index and replication queue of one location
pub struct LocationIndex {
    location: Box<dyn Location>,
    key: KeyMaterial,
    options: LocationOptions,
    settings: PoolSettings,
    state: Mutex<IndexState>,
    /// Serializes whole save cycles
    save_lock: Mutex<()>,
    pending: SegQueue<PendingChange>,
    availability: Mutex<Option<(Instant, bool)>>,
}

impl LocationIndex {
    pub fn new(
        location: Box<dyn Location>,
        key: KeyMaterial,
        options: LocationOptions,
        settings: PoolSettings,
    ) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::configuration(format!(
                "location '{}' needs a non-empty key",
                location.name()
            )));
        }
        if let Some(repair) = &options.repair {
            repair.validate()?;
        }
        Ok(Self {
            location,
            key,
            options,
            settings,
            state: Mutex::new(IndexState::new()),
            save_lock: Mutex::new(()),
            pending: SegQueue::new(),
            availability: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        self.location.name()
    }

    pub fn location(&self) -> &dyn Location {
        self.location.as_ref()
    }

    pub fn priority(&self) -> i32 {
        self.options.priority
    }

    pub fn sync_interval(&self) -> Option<Duration> {
        self.options.sync_interval
    }

    pub fn is_shared(&self) -> bool {
        self.options.shared
    }

    pub fn repair_config(&self) -> Option<RepairConfig> {
        self.options.repair
    }

    /// Availability, probing the backend at most once per TTL
    pub fn is_available(&self) -> bool {
        let mut cached = self.availability.lock();
        if let Some((probed, available)) = *cached {
            if probed.elapsed() < self.settings.availability_ttl {
                return available;
            }
        }

        let available = self.location.is_available();
        if !available {
            warn!(location = %self.name(), "Location unavailable");
        }
        *cached = Some((Instant::now(), available));
        available
    }

    /// Drop the cached probe result and probe again
    pub fn refresh_availability(&self) -> bool {
        *self.availability.lock() = None;
        self.is_available()
    }

    /// Record that an operation found the backend unreachable
    pub fn mark_unavailable(&self) {
        *self.availability.lock() = Some((Instant::now(), false));
    }

    // Metadata queries

    pub fn get(&self, id: &str) -> Option<Item> {
        self.state.lock().document.items.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().document.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().document.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every item
    pub fn items(&self) -> Vec<Item> {
        self.state.lock().document.items.values().cloned().collect()
    }

    /// Items whose id key (`Id=<id>`) or any tag matches `pattern`
    pub fn search(&self, pattern: &str) -> Vec<Item> {
        let state = self.state.lock();
        state
            .trie
            .search(pattern)
            .iter()
            .filter_map(|id| state.document.items.get(id).cloned())
            .collect()
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.state.lock().document.last_modified
    }

    /// Whether in-memory metadata differs from the last save
    pub fn is_dirty(&self) -> bool {
        self.state.lock().is_dirty()
    }

    pub fn snapshot(&self) -> MetadataDocument {
        self.state.lock().document.clone()
    }

    // Metadata mutation

    /// Add or replace an item, indexing its id and tags
    pub fn attach(&self, item: Item) {
        self.state.lock().attach(item);
    }

    /// Remove an item and its trie entries
    pub fn detach(&self, id: &str) -> Option<Item> {
        self.state.lock().detach(id)
    }

    // Replication queue

    pub fn enqueue(&self, change: PendingChange) {
        self.pending.push(change);
    }

    /// Take every queued change in arrival order
    pub fn drain_pending(&self) -> Vec<PendingChange> {
        std::iter::from_fn(|| self.pending.pop()).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    // Persistence

    /// Load the backend document, merging it into memory
    ///
    /// A missing document is created from the in-memory state unless
    /// `load_only` is set.
    pub fn load_index(&self, load_only: bool) -> Result<()> {
        match self.read_document()? {
            Some(disk) => {
                let adopted = self.merge_document(disk);
                if adopted > 0 {
                    debug!(location = %self.name(), adopted, "Merged index from backend");
                }
            }
            None if !load_only => {
                info!(location = %self.name(), "Creating index");
                self.save_index(true)?;
            }
            None => {}
        }
        Ok(())
    }

    /// Merge a document with last-writer-wins per item
    ///
    /// Nothing happens when both documents carry the same `last_modified`.
    /// Otherwise every backend item that is absent here or newer than the
    /// in-memory copy is adopted; in-memory items that are newer or missing
    /// from the backend are kept and written on the next save. Returns the
    /// number of adopted items.
    pub fn merge_document(&self, disk: MetadataDocument) -> usize {
        let mut state = self.state.lock();
        if disk.last_modified == state.document.last_modified {
            return 0;
        }

        let mut adopted = 0;
        for (id, disk_item) in &disk.items {
            let adopt = state
                .document
                .items
                .get(id)
                .map_or(true, |current| disk_item.is_newer_than(current));
            if adopt {
                state.attach(disk_item.clone());
                adopted += 1;
            }
        }

        state.document.last_modified = state.document.last_modified.max(disk.last_modified);
        if state.document.items == disk.items {
            state.saved_generation = state.generation;
        }
        adopted
    }

    /// Write the document to the backend
    ///
    /// Skipped when nothing changed since the last save unless `forced`.
    /// Returns whether a write happened.
    pub fn save_index(&self, forced: bool) -> Result<bool> {
        let _cycle = self.save_lock.lock();
        if !forced && !self.state.lock().is_dirty() {
            return Ok(false);
        }

        if self.options.shared {
            let _lock = IndexLock::acquire(self.location.as_ref(), &self.settings.lock)?;
            self.load_index(true)?;
            self.write_document()?;
        } else {
            self.write_document()?;
        }
        Ok(true)
    }

    fn read_document(&self) -> Result<Option<MetadataDocument>> {
        let Some(raw) =
            self.location
                .open_file(INDEX_FILE, FileMode::Open, FileAccess::ReadWrite)?
        else {
            return Ok(None);
        };

        let mut stream = BlockCipherStream::open(raw, &self.key, self.options.repair)
            .map_err(|e| e.in_context(INDEX_FILE, "open index"))?;
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .map_err(|e| Error::from(e).in_context(INDEX_FILE, "read index"))?;
        MetadataDocument::decode(&bytes[..]).map(Some)
    }

    fn write_document(&self) -> Result<()> {
        let (bytes, generation) = {
            let mut state = self.state.lock();
            state.document.last_modified = state.document.last_modified.max(Utc::now());
            let mut bytes = Vec::new();
            state.document.encode(&mut bytes)?;
            (bytes, state.generation)
        };

        let raw = self
            .location
            .open_file(INDEX_FILE, FileMode::Create, FileAccess::ReadWrite)?
            .ok_or_else(|| Error::unavailable(self.name()))?;
        let mut stream = BlockCipherStream::create(raw, &self.key, self.options.repair)?;
        stream
            .write_all(&bytes)
            .and_then(|()| stream.flush())
            .map_err(|e| Error::from(e).in_context(INDEX_FILE, "write index"))?;
        drop(stream);

        let mut state = self.state.lock();
        state.saved_generation = state.saved_generation.max(generation);
        debug!(
            location = %self.name(),
            items = state.document.items.len(),
            bytes = bytes.len(),
            "Index saved"
        );
        Ok(())
    }

    // Item data

    /// Open the encrypted data stream of an item
    ///
    /// Truncating and creating modes start an empty stream; the others
    /// continue an existing one.
    pub fn open_data(&self, id: &str, mode: FileMode, access: FileAccess) -> Result<DataStream> {
        let path = data_path(id);
        let raw = self
            .location
            .open_file(&path, mode, access)?
            .ok_or_else(|| Error::not_found(id))?;

        match mode {
            FileMode::Create | FileMode::CreateNew | FileMode::Truncate => {
                BlockCipherStream::create(raw, &self.key, self.options.repair)
            }
            FileMode::Open | FileMode::Append => {
                BlockCipherStream::open(raw, &self.key, self.options.repair)
                    .map_err(|e| e.in_context(path, "open item data"))
            }
        }
    }

    pub fn delete_data(&self, id: &str) -> Result<()> {
        self.location.delete_file(&data_path(id))
    }

    /// Copy an item's data from another location into this one
    pub fn import_data(&self, source: &LocationIndex, item: &Item) -> Result<u64> {
        let mut reader = source.open_data(&item.id, FileMode::Open, FileAccess::Read)?;
        let mut writer = self.open_data(&item.id, FileMode::Create, FileAccess::ReadWrite)?;
        let copied = io::copy(&mut reader, &mut writer)
            .and_then(|copied| writer.flush().map(|()| copied))
            .map_err(|e| Error::from(e).in_context(data_path(&item.id), "replicate item data"))?;

        if copied != item.length {
            warn!(
                id = %item.id,
                source = %source.name(),
                target = %self.name(),
                copied,
                expected = item.length,
                "Replicated length differs from metadata"
            );
        }
        Ok(copied)
    }
}

impl fmt::Debug for LocationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationIndex")
            .field("name", &self.name())
            .field("priority", &self.options.priority)
            .field("shared", &self.options.shared)
            .field("sync_interval", &self.options.sync_interval)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
