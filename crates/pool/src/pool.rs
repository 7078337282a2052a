//! Storage pool orchestration

use cairn_config::{LocationKind, PoolConfig};
use cairn_core::{Error, FileAccess, FileMode, KeyMaterial, Result};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashSet};
use std::io::{Seek, SeekFrom};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::change::PendingChange;
use crate::index::LocationIndex;
use crate::item::Item;
use crate::location::{DiskLocation, Location, MemoryLocation};
use crate::options::{LocationOptions, PoolSettings};
use crate::stream::ItemStream;
use crate::sync::{reconcile, spawn_sync_task};

/// Logical store of tagged items spread over prioritized locations
///
/// Cloning is cheap; clones share locations and background tasks.
#[derive(Clone)]
pub struct StoragePool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    settings: PoolSettings,
    /// Sorted by ascending priority, ties in insertion order
    locations: RwLock<Vec<Arc<LocationIndex>>>,
    sync_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        for handle in self.sync_handles.get_mut().drain(..) {
            handle.abort();
        }
    }
}

impl Default for StoragePool {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePool {
    pub fn new() -> Self {
        Self::with_settings(PoolSettings::default())
    }

    pub fn with_settings(settings: PoolSettings) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                settings,
                locations: RwLock::new(Vec::new()),
                sync_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Build a pool and connect every configured location
    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        config.validate()?;
        let pool = Self::with_settings(PoolSettings::from(config));
        for location_config in &config.locations {
            let mut location: Box<dyn Location> = match location_config.kind {
                LocationKind::Disk => Box::new(DiskLocation::new(&location_config.name)),
                LocationKind::Memory => Box::new(MemoryLocation::new(&location_config.name)),
            };
            location.set_connection(&location_config.connection)?;
            pool.add_location(
                location,
                location_config.resolve_key()?,
                LocationOptions::from(location_config),
            )?;
        }
        Ok(pool)
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    /// Register a location, load its index and start its background sync
    ///
    /// A sync interval needs a running tokio runtime.
    pub fn add_location(
        &self,
        location: Box<dyn Location>,
        key: KeyMaterial,
        options: LocationOptions,
    ) -> Result<Arc<LocationIndex>> {
        let runtime = match options.sync_interval {
            Some(interval) if interval.is_zero() => {
                return Err(Error::configuration(format!(
                    "location '{}' has a zero sync interval",
                    location.name()
                )))
            }
            Some(_) => Some(tokio::runtime::Handle::try_current().map_err(|_| {
                Error::configuration(format!(
                    "location '{}' has a sync interval but no tokio runtime is running",
                    location.name()
                ))
            })?),
            None => None,
        };
        if self.location(location.name()).is_some() {
            return Err(Error::configuration(format!(
                "location '{}' is already part of the pool",
                location.name()
            )));
        }

        let index = Arc::new(LocationIndex::new(
            location,
            key,
            options,
            self.inner.settings.clone(),
        )?);
        if index.is_available() {
            index.load_index(false)?;
        } else {
            warn!(location = %index.name(), "Location unavailable, index load deferred");
        }

        {
            let mut locations = self.inner.locations.write();
            let position = locations
                .iter()
                .position(|existing| existing.priority() > index.priority())
                .unwrap_or(locations.len());
            locations.insert(position, Arc::clone(&index));
        }

        if let (Some(runtime), Some(interval)) = (runtime, index.sync_interval()) {
            let handle = spawn_sync_task(&runtime, Arc::clone(&index), interval);
            self.inner.sync_handles.lock().push(handle);
        }

        info!(
            location = %index.name(),
            priority = index.priority(),
            items = index.len(),
            shared = index.is_shared(),
            "Location added"
        );
        Ok(index)
    }

    /// Locations in priority order
    pub fn locations(&self) -> Vec<Arc<LocationIndex>> {
        self.inner.locations.read().clone()
    }

    pub fn location(&self, name: &str) -> Option<Arc<LocationIndex>> {
        self.inner
            .locations
            .read()
            .iter()
            .find(|location| location.name() == name)
            .cloned()
    }

    /// Open an item
    ///
    /// `Create` and `CreateNew` write to the preferred available location;
    /// the other modes use the preferred available location holding the id,
    /// and `Append` falls back to creating the item. Given `tags` replace the
    /// item's tags.
    pub fn open(
        &self,
        id: &str,
        mode: FileMode,
        access: FileAccess,
        tags: Option<BTreeSet<String>>,
    ) -> Result<ItemStream> {
        if id.is_empty() {
            return Err(Error::unsupported("open", "item id must not be empty"));
        }
        let locations = self.locations();

        match mode {
            FileMode::Create | FileMode::CreateNew => {
                if mode == FileMode::CreateNew && locations.iter().any(|l| l.contains(id)) {
                    return Err(Error::already_exists(id));
                }
                let target = first_available(&locations)?;
                self.create_at(&locations, target, id, mode, access, tags)
            }
            FileMode::Open | FileMode::Truncate | FileMode::Append => {
                let holder = locations
                    .iter()
                    .find(|l| l.contains(id) && l.is_available())
                    .cloned();
                match holder {
                    Some(holder) => self.open_at(&locations, holder, id, mode, access, tags),
                    None if mode == FileMode::Append => {
                        let target = first_available(&locations)?;
                        self.create_at(&locations, target, id, mode, access, tags)
                    }
                    None => Err(Error::not_found(id)),
                }
            }
        }
    }

    fn create_at(
        &self,
        locations: &[Arc<LocationIndex>],
        target: Arc<LocationIndex>,
        id: &str,
        mode: FileMode,
        access: FileAccess,
        tags: Option<BTreeSet<String>>,
    ) -> Result<ItemStream> {
        let mut item = match target.get(id) {
            Some(mut existing) => {
                if let Some(tags) = tags {
                    existing.tags = tags;
                }
                existing
            }
            None => Item::new(id, tags.unwrap_or_default()),
        };
        item.length = 0;

        let stream = target
            .open_data(id, FileMode::Create, access)
            .map_err(|e| {
                note_failure(&target, &e);
                e
            })?;
        target.attach(item.clone());
        debug!(id, location = %target.name(), ?mode, "Item created");

        Ok(ItemStream::new(
            stream,
            Arc::clone(&target),
            peers_of(locations, &target),
            item,
            access,
            true,
            true,
        ))
    }

    fn open_at(
        &self,
        locations: &[Arc<LocationIndex>],
        holder: Arc<LocationIndex>,
        id: &str,
        mode: FileMode,
        access: FileAccess,
        tags: Option<BTreeSet<String>>,
    ) -> Result<ItemStream> {
        let mut item = holder.get(id).ok_or_else(|| Error::not_found(id))?;
        let mut metadata_changed = false;
        if let Some(tags) = tags {
            metadata_changed = tags != item.tags;
            item.tags = tags;
        }

        let mut stream = holder
            .open_data(id, mode, access)
            .map_err(|e| {
                note_failure(&holder, &e);
                e
            })?;
        if mode == FileMode::Append {
            stream.seek(SeekFrom::End(0))?;
        }

        Ok(ItemStream::new(
            stream,
            Arc::clone(&holder),
            peers_of(locations, &holder),
            item,
            access,
            mode == FileMode::Truncate,
            metadata_changed,
        ))
    }

    /// Items matching `pattern` across available locations
    ///
    /// The pattern is matched against `Id=<id>` and every tag. When several
    /// locations hold an id, the copy from the preferred location wins.
    pub fn list(&self, pattern: &str) -> Vec<Item> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for location in self.locations() {
            if !location.is_available() {
                debug!(location = %location.name(), "Skipping unavailable location in list");
                continue;
            }
            for item in location.search(pattern) {
                if seen.insert(item.id.clone()) {
                    items.push(item);
                }
            }
        }
        items
    }

    /// Delete every reachable copy of an item
    ///
    /// Locations that were not reached are queued to delete their copy on
    /// their next sync. Returns false when no location knew the id.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let locations = self.locations();
        let deleted_at = Utc::now();
        let mut holders: Vec<(Arc<LocationIndex>, Item)> = Vec::new();

        for location in &locations {
            if !location.is_available() {
                continue;
            }
            if let Some(item) = location.detach(id) {
                if let Err(e) = location.delete_data(id) {
                    location.attach(item);
                    note_failure(location, &e);
                    return Err(e);
                }
                holders.push((Arc::clone(location), item));
            }
        }

        let Some((source, item)) = holders.first() else {
            return Ok(false);
        };
        let mut tombstone = item.clone();
        tombstone.last_modified = tombstone.last_modified.max(deleted_at);

        for location in &locations {
            if !holders.iter().any(|(holder, _)| Arc::ptr_eq(holder, location)) {
                location.enqueue(PendingChange::delete(source, tombstone.clone()));
            }
        }
        info!(id, copies = holders.len(), "Item deleted");
        Ok(true)
    }

    /// Integrity sweep over every reachable copy of an item
    ///
    /// Returns the number of blocks that had to be rebuilt.
    pub fn repair(&self, id: &str) -> Result<u64> {
        let mut found = false;
        let mut repaired = 0;
        for location in self.locations() {
            if !location.contains(id) || !location.is_available() {
                continue;
            }
            found = true;
            let mut stream = location.open_data(id, FileMode::Open, FileAccess::ReadWrite)?;
            let blocks = stream
                .repair()
                .map_err(|e| e.in_context(crate::paths::data_path(id), "repair item data"))?;
            if blocks > 0 {
                warn!(id, location = %location.name(), blocks, "Repaired damaged blocks");
            }
            repaired += blocks;
        }

        if found {
            Ok(repaired)
        } else {
            Err(Error::not_found(id))
        }
    }

    /// Run one reconciliation pass over every location now
    ///
    /// Every location is attempted; the first failure is returned.
    pub fn sync_now(&self) -> Result<()> {
        let mut first_error = None;
        for location in self.locations() {
            if let Err(e) = reconcile(&location) {
                warn!(location = %location.name(), error = %e, "Sync failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Stop background sync, apply queued changes and save every available location
    ///
    /// Changes that still cannot be applied, because the target or their
    /// source is unavailable, are dropped with a warning.
    pub fn shutdown(&self) -> Result<()> {
        for handle in self.inner.sync_handles.lock().drain(..) {
            handle.abort();
        }

        let mut first_error = None;
        for location in self.locations() {
            if location.pending_len() == 0 {
                continue;
            }
            if let Err(e) = reconcile(&location) {
                warn!(location = %location.name(), error = %e, "Final sync failed");
                first_error.get_or_insert(e);
            }
            let dropped = location.pending_len();
            if dropped > 0 {
                warn!(location = %location.name(), dropped, "Unreplicated changes dropped at shutdown");
            }
        }

        for location in self.locations() {
            if !location.is_available() {
                warn!(location = %location.name(), "Location unavailable at shutdown, index not saved");
                continue;
            }
            if let Err(e) = location.save_index(true) {
                warn!(location = %location.name(), error = %e, "Final index save failed");
                first_error.get_or_insert(e);
            }
        }
        info!("Storage pool shut down");
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for StoragePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoragePool")
            .field("locations", &*self.inner.locations.read())
            .field("sync_tasks", &self.inner.sync_handles.lock().len())
            .finish()
    }
}

fn first_available(locations: &[Arc<LocationIndex>]) -> Result<Arc<LocationIndex>> {
    locations
        .iter()
        .find(|location| location.is_available())
        .cloned()
        .ok_or_else(|| Error::unavailable("pool"))
}

fn peers_of(locations: &[Arc<LocationIndex>], owner: &Arc<LocationIndex>) -> Vec<Arc<LocationIndex>> {
    locations
        .iter()
        .filter(|location| !Arc::ptr_eq(location, owner))
        .cloned()
        .collect()
}

fn note_failure(location: &LocationIndex, error: &Error) {
    if matches!(error, Error::LocationUnavailable { .. }) {
        location.mark_unavailable();
    }
}
