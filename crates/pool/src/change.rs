//! Changes queued for replication between locations

use std::sync::{Arc, Weak};

use crate::index::LocationIndex;
use crate::item::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The item was created or updated at the source
    Upsert { data_changed: bool },
    /// The item was deleted at the source
    Delete,
}

/// A change made at one location that the others still need to apply
#[derive(Debug, Clone)]
pub struct PendingChange {
    /// Location holding the authoritative copy
    pub source: Weak<LocationIndex>,
    /// Item state after the change; for deletes, `last_modified` is the deletion time
    pub item: Item,
    pub kind: ChangeKind,
}

impl PendingChange {
    pub fn upsert(source: &Arc<LocationIndex>, item: Item, data_changed: bool) -> Self {
        Self {
            source: Arc::downgrade(source),
            item,
            kind: ChangeKind::Upsert { data_changed },
        }
    }

    pub fn delete(source: &Arc<LocationIndex>, item: Item) -> Self {
        Self {
            source: Arc::downgrade(source),
            item,
            kind: ChangeKind::Delete,
        }
    }
}
