//! Item metadata

use cairn_core::ID_KEY_PREFIX;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Metadata of one stored item
///
/// Each location keeps its own copy with its own timestamps; copies are
/// reconciled by comparing `last_modified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Logical data length in bytes
    #[serde(default)]
    pub length: u64,
}

impl Item {
    pub fn new(id: impl Into<String>, tags: BTreeSet<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created: now,
            last_modified: now,
            tags,
            length: 0,
        }
    }

    /// Trie key of the item id
    pub fn id_key(&self) -> String {
        id_key(&self.id)
    }

    /// Every trie key this item is reachable under
    pub fn trie_keys(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.id_key()).chain(self.tags.iter().cloned())
    }

    /// Advance `last_modified` to now without ever moving it backwards
    pub fn touch(&mut self) {
        self.last_modified = self.last_modified.max(Utc::now());
    }

    pub fn is_newer_than(&self, other: &Item) -> bool {
        self.last_modified > other.last_modified
    }
}

/// Trie key for an item id
pub fn id_key(id: &str) -> String {
    format!("{ID_KEY_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_serialization() {
        let item = Item::new("report", BTreeSet::from(["q1".to_string()]));
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("lastModified").is_some());
        assert!(json.get("last_modified").is_none());
        assert_eq!(json["tags"], serde_json::json!(["q1"]));
    }

    #[test]
    fn test_trie_keys() {
        let item = Item::new(
            "report",
            BTreeSet::from(["b".to_string(), "a".to_string()]),
        );
        let keys: Vec<String> = item.trie_keys().collect();
        assert_eq!(keys, vec!["Id=report", "a", "b"]);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut item = Item::new("x", BTreeSet::new());
        let future = Utc::now() + chrono::Duration::hours(1);
        item.last_modified = future;
        item.touch();
        assert_eq!(item.last_modified, future);
    }
}
