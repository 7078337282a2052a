//! Last-writer-wins merge properties

mod common;

use cairn_pool::{Item, LocationIndex, LocationOptions, MemoryLocation, MetadataDocument};
use chrono::{Duration, TimeZone, Utc};
use common::{fast_settings, key};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn item(id: u8, minute: i64, side: &str) -> Item {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut item = Item::new(format!("item-{id}"), BTreeSet::from([side.to_string()]));
    item.created = base;
    item.last_modified = base + Duration::minutes(minute);
    item
}

fn versions() -> impl Strategy<Value = BTreeMap<u8, i64>> {
    prop::collection::btree_map(0u8..12, 0i64..5, 0..12)
}

proptest! {
    #[test]
    fn merge_keeps_newest_copy_of_every_item(local in versions(), disk in versions()) {
        let index = LocationIndex::new(
            Box::new(MemoryLocation::new("mem")),
            key("mem"),
            LocationOptions::new(),
            fast_settings(),
        )
        .unwrap();
        for (&id, &minute) in &local {
            index.attach(item(id, minute, "local"));
        }

        let mut document = MetadataDocument::default();
        document.last_modified = Utc::now();
        for (&id, &minute) in &disk {
            let item = item(id, minute, "disk");
            document.items.insert(item.id.clone(), item);
        }

        let adopted = index.merge_document(document.clone());
        let expected_adopted = disk
            .iter()
            .filter(|&(id, minute)| local.get(id).map_or(true, |local| minute > local))
            .count();
        prop_assert_eq!(adopted, expected_adopted);

        let ids: BTreeSet<u8> = local.keys().chain(disk.keys()).copied().collect();
        prop_assert_eq!(index.len(), ids.len());
        for id in ids {
            let held = index.get(&format!("item-{id}")).unwrap();
            let disk_wins = match (local.get(&id), disk.get(&id)) {
                (Some(l), Some(d)) => d > l,
                (None, Some(_)) => true,
                _ => false,
            };
            let side = if disk_wins { "disk" } else { "local" };
            prop_assert!(held.tags.contains(side));
            prop_assert_eq!(index.search(side).iter().filter(|i| i.id == held.id).count(), 1);
        }

        prop_assert_eq!(index.merge_document(document), 0);
    }
}
