#![allow(dead_code)]

use cairn_config::LockConfig;
use cairn_core::{FileAccess, FileMode, KeyMaterial};
use cairn_pool::{LocationOptions, MemoryLocation, PoolSettings, StoragePool};
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::time::Duration;

/// Pool settings with short lock timings and no availability caching
pub fn fast_settings() -> PoolSettings {
    PoolSettings {
        lock: LockConfig {
            stale_after_secs: 3600,
            backoff_ms: 20,
            jitter_ms: 20,
            settle_ms: 10,
        },
        availability_ttl: Duration::ZERO,
    }
}

pub fn key(name: &str) -> KeyMaterial {
    KeyMaterial::from(format!("key-for-{name}").as_str())
}

pub fn tags(values: &[&str]) -> Option<BTreeSet<String>> {
    Some(values.iter().map(|v| v.to_string()).collect())
}

pub fn add_memory(pool: &StoragePool, name: &str, options: LocationOptions) -> MemoryLocation {
    let location = MemoryLocation::new(name);
    pool.add_location(Box::new(location.clone()), key(name), options)
        .unwrap();
    location
}

pub fn put(pool: &StoragePool, id: &str, data: &[u8], item_tags: &[&str]) {
    let mut stream = pool
        .open(id, FileMode::Create, FileAccess::Write, tags(item_tags))
        .unwrap();
    stream.write_all(data).unwrap();
    stream.finish().unwrap();
}

pub fn get(pool: &StoragePool, id: &str) -> Vec<u8> {
    let mut stream = pool.open(id, FileMode::Open, FileAccess::Read, None).unwrap();
    let mut data = Vec::new();
    stream.read_to_end(&mut data).unwrap();
    data
}

pub fn sorted_ids(items: Vec<cairn_pool::Item>) -> Vec<String> {
    let mut ids: Vec<String> = items.into_iter().map(|item| item.id).collect();
    ids.sort();
    ids
}

/// Add a disk location rooted in a fresh temporary directory
pub fn add_disk(pool: &StoragePool, name: &str, options: LocationOptions) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    pool.add_location(
        Box::new(cairn_pool::DiskLocation::open(name, dir.path()).unwrap()),
        key(name),
        options,
    )
    .unwrap();
    dir
}
