//! Pool open, list, delete and repair behaviour

mod common;

use cairn_core::{Error, FileAccess, FileMode, RepairConfig};
use cairn_pool::{paths, LocationOptions, StoragePool};
use common::*;
use std::io::{Read, Seek, SeekFrom, Write};

#[test]
fn test_tag_search_and_deletion() {
    let pool = StoragePool::with_settings(fast_settings());
    add_memory(&pool, "main", LocationOptions::new());

    put(&pool, "alpha", b"first", &["red", "shared"]);
    put(&pool, "beta", b"second", &["blue", "shared"]);
    put(&pool, "gamma", b"third", &["red"]);

    assert_eq!(sorted_ids(pool.list("red")), vec!["alpha", "gamma"]);
    assert_eq!(sorted_ids(pool.list("shared")), vec!["alpha", "beta"]);
    assert_eq!(sorted_ids(pool.list("Id=*")), vec!["alpha", "beta", "gamma"]);
    assert_eq!(sorted_ids(pool.list("Id=?eta")), vec!["beta"]);
    assert_eq!(sorted_ids(pool.list("*e*")).len(), 3);

    assert!(pool.delete("alpha").unwrap());
    assert_eq!(sorted_ids(pool.list("red")), vec!["gamma"]);
    assert_eq!(sorted_ids(pool.list("shared")), vec!["beta"]);
    assert!(!pool.delete("alpha").unwrap());

    assert!(matches!(
        pool.open("alpha", FileMode::Open, FileAccess::Read, None),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_create_stores_encrypted_data_under_hashed_path() {
    let pool = StoragePool::with_settings(fast_settings());
    let location = add_memory(&pool, "main", LocationOptions::new());

    put(&pool, "secret-notes", b"plain text that must not leak", &[]);

    let raw = location.read_raw(&paths::data_path("secret-notes")).unwrap();
    assert_eq!(raw.len(), 534);
    assert!(!raw
        .windows(b"plain text".len())
        .any(|window| window == b"plain text"));
    assert_eq!(get(&pool, "secret-notes"), b"plain text that must not leak");

    let item = pool.list("Id=secret-notes").pop().unwrap();
    assert_eq!(item.length, 29);
}

#[test]
fn test_create_new_rejects_existing_id() {
    let pool = StoragePool::with_settings(fast_settings());
    add_memory(&pool, "main", LocationOptions::new());

    put(&pool, "doc", b"v1", &[]);
    assert!(matches!(
        pool.open("doc", FileMode::CreateNew, FileAccess::Write, None),
        Err(Error::AlreadyExists { .. })
    ));
}

#[test]
fn test_create_replaces_content_and_tags() {
    let pool = StoragePool::with_settings(fast_settings());
    add_memory(&pool, "main", LocationOptions::new());

    put(&pool, "doc", b"a much longer first version", &["draft"]);
    let created = pool.list("Id=doc").pop().unwrap().created;
    put(&pool, "doc", b"short", &["final"]);

    assert_eq!(get(&pool, "doc"), b"short");
    assert!(pool.list("draft").is_empty());
    let item = pool.list("final").pop().unwrap();
    assert_eq!(item.length, 5);
    assert_eq!(item.created, created);
}

#[test]
fn test_append_and_truncate_modes() {
    let pool = StoragePool::with_settings(fast_settings());
    add_memory(&pool, "main", LocationOptions::new());

    {
        let mut stream = pool
            .open("log", FileMode::Append, FileAccess::Write, None)
            .unwrap();
        stream.write_all(b"one;").unwrap();
    }
    {
        let mut stream = pool
            .open("log", FileMode::Append, FileAccess::Write, None)
            .unwrap();
        stream.write_all(b"two;").unwrap();
    }
    assert_eq!(get(&pool, "log"), b"one;two;");

    {
        let mut stream = pool
            .open("log", FileMode::Truncate, FileAccess::Write, None)
            .unwrap();
        stream.write_all(b"reset").unwrap();
    }
    assert_eq!(get(&pool, "log"), b"reset");
    assert_eq!(pool.list("Id=log")[0].length, 5);

    assert!(matches!(
        pool.open("missing", FileMode::Truncate, FileAccess::Write, None),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_random_access_within_item() {
    let pool = StoragePool::with_settings(fast_settings());
    add_memory(&pool, "main", LocationOptions::new());
    put(&pool, "blob", &vec![b'.'; 1500], &[]);

    {
        let mut stream = pool
            .open("blob", FileMode::Open, FileAccess::ReadWrite, None)
            .unwrap();
        stream.seek(SeekFrom::Start(700)).unwrap();
        stream.write_all(b"MARK").unwrap();
        stream.seek(SeekFrom::Start(698)).unwrap();
        let mut window = [0u8; 8];
        stream.read_exact(&mut window).unwrap();
        assert_eq!(&window, b"..MARK..");
        stream.set_len(1000).unwrap();
        assert_eq!(stream.finish().unwrap().length, 1000);
    }
    assert_eq!(get(&pool, "blob").len(), 1000);
}

#[test]
fn test_read_only_stream_rejects_writes() {
    let pool = StoragePool::with_settings(fast_settings());
    add_memory(&pool, "main", LocationOptions::new());
    put(&pool, "doc", b"content", &[]);

    let before = pool.list("Id=doc").pop().unwrap();
    let mut stream = pool.open("doc", FileMode::Open, FileAccess::Read, None).unwrap();
    assert!(stream.write_all(b"x").is_err());
    let after = stream.finish().unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_writes_go_to_preferred_available_location() {
    let pool = StoragePool::with_settings(fast_settings());
    let slow = add_memory(&pool, "slow", LocationOptions::new().priority(5));
    let fast = add_memory(&pool, "fast", LocationOptions::new().priority(1));

    let names: Vec<String> = pool
        .locations()
        .iter()
        .map(|l| l.name().to_string())
        .collect();
    assert_eq!(names, vec!["fast", "slow"]);

    put(&pool, "a", b"1", &[]);
    assert!(pool.location("fast").unwrap().contains("a"));
    assert!(!pool.location("slow").unwrap().contains("a"));
    assert_eq!(pool.location("slow").unwrap().pending_len(), 1);

    fast.set_available(false);
    put(&pool, "b", b"2", &[]);
    assert!(pool.location("slow").unwrap().contains("b"));
    assert_eq!(sorted_ids(pool.list("Id=*")), vec!["b"]);

    slow.set_available(false);
    assert!(matches!(
        pool.open("c", FileMode::Create, FileAccess::Write, None),
        Err(Error::LocationUnavailable { .. })
    ));
}

#[test]
fn test_list_prefers_higher_priority_copy() {
    let pool = StoragePool::with_settings(fast_settings());
    add_memory(&pool, "first", LocationOptions::new().priority(1));
    add_memory(&pool, "second", LocationOptions::new().priority(2));

    put(&pool, "doc", b"v1", &["tag"]);
    pool.sync_now().unwrap();
    let second = pool.location("second").unwrap();
    let mut copy = second.get("doc").unwrap();
    copy.tags.insert("second-only".into());
    second.attach(copy);

    let listed = pool.list("tag");
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].tags.contains("second-only"));
}

#[test]
fn test_delete_is_replicated_to_unreachable_locations() {
    let pool = StoragePool::with_settings(fast_settings());
    add_memory(&pool, "first", LocationOptions::new().priority(1));
    let second_location = add_memory(&pool, "second", LocationOptions::new().priority(2));

    put(&pool, "doc", b"data", &[]);
    pool.sync_now().unwrap();
    let second = pool.location("second").unwrap();
    assert!(second.contains("doc"));

    second_location.set_available(false);
    assert!(pool.delete("doc").unwrap());
    assert_eq!(second.pending_len(), 1);

    second_location.set_available(true);
    pool.sync_now().unwrap();
    assert!(!second.contains("doc"));
    assert!(second_location
        .read_raw(&paths::data_path("doc"))
        .is_none());
}

#[test]
fn test_repair_sweeps_damaged_item() {
    let pool = StoragePool::with_settings(fast_settings());
    let location = add_memory(
        &pool,
        "main",
        LocationOptions::new().repair(RepairConfig::default()),
    );
    let data: Vec<u8> = (0..1200u32).map(|i| (i % 256) as u8).collect();
    put(&pool, "doc", &data, &[]);

    let path = paths::data_path("doc");
    assert_eq!(location.read_raw(&path).unwrap().len(), 3 * 776);
    location.modify_raw(&path, |bytes| {
        // inside the ciphertext of block 1
        bytes[776 + 700] ^= 0xFF;
    });

    assert_eq!(pool.repair("doc").unwrap(), 1);
    assert_eq!(pool.repair("doc").unwrap(), 0);
    assert_eq!(get(&pool, "doc"), data);
    assert!(matches!(pool.repair("nothing"), Err(Error::NotFound { .. })));
}

#[test]
fn test_sync_interval_requires_runtime() {
    let pool = StoragePool::with_settings(fast_settings());
    let result = pool.add_location(
        Box::new(cairn_pool::MemoryLocation::new("bg")),
        key("bg"),
        LocationOptions::new().sync_interval(std::time::Duration::from_secs(1)),
    );
    assert!(matches!(result, Err(Error::Configuration { .. })));
}

#[test]
fn test_duplicate_location_name_is_rejected() {
    let pool = StoragePool::with_settings(fast_settings());
    add_memory(&pool, "main", LocationOptions::new());
    let result = pool.add_location(
        Box::new(cairn_pool::MemoryLocation::new("main")),
        key("main"),
        LocationOptions::new(),
    );
    assert!(matches!(result, Err(Error::Configuration { .. })));
}

#[test]
fn test_shutdown_persists_metadata() {
    let pool = StoragePool::with_settings(fast_settings());
    let location = add_memory(&pool, "main", LocationOptions::new());
    put(&pool, "doc", b"kept", &["persisted"]);
    pool.shutdown().unwrap();
    drop(pool);

    let reopened = StoragePool::with_settings(fast_settings());
    reopened
        .add_location(Box::new(location), key("main"), LocationOptions::new())
        .unwrap();
    assert_eq!(sorted_ids(reopened.list("persisted")), vec!["doc"]);
    assert_eq!(get(&reopened, "doc"), b"kept");
}

#[test]
fn test_disk_append_with_write_access() {
    let pool = StoragePool::with_settings(fast_settings());
    let _dir = add_disk(&pool, "disk", LocationOptions::new());

    put(&pool, "log", b"one;", &[]);
    {
        let mut stream = pool
            .open("log", FileMode::Append, FileAccess::Write, None)
            .unwrap();
        stream.write_all(b"two;").unwrap();
        stream.finish().unwrap();
    }
    assert_eq!(get(&pool, "log"), b"one;two;");
    assert_eq!(pool.list("Id=log")[0].length, 8);
}

#[test]
fn test_disk_overwrite_inside_written_item() {
    let pool = StoragePool::with_settings(fast_settings());
    let _dir = add_disk(
        &pool,
        "disk",
        LocationOptions::new().repair(RepairConfig::default()),
    );

    let mut expected = vec![b'.'; 1000];
    {
        let mut stream = pool
            .open("blob", FileMode::Create, FileAccess::Write, None)
            .unwrap();
        stream.write_all(&expected).unwrap();
        stream.seek(SeekFrom::Start(10)).unwrap();
        stream.write_all(b"MARK").unwrap();
        stream.seek(SeekFrom::Start(600)).unwrap();
        stream.write_all(b"MARK").unwrap();
        stream.finish().unwrap();
    }
    expected[10..14].copy_from_slice(b"MARK");
    expected[600..604].copy_from_slice(b"MARK");
    assert_eq!(get(&pool, "blob"), expected);
}

#[test]
fn test_disk_truncate_and_set_len() {
    let pool = StoragePool::with_settings(fast_settings());
    let _dir = add_disk(&pool, "disk", LocationOptions::new());
    put(&pool, "doc", &vec![b'x'; 1500], &[]);

    {
        let mut stream = pool
            .open("doc", FileMode::Open, FileAccess::Write, None)
            .unwrap();
        stream.set_len(700).unwrap();
        assert_eq!(stream.finish().unwrap().length, 700);
    }
    assert_eq!(get(&pool, "doc"), vec![b'x'; 700]);

    {
        let mut stream = pool
            .open("doc", FileMode::Truncate, FileAccess::Write, None)
            .unwrap();
        stream.write_all(b"reset").unwrap();
    }
    assert_eq!(get(&pool, "doc"), b"reset");
    assert!(matches!(
        pool.open("missing", FileMode::Open, FileAccess::Write, None),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_disk_repair_rebuilds_corrupted_shard() {
    let pool = StoragePool::with_settings(fast_settings());
    let dir = add_disk(
        &pool,
        "disk",
        LocationOptions::new().repair(RepairConfig::default()),
    );
    let data: Vec<u8> = (0..1200u32).map(|i| (i % 251) as u8).collect();
    put(&pool, "doc", &data, &[]);

    let file = dir.path().join(paths::data_path("doc"));
    let mut raw = std::fs::read(&file).unwrap();
    raw[776 + 700] ^= 0xFF;
    std::fs::write(&file, raw).unwrap();

    assert_eq!(pool.repair("doc").unwrap(), 1);
    assert_eq!(get(&pool, "doc"), data);
}
