use crate::*;
use cairn_core::{Error, KeyMaterial, RepairConfig, CAIRN_CONFIG_VAR};
use serial_test::serial;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const SAMPLE: &str = r#"{
  "locations": [
    { "name": "primary", "kind": "disk", "connection": "/srv/cairn",
      "key": "primary-secret", "priority": 1 },
    { "name": "backup", "kind": "memory", "key": "hex:00ff10",
      "priority": 2, "sync_interval_secs": 30, "shared": true,
      "repair": { "data_shards": 4, "parity_shards": 2 } }
  ],
  "lock": { "backoff_ms": 250 }
}"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_parse_sample() {
    let file = write_config(SAMPLE);
    let config = load_file(file.path()).unwrap();

    assert_eq!(config.locations.len(), 2);
    let backup = config.location("backup").unwrap();
    assert_eq!(backup.kind, LocationKind::Memory);
    assert_eq!(backup.sync_interval_secs, Some(30));
    assert!(backup.shared);
    assert_eq!(
        backup.repair,
        Some(RepairConfig {
            data_shards: 4,
            parity_shards: 2
        })
    );

    assert_eq!(config.lock.backoff_ms, 250);
    assert_eq!(config.lock.settle_ms, 3000);
    assert_eq!(config.lock.stale_after_secs, 3600);
    assert_eq!(config.availability_ttl_secs, 300);
    assert!(config.validate().is_ok());
}

#[test]
fn test_unknown_field_is_rejected() {
    let file = write_config(r#"{ "locations": [], "colour": "blue" }"#);
    assert!(matches!(
        load_file(file.path()),
        Err(Error::Serialization { .. })
    ));
}

#[test]
fn test_resolve_inline_keys() {
    let file = write_config(SAMPLE);
    let config = load_file(file.path()).unwrap();

    let primary = config.location("primary").unwrap().resolve_key().unwrap();
    assert_eq!(primary, KeyMaterial::from("primary-secret"));

    let backup = config.location("backup").unwrap().resolve_key().unwrap();
    assert_eq!(backup.as_bytes(), &[0x00, 0xff, 0x10]);
}

#[test]
#[serial]
fn test_resolve_key_from_env() {
    let location = LocationConfig::new("env", LocationKind::Memory, "").with_key_env("CAIRN_TEST_KEY");

    std::env::remove_var("CAIRN_TEST_KEY");
    assert!(matches!(
        location.resolve_key(),
        Err(Error::Configuration { .. })
    ));

    std::env::set_var("CAIRN_TEST_KEY", "from-env");
    assert_eq!(location.resolve_key().unwrap(), KeyMaterial::from("from-env"));
    std::env::remove_var("CAIRN_TEST_KEY");
}

#[test]
fn test_debug_redacts_inline_key() {
    let location = LocationConfig::new("a", LocationKind::Memory, "").with_key("hunter2");
    let rendered = format!("{location:?}");
    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("REDACTED"));
}

#[test]
fn test_validation_rejects_duplicates_and_missing_keys() {
    let duplicate = PoolConfig::builder()
        .with_location(LocationConfig::new("a", LocationKind::Memory, "").with_key("k"))
        .with_location(LocationConfig::new("a", LocationKind::Memory, "").with_key("k"))
        .build();
    assert!(matches!(duplicate, Err(Error::Configuration { .. })));

    let keyless = PoolConfig::builder()
        .with_location(LocationConfig::new("a", LocationKind::Memory, ""))
        .build();
    assert!(matches!(keyless, Err(Error::Configuration { .. })));

    let no_dir = PoolConfig::builder()
        .with_location(LocationConfig::new("a", LocationKind::Disk, " ").with_key("k"))
        .build();
    assert!(matches!(no_dir, Err(Error::Configuration { .. })));

    let bad_repair = PoolConfig::builder()
        .with_location(
            LocationConfig::new("a", LocationKind::Memory, "")
                .with_key("k")
                .with_repair(RepairConfig {
                    data_shards: 200,
                    parity_shards: 100,
                }),
        )
        .build();
    assert!(matches!(bad_repair, Err(Error::Configuration { .. })));
}

#[test]
fn test_lock_durations() {
    let lock = LockConfig::default();
    assert_eq!(lock.stale_after().as_secs(), 3600);
    assert_eq!(lock.settle().as_secs(), 3);
    assert_eq!(lock.backoff().base.as_secs(), 3);
}

#[test]
#[serial]
fn test_loader_precedence() {
    let from_env = write_config(r#"{ "availability_ttl_secs": 10 }"#);
    let explicit = write_config(r#"{ "availability_ttl_secs": 20 }"#);
    let xdg = TempDir::new().unwrap();
    std::env::set_var("XDG_CONFIG_HOME", xdg.path());

    std::env::set_var(CAIRN_CONFIG_VAR, from_env.path());
    let config = PoolConfigLoader::new().load().unwrap();
    assert_eq!(config.availability_ttl_secs, 10);
    assert_eq!(
        config.source,
        ConfigSource::EnvironmentVariable(CAIRN_CONFIG_VAR.to_string())
    );

    let config = PoolConfigLoader::new().path(explicit.path()).load().unwrap();
    assert_eq!(config.availability_ttl_secs, 20);
    assert_eq!(
        config.source,
        ConfigSource::CommandLine(explicit.path().to_path_buf())
    );

    std::env::remove_var(CAIRN_CONFIG_VAR);
    let config = PoolConfigLoader::new().load().unwrap();
    assert_eq!(config, PoolConfig::default());

    let dir = xdg.path().join("cairn");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.json"), r#"{ "availability_ttl_secs": 30 }"#).unwrap();
    let config = PoolConfigLoader::new().load().unwrap();
    assert_eq!(config.availability_ttl_secs, 30);
    assert!(matches!(config.source, ConfigSource::ConfigFile(_)));

    std::env::remove_var("XDG_CONFIG_HOME");
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = PoolConfigLoader::new()
        .path(dir.path().join("absent.json"))
        .load();
    assert!(matches!(result, Err(Error::Io { .. })));
}
