/// Constants used throughout the cairn codebase
// Reserved backend paths
pub const INDEX_FILE: &str = "index.cmg";
pub const INDEX_LOCK_FILE: &str = "index-lock.cmg";
pub const OBJECTS_DIR: &str = "objects";
pub const OBJECT_EXTENSION: &str = "cmg";

// Trie key prefix for item ids
pub const ID_KEY_PREFIX: &str = "Id=";

// Block geometry
pub const RAW_BLOCK_SIZE: usize = 512;
pub const CHECKSUM_SIZE: usize = 4;
pub const LENGTH_FIELD_SIZE: usize = 2;
pub const IV_SIZE: usize = 16;

// Erasure coding defaults
pub const DEFAULT_DATA_SHARDS: usize = 6;
pub const DEFAULT_PARITY_SHARDS: usize = 2;

// Advisory lock timings (seconds)
pub const LOCK_STALE_AFTER_SECS: u64 = 60 * 60;
pub const LOCK_BACKOFF_SECS: u64 = 3;
pub const LOCK_SETTLE_SECS: u64 = 3;

// Availability probe cache (seconds)
pub const AVAILABILITY_TTL_SECS: u64 = 5 * 60;

// Environment variable names
pub const CAIRN_CONFIG_VAR: &str = "CAIRN_CONFIG";
pub const CAIRN_LOG_VAR: &str = "CAIRN_LOG";
