use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{DEFAULT_DATA_SHARDS, DEFAULT_PARITY_SHARDS};
use crate::errors::{Error, Result};

/// How a backend file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileMode {
    /// Open an existing file
    Open,
    /// Create a file, truncating any existing one
    Create,
    /// Create a file, failing if it already exists
    CreateNew,
    /// Open or create a file and position at its end
    Append,
    /// Open an existing file and truncate it to zero length
    Truncate,
}

impl FileMode {
    /// Whether this mode may bring a new file into existence
    #[must_use]
    pub const fn creates(self) -> bool {
        matches!(self, Self::Create | Self::CreateNew | Self::Append)
    }

    /// Whether this mode discards existing content
    #[must_use]
    pub const fn truncates(self) -> bool {
        matches!(self, Self::Create | Self::Truncate)
    }
}

/// Access requested on an opened backend file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileAccess {
    Read,
    Write,
    ReadWrite,
}

impl FileAccess {
    #[must_use]
    pub const fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// Erasure coding settings for block repair regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Number of data shards each block body is split into
    pub data_shards: usize,
    /// Number of Reed-Solomon parity shards per block
    pub parity_shards: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            data_shards: DEFAULT_DATA_SHARDS,
            parity_shards: DEFAULT_PARITY_SHARDS,
        }
    }
}

impl RepairConfig {
    /// Validate shard counts against GF(256) limits
    pub fn validate(&self) -> Result<()> {
        if self.data_shards == 0 || self.parity_shards == 0 {
            return Err(Error::configuration(
                "repair requires at least one data shard and one parity shard",
            ));
        }
        if self.data_shards + self.parity_shards > 256 {
            return Err(Error::configuration(format!(
                "{} data + {} parity shards exceeds the 256 shard limit",
                self.data_shards, self.parity_shards
            )));
        }
        Ok(())
    }

    /// Total shard count (data + parity)
    #[must_use]
    pub const fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }
}

/// Caller-supplied raw key bytes, wiped from memory on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex encoded key
    pub fn from_hex(encoded: &str) -> Result<Self> {
        hex::decode(encoded.trim())
            .map(Self)
            .map_err(|e| Error::configuration(format!("invalid hex key: {e}")))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for KeyMaterial {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED; {}])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_mode_flags() {
        assert!(FileMode::Create.creates());
        assert!(FileMode::Create.truncates());
        assert!(FileMode::Append.creates());
        assert!(!FileMode::Append.truncates());
        assert!(!FileMode::Open.creates());
    }

    #[test]
    fn test_repair_config_validation() {
        assert!(RepairConfig::default().validate().is_ok());
        assert!(RepairConfig {
            data_shards: 0,
            parity_shards: 2
        }
        .validate()
        .is_err());
        assert!(RepairConfig {
            data_shards: 250,
            parity_shards: 10
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_key_from_hex() {
        let key = KeyMaterial::from_hex("00ff10").unwrap();
        assert_eq!(key.as_bytes(), &[0x00, 0xff, 0x10]);
        assert!(KeyMaterial::from_hex("abc").is_err());
        assert!(KeyMaterial::from_hex("zz").is_err());
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = KeyMaterial::from("hunter2");
        assert_eq!(format!("{key:?}"), "KeyMaterial([REDACTED; 7])");
    }
}
