//! Byte geometry of an on-disk block

use cairn_core::{RepairConfig, CHECKSUM_SIZE, IV_SIZE, LENGTH_FIELD_SIZE, RAW_BLOCK_SIZE};

/// Bytes covered by erasure coding: `length + IV + ciphertext`
pub const BODY_SIZE: usize = LENGTH_FIELD_SIZE + IV_SIZE + RAW_BLOCK_SIZE;

/// Offsets and sizes of every field in one on-disk block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    repair: Option<RepairConfig>,
    shard_size: usize,
    region_size: usize,
}

impl BlockLayout {
    pub fn new(repair: Option<RepairConfig>) -> Self {
        match repair {
            None => Self {
                repair: None,
                shard_size: 0,
                region_size: 0,
            },
            Some(config) => {
                let shard_size = BODY_SIZE.div_ceil(config.data_shards);
                let table = config.total_shards() * CHECKSUM_SIZE;
                Self {
                    repair: Some(config),
                    shard_size,
                    region_size: 2 * table + config.parity_shards * shard_size,
                }
            }
        }
    }

    #[inline]
    pub fn repair(&self) -> Option<&RepairConfig> {
        self.repair.as_ref()
    }

    /// Size of one erasure shard, zero when repair is disabled
    #[inline]
    pub fn shard_size(&self) -> usize {
        self.shard_size
    }

    /// Size of the repair region between the checksum and the body
    #[inline]
    pub fn region_size(&self) -> usize {
        self.region_size
    }

    /// Offset of the length field
    #[inline]
    pub fn body_offset(&self) -> usize {
        CHECKSUM_SIZE + self.region_size
    }

    /// Offset of the IV
    #[inline]
    pub fn iv_offset(&self) -> usize {
        self.body_offset() + LENGTH_FIELD_SIZE
    }

    /// Offset of the ciphertext
    #[inline]
    pub fn ciphertext_offset(&self) -> usize {
        self.iv_offset() + IV_SIZE
    }

    /// Total bytes occupied by one block on the backing stream
    #[inline]
    pub fn disk_block_size(&self) -> usize {
        CHECKSUM_SIZE + self.region_size + BODY_SIZE
    }

    /// Size of one shard checksum table
    #[inline]
    pub fn table_size(&self) -> usize {
        self.repair
            .map_or(0, |config| config.total_shards() * CHECKSUM_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_layout() {
        let layout = BlockLayout::new(None);
        assert_eq!(layout.region_size(), 0);
        assert_eq!(layout.body_offset(), 4);
        assert_eq!(layout.ciphertext_offset(), 22);
        assert_eq!(layout.disk_block_size(), 534);
    }

    #[test]
    fn test_default_repair_layout() {
        let layout = BlockLayout::new(Some(RepairConfig::default()));
        assert_eq!(layout.shard_size(), 89);
        assert_eq!(layout.table_size(), 32);
        assert_eq!(layout.region_size(), 32 + 178 + 32);
        assert_eq!(layout.disk_block_size(), 4 + 242 + 530);
    }
}
