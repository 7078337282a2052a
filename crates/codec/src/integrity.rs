//! CRC32 checksums and Reed-Solomon erasure coding over fixed-size shards

use cairn_core::{Error, RepairConfig, Result};
use reed_solomon_erasure::galois_8::ReedSolomon;

/// Reflected CRC32 (polynomial 0xEDB88320, init and final XOR 0xFFFFFFFF)
#[inline]
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Erasure codec splitting a buffer into data shards plus parity shards
pub struct IntegrityCodec {
    config: RepairConfig,
    encoder: ReedSolomon,
}

impl std::fmt::Debug for IntegrityCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityCodec")
            .field("data_shards", &self.config.data_shards)
            .field("parity_shards", &self.config.parity_shards)
            .finish()
    }
}

impl IntegrityCodec {
    pub fn new(config: RepairConfig) -> Result<Self> {
        config.validate()?;
        let encoder = ReedSolomon::new(config.data_shards, config.parity_shards)
            .map_err(|e| Error::configuration(format!("invalid shard layout: {e:?}")))?;
        Ok(Self { config, encoder })
    }

    #[inline]
    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    #[inline]
    pub fn data_shards(&self) -> usize {
        self.config.data_shards
    }

    #[inline]
    pub fn parity_shards(&self) -> usize {
        self.config.parity_shards
    }

    /// Size of each shard when `len` bytes are split across the data shards
    #[inline]
    pub fn shard_size(&self, len: usize) -> usize {
        len.div_ceil(self.config.data_shards).max(1)
    }

    /// Split `data` into equally sized, zero-padded data shards
    pub fn split(&self, data: &[u8]) -> Vec<Vec<u8>> {
        let shard_size = self.shard_size(data.len());
        (0..self.config.data_shards)
            .map(|i| {
                let mut shard = vec![0u8; shard_size];
                let start = (i * shard_size).min(data.len());
                let end = ((i + 1) * shard_size).min(data.len());
                shard[..end - start].copy_from_slice(&data[start..end]);
                shard
            })
            .collect()
    }

    /// Compute the parity shards for `data`
    pub fn encode(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        let shard_size = self.shard_size(data.len());
        let mut shards = self.split(data);
        shards.extend((0..self.config.parity_shards).map(|_| vec![0u8; shard_size]));

        self.encoder
            .encode(&mut shards)
            .map_err(|e| Error::cryptographic("erasure encode", format!("{e:?}")))?;

        Ok(shards.split_off(self.config.data_shards))
    }

    /// Rebuild the shards whose `present` flag is false
    ///
    /// `shards` holds data shards followed by parity shards, all of the same
    /// size. Fails when more shards are absent than there are parity shards.
    pub fn decode(&self, shards: &mut [Vec<u8>], present: &[bool]) -> Result<()> {
        let total = self.config.total_shards();
        if shards.len() != total || present.len() != total {
            return Err(Error::integrity(
                0,
                format!(
                    "expected {total} shards, got {} shards and {} presence flags",
                    shards.len(),
                    present.len()
                ),
            ));
        }

        let missing = present.iter().filter(|p| !**p).count();
        if missing == 0 {
            return Ok(());
        }
        if missing > self.config.parity_shards {
            return Err(Error::integrity(
                0,
                format!(
                    "{missing} shards missing, at most {} can be rebuilt",
                    self.config.parity_shards
                ),
            ));
        }

        let mut slots: Vec<Option<Vec<u8>>> = shards
            .iter_mut()
            .zip(present)
            .map(|(shard, ok)| ok.then(|| std::mem::take(shard)))
            .collect();

        self.encoder
            .reconstruct(&mut slots)
            .map_err(|e| Error::integrity(0, format!("erasure decode failed: {e:?}")))?;

        for (shard, slot) in shards.iter_mut().zip(slots) {
            if let Some(rebuilt) = slot {
                *shard = rebuilt;
            }
        }
        Ok(())
    }

    /// Per-shard CRC32 table
    pub fn checksums(shards: &[Vec<u8>]) -> Vec<u32> {
        shards.iter().map(|s| crc32(s)).collect()
    }
}
