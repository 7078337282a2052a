//! Sealing and opening individual on-disk blocks
//!
//! A sealed block is `[crc32][repair region][length][IV][ciphertext]`. The
//! repair region holds the primary shard checksum table, the parity shards
//! and a duplicate checksum table, in that order.

use cairn_core::{Error, KeyMaterial, RepairConfig, Result, CHECKSUM_SIZE, IV_SIZE, RAW_BLOCK_SIZE};
use tracing::debug;

use crate::cipher::BlockCipher;
use crate::integrity::{crc32, IntegrityCodec};
use crate::layout::{BlockLayout, BODY_SIZE};

/// Plaintext of one logical block
#[derive(Debug, Clone)]
pub struct DecodedBlock {
    pub payload: Box<[u8; RAW_BLOCK_SIZE]>,
    pub len: usize,
    /// The block failed its checksum and was rebuilt from parity
    pub repaired: bool,
}

/// Encrypts, checksums and erasure-codes blocks for one stream
#[derive(Debug)]
pub struct BlockFrame {
    layout: BlockLayout,
    cipher: BlockCipher,
    integrity: Option<IntegrityCodec>,
}

impl BlockFrame {
    pub fn new(key: &KeyMaterial, repair: Option<RepairConfig>) -> Result<Self> {
        let integrity = repair.map(IntegrityCodec::new).transpose()?;
        Ok(Self {
            layout: BlockLayout::new(repair),
            cipher: BlockCipher::new(key),
            integrity,
        })
    }

    #[inline]
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Build the on-disk bytes for `payload[..len]` under a fresh IV
    pub fn seal(&self, payload: &[u8], len: usize) -> Result<Vec<u8>> {
        if len > RAW_BLOCK_SIZE || payload.len() < len {
            return Err(Error::unsupported(
                "seal block",
                format!("payload of {len} bytes does not fit a {RAW_BLOCK_SIZE} byte block"),
            ));
        }

        let layout = &self.layout;
        let mut raw = vec![0u8; layout.disk_block_size()];
        let iv = BlockCipher::fresh_iv();

        let body = layout.body_offset();
        raw[body..body + 2].copy_from_slice(&(len as u16).to_le_bytes());
        raw[layout.iv_offset()..layout.iv_offset() + IV_SIZE].copy_from_slice(&iv);

        let ciphertext = &mut raw[layout.ciphertext_offset()..];
        ciphertext[..len].copy_from_slice(&payload[..len]);
        self.cipher.encrypt(&iv, ciphertext)?;

        self.seal_body(&mut raw)?;
        Ok(raw)
    }

    /// Decode a block read from disk, repairing it in place when needed
    pub fn open(&self, index: u64, raw: &mut [u8]) -> Result<DecodedBlock> {
        let layout = &self.layout;
        if raw.len() != layout.disk_block_size() {
            return Err(Error::integrity(
                index,
                format!(
                    "block is {} bytes, expected {}",
                    raw.len(),
                    layout.disk_block_size()
                ),
            ));
        }

        let stored = read_u32(&raw[..CHECKSUM_SIZE]);
        let computed = crc32(&raw[CHECKSUM_SIZE..]);
        let repaired = stored != computed;
        if repaired {
            self.repair_in_place(index, raw, stored, computed)?;
        }

        let body = layout.body_offset();
        let len = u16::from_le_bytes([raw[body], raw[body + 1]]) as usize;
        if len > RAW_BLOCK_SIZE {
            return Err(Error::integrity(
                index,
                format!("malformed header: length {len} exceeds {RAW_BLOCK_SIZE}"),
            ));
        }

        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&raw[layout.iv_offset()..layout.iv_offset() + IV_SIZE]);

        let mut payload = Box::new([0u8; RAW_BLOCK_SIZE]);
        payload.copy_from_slice(&raw[layout.ciphertext_offset()..]);
        self.cipher.decrypt(&iv, &mut payload[..])?;
        payload[len..].fill(0);

        Ok(DecodedBlock {
            payload,
            len,
            repaired,
        })
    }

    /// Recompute the repair region and the block checksum from the body
    fn seal_body(&self, raw: &mut [u8]) -> Result<()> {
        let layout = &self.layout;
        if let Some(codec) = &self.integrity {
            let body = &raw[layout.body_offset()..];
            let mut shards = codec.split(body);
            shards.extend(codec.encode(body)?);
            let table = IntegrityCodec::checksums(&shards);

            let region = &mut raw[CHECKSUM_SIZE..layout.body_offset()];
            let table_size = layout.table_size();
            write_table(&mut region[..table_size], &table);

            let mut cursor = table_size;
            for parity in &shards[codec.data_shards()..] {
                region[cursor..cursor + parity.len()].copy_from_slice(parity);
                cursor += parity.len();
            }
            write_table(&mut region[cursor..], &table);
        }

        let checksum = crc32(&raw[CHECKSUM_SIZE..]);
        raw[..CHECKSUM_SIZE].copy_from_slice(&checksum.to_le_bytes());
        Ok(())
    }

    fn repair_in_place(&self, index: u64, raw: &mut [u8], stored: u32, computed: u32) -> Result<()> {
        let Some(codec) = &self.integrity else {
            return Err(Error::integrity(
                index,
                format!("checksum mismatch: stored {stored:08x}, computed {computed:08x}"),
            ));
        };

        let layout = &self.layout;
        let total = codec.config().total_shards();
        let shard_size = layout.shard_size();
        let table_size = layout.table_size();
        let parity_end = table_size + codec.parity_shards() * shard_size;

        let region = &raw[CHECKSUM_SIZE..layout.body_offset()];
        let primary = read_table(&region[..table_size]);
        let secondary = read_table(&region[parity_end..]);

        let mut shards = codec.split(&raw[layout.body_offset()..]);
        shards.extend(
            region[table_size..parity_end]
                .chunks(shard_size)
                .map(<[u8]>::to_vec),
        );

        let actual = IntegrityCodec::checksums(&shards);
        let mismatches = |table: &[u32]| -> Vec<usize> {
            (0..total).filter(|&i| actual[i] != table[i]).collect()
        };
        let bad_primary = mismatches(&primary);
        let bad_secondary = mismatches(&secondary);
        let (trusted, bad) = if bad_secondary.len() < bad_primary.len() {
            (secondary, bad_secondary)
        } else {
            (primary, bad_primary)
        };

        if bad.len() > codec.parity_shards() {
            return Err(Error::integrity(
                index,
                format!(
                    "{} of {total} shards failed their checksum, at most {} can be repaired",
                    bad.len(),
                    codec.parity_shards()
                ),
            ));
        }

        if !bad.is_empty() {
            let mut present = vec![true; total];
            for &i in &bad {
                present[i] = false;
            }
            codec
                .decode(&mut shards, &present)
                .map_err(|e| Error::integrity(index, e.to_string()))?;

            if IntegrityCodec::checksums(&shards) != trusted {
                return Err(Error::integrity(
                    index,
                    "rebuilt shards do not match their checksums",
                ));
            }

            let body = shards[..codec.data_shards()].concat();
            raw[layout.body_offset()..].copy_from_slice(&body[..BODY_SIZE]);
        }

        debug!(block = index, shards = ?bad, "repaired block from parity");
        self.seal_body(raw)
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word)
}

fn read_table(bytes: &[u8]) -> Vec<u32> {
    bytes.chunks_exact(CHECKSUM_SIZE).map(read_u32).collect()
}

fn write_table(out: &mut [u8], table: &[u32]) {
    for (slot, checksum) in out.chunks_exact_mut(CHECKSUM_SIZE).zip(table) {
        slot.copy_from_slice(&checksum.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(repair: bool) -> BlockFrame {
        BlockFrame::new(
            &KeyMaterial::from("frame-key"),
            repair.then(RepairConfig::default),
        )
        .unwrap()
    }

    fn payload() -> Vec<u8> {
        (0..RAW_BLOCK_SIZE).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_seal_open_partial_block() {
        let frame = frame(false);
        let data = payload();
        let mut raw = frame.seal(&data, 100).unwrap();

        let decoded = frame.open(0, &mut raw).unwrap();
        assert_eq!(decoded.len, 100);
        assert_eq!(&decoded.payload[..100], &data[..100]);
        assert!(decoded.payload[100..].iter().all(|b| *b == 0));
        assert!(!decoded.repaired);
    }

    #[test]
    fn test_corruption_without_repair_fails() {
        let frame = frame(false);
        let mut raw = frame.seal(&payload(), 512).unwrap();
        raw[40] ^= 0x01;
        assert!(frame.open(0, &mut raw).unwrap_err().is_corruption());
    }

    #[test]
    fn test_data_shard_corruption_is_repaired() {
        let frame = frame(true);
        let data = payload();
        let mut raw = frame.seal(&data, 512).unwrap();
        let pristine = raw.clone();

        let target = frame.layout().ciphertext_offset() + 200;
        raw[target] ^= 0xFF;
        raw[target + 1] ^= 0xFF;

        let decoded = frame.open(3, &mut raw).unwrap();
        assert!(decoded.repaired);
        assert_eq!(&decoded.payload[..], &data[..]);
        assert_eq!(raw, pristine);
    }

    #[test]
    fn test_parity_shard_corruption_is_repaired() {
        let frame = frame(true);
        let mut raw = frame.seal(&payload(), 512).unwrap();
        let pristine = raw.clone();

        let parity_start = CHECKSUM_SIZE + frame.layout().table_size();
        raw[parity_start + 5] ^= 0x55;

        assert!(frame.open(0, &mut raw).unwrap().repaired);
        assert_eq!(raw, pristine);
    }

    #[test]
    fn test_primary_table_corruption_falls_back_to_duplicate() {
        let frame = frame(true);
        let data = payload();
        let mut raw = frame.seal(&data, 512).unwrap();
        let pristine = raw.clone();

        raw[CHECKSUM_SIZE] ^= 0xFF;
        raw[CHECKSUM_SIZE + 4] ^= 0xFF;
        raw[CHECKSUM_SIZE + 8] ^= 0xFF;

        let decoded = frame.open(0, &mut raw).unwrap();
        assert_eq!(&decoded.payload[..], &data[..]);
        assert_eq!(raw, pristine);
    }

    #[test]
    fn test_too_many_corrupted_shards_fail() {
        let frame = frame(true);
        let mut raw = frame.seal(&payload(), 512).unwrap();
        let body = frame.layout().body_offset();
        let shard = frame.layout().shard_size();
        for i in 0..3 {
            raw[body + i * shard + 1] ^= 0xFF;
        }
        let err = frame.open(9, &mut raw).unwrap_err();
        assert!(matches!(err, Error::Integrity { block: 9, .. }));
    }

    #[test]
    fn test_malformed_length_is_rejected() {
        let frame = frame(false);
        let mut raw = frame.seal(&payload(), 10).unwrap();
        let body = frame.layout().body_offset();
        raw[body..body + 2].copy_from_slice(&600u16.to_le_bytes());
        let checksum = crc32(&raw[CHECKSUM_SIZE..]);
        raw[..CHECKSUM_SIZE].copy_from_slice(&checksum.to_le_bytes());
        assert!(frame.open(0, &mut raw).unwrap_err().is_corruption());
    }
}
