//! Block stream codec for cairn
//!
//! Every item and metadata document is stored through a [`BlockCipherStream`]:
//! a seekable byte stream cut into 512 byte logical blocks, each encrypted
//! with AES-256-CBC under a fresh IV and framed with a CRC32. When a
//! [`RepairConfig`](cairn_core::RepairConfig) is supplied, each block also
//! carries Reed-Solomon parity shards and per-shard checksums so that
//! localized corruption is repaired transparently on read.
//!
//! ## On-disk block layout
//!
//! ```text
//! [crc32 u32][repair region][length u16][IV 16B][ciphertext 512B]
//! ```

pub mod cipher;
pub mod frame;
pub mod integrity;
pub mod layout;
pub mod raw;
pub mod stream;

pub use cipher::BlockCipher;
pub use integrity::{crc32, IntegrityCodec};
pub use layout::BlockLayout;
pub use raw::{ForwardOnly, RawStream, SharedBuffer};
pub use stream::BlockCipherStream;
