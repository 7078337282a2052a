//! Seekable encrypted stream over fixed-size blocks
//!
//! Logical offsets map to block `offset / 512`; block `i` lives at
//! `i * disk_block_size` on the inner stream. One block is cached at a time
//! and written back when the stream moves to another block, on `flush` and
//! on drop.

use cairn_core::{Error, KeyMaterial, RepairConfig, Result, RAW_BLOCK_SIZE};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, warn};

use crate::frame::BlockFrame;
use crate::raw::RawStream;

const BLOCK: u64 = RAW_BLOCK_SIZE as u64;

struct CachedBlock {
    index: u64,
    data: Box<[u8; RAW_BLOCK_SIZE]>,
    len: usize,
    dirty: bool,
}

impl CachedBlock {
    fn empty(index: u64) -> Self {
        Self {
            index,
            data: Box::new([0u8; RAW_BLOCK_SIZE]),
            len: 0,
            dirty: false,
        }
    }
}

/// Encrypting, self-repairing stream wrapper
///
/// Not safe for concurrent use; each open item gets its own instance.
pub struct BlockCipherStream<S: RawStream> {
    inner: S,
    frame: BlockFrame,
    seekable: bool,
    position: u64,
    length: u64,
    /// False for forward-only streams opened for reading until their end is reached
    length_known: bool,
    /// Forward-only readers never accept writes
    writable: bool,
    /// Index and payload length of the most recently decoded block
    last_decoded: Option<(u64, usize)>,
    inner_position: u64,
    current: Option<CachedBlock>,
    repaired: u64,
}

impl<S: RawStream> BlockCipherStream<S> {
    /// Wrap an existing stream, deriving the logical length from its last block
    pub fn open(mut inner: S, key: &KeyMaterial, repair: Option<RepairConfig>) -> Result<Self> {
        let frame = BlockFrame::new(key, repair)?;
        let seekable = inner.is_seekable();
        let inner_position = if seekable {
            inner.stream_position()?
        } else {
            0
        };

        let mut stream = Self {
            inner,
            frame,
            seekable,
            position: 0,
            length: 0,
            length_known: false,
            writable: seekable,
            inner_position,
            current: None,
            repaired: 0,
            last_decoded: None,
        };

        if seekable {
            stream.length = stream.probe_length()?;
            stream.length_known = true;
        }
        Ok(stream)
    }

    /// Wrap a freshly created, empty stream
    pub fn create(inner: S, key: &KeyMaterial, repair: Option<RepairConfig>) -> Result<Self> {
        let frame = BlockFrame::new(key, repair)?;
        let seekable = inner.is_seekable();
        Ok(Self {
            inner,
            frame,
            seekable,
            position: 0,
            length: 0,
            length_known: true,
            writable: true,
            inner_position: 0,
            current: None,
            repaired: 0,
            last_decoded: None,
        })
    }

    /// Logical length in bytes, when known
    pub fn len(&self) -> Option<u64> {
        self.length_known.then_some(self.length)
    }

    pub fn is_empty(&self) -> bool {
        self.length_known && self.length == 0
    }

    /// Blocks rebuilt from parity since this stream was opened
    pub fn repaired_blocks(&self) -> u64 {
        self.repaired
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Truncate or zero-extend the logical stream
    pub fn set_len(&mut self, new_len: u64) -> Result<()> {
        self.require_length("set_len")?;
        if !self.writable {
            return Err(Error::unsupported(
                "set_len",
                "stream was opened forward-only for reading",
            ));
        }
        if new_len >= self.length {
            self.zero_fill(new_len)?;
            return Ok(());
        }

        self.flush_block()?;
        self.current = None;

        let blocks = new_len.div_ceil(BLOCK);
        let tail = (new_len % BLOCK) as usize;
        if tail != 0 {
            let mut block = self.load_block(blocks - 1)?;
            block.data[tail..].fill(0);
            block.len = tail;
            block.dirty = true;
            self.current = Some(block);
            self.flush_block()?;
        }

        let disk = self.disk_block_size();
        self.inner.set_len(blocks * disk)?;
        self.length = new_len;
        Ok(())
    }

    /// Read and rewrite every block, returning how many needed repair
    ///
    /// Every block is re-encrypted under a fresh IV, so the sweep also
    /// refreshes checksums and parity that drifted without being read.
    pub fn repair(&mut self) -> Result<u64> {
        self.require_length("repair")?;
        if !self.seekable {
            return Err(Error::unsupported(
                "repair",
                "an integrity sweep needs a seekable stream",
            ));
        }

        self.flush_block()?;
        self.current = None;
        let before = self.repaired;

        for index in 0..self.block_count() {
            let mut block = self.load_block(index)?;
            block.dirty = true;
            self.current = Some(block);
            self.flush_block()?;
        }

        self.current = None;
        self.inner.flush()?;
        let repaired = self.repaired - before;
        debug!(blocks = self.block_count(), repaired, "integrity sweep finished");
        Ok(repaired)
    }

    fn require_length(&self, operation: &'static str) -> Result<()> {
        if self.length_known {
            Ok(())
        } else {
            Err(Error::unsupported(
                operation,
                "stream length is unknown on a forward-only reader",
            ))
        }
    }

    #[inline]
    fn disk_block_size(&self) -> u64 {
        self.frame.layout().disk_block_size() as u64
    }

    #[inline]
    fn block_count(&self) -> u64 {
        self.length.div_ceil(BLOCK)
    }

    fn probe_length(&mut self) -> io::Result<u64> {
        let disk = self.disk_block_size();
        let inner_len = self.inner.seek(SeekFrom::End(0))?;
        self.inner_position = inner_len;

        let blocks = inner_len / disk;
        if inner_len % disk != 0 {
            warn!(
                inner_len,
                disk_block = disk,
                "ignoring trailing partial block"
            );
        }
        if blocks == 0 {
            return Ok(0);
        }

        let last = self.read_block(blocks - 1)?;
        let len = (blocks - 1) * BLOCK + last.len as u64;
        self.current = Some(last);
        Ok(len)
    }

    fn move_inner(&mut self, offset: u64) -> io::Result<()> {
        if offset == self.inner_position {
            return Ok(());
        }
        if self.seekable {
            self.inner.seek(SeekFrom::Start(offset))?;
            self.inner_position = offset;
            return Ok(());
        }
        if offset < self.inner_position {
            return Err(Error::unsupported(
                "seek",
                format!(
                    "cannot move back from byte {} to {offset} on a forward-only stream",
                    self.inner_position
                ),
            )
            .into());
        }

        let skip = offset - self.inner_position;
        let skipped = io::copy(&mut (&mut self.inner).take(skip), &mut io::sink())?;
        self.inner_position += skipped;
        if skipped < skip {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended while skipping forward",
            ));
        }
        Ok(())
    }

    fn read_raw(&mut self, index: u64) -> io::Result<Option<Vec<u8>>> {
        let disk = self.disk_block_size();
        self.move_inner(index * disk)?;

        let mut raw = vec![0u8; disk as usize];
        let mut filled = 0;
        while filled < raw.len() {
            match self.inner.read(&mut raw[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.inner_position += filled as u64;

        if filled == 0 {
            return Ok(None);
        }
        if filled < raw.len() {
            return Err(Error::integrity(
                index,
                format!("truncated block: {filled} of {disk} bytes"),
            )
            .into());
        }
        Ok(Some(raw))
    }

    fn write_raw(&mut self, index: u64, raw: &[u8]) -> io::Result<()> {
        self.move_inner(index * self.disk_block_size())?;
        self.inner.write_all(raw)?;
        self.inner_position += raw.len() as u64;
        Ok(())
    }

    /// Decode block `index` from the inner stream, rewriting it if repaired
    fn read_block(&mut self, index: u64) -> io::Result<CachedBlock> {
        let Some(mut raw) = self.read_raw(index)? else {
            if !self.length_known {
                self.note_end(index);
            }
            return Ok(CachedBlock::empty(index));
        };

        let decoded = self.frame.open(index, &mut raw)?;
        if decoded.repaired {
            self.repaired += 1;
            if let Err(e) = self.write_raw(index, &raw) {
                warn!(block = index, error = %e, "repaired block could not be written back");
            }
        }

        self.last_decoded = Some((index, decoded.len));
        Ok(CachedBlock {
            index,
            data: decoded.payload,
            len: decoded.len,
            dirty: false,
        })
    }

    /// Record the logical length once a forward-only reader finds no block at `index`
    fn note_end(&mut self, index: u64) {
        let length = match (index, self.last_decoded) {
            (0, _) => Some(0),
            (_, Some((last, len))) if last + 1 == index => Some(last * BLOCK + len as u64),
            _ => None,
        };
        if let Some(length) = length {
            self.length = length;
            self.length_known = true;
        }
    }

    fn load_block(&mut self, index: u64) -> io::Result<CachedBlock> {
        if self.length_known && index >= self.block_count() {
            return Ok(CachedBlock::empty(index));
        }
        self.read_block(index)
    }

    fn flush_block(&mut self) -> io::Result<()> {
        let Some(block) = self.current.as_mut() else {
            return Ok(());
        };
        if !block.dirty {
            return Ok(());
        }

        let index = block.index;
        let raw = self.frame.seal(&block.data[..], block.len)?;
        self.write_raw(index, &raw)?;
        if let Some(block) = self.current.as_mut() {
            block.dirty = false;
        }
        Ok(())
    }

    fn current_block(&mut self, index: u64, overwrite: bool) -> io::Result<&mut CachedBlock> {
        if !matches!(&self.current, Some(block) if block.index == index) {
            self.flush_block()?;
            let block = if overwrite {
                CachedBlock::empty(index)
            } else {
                self.load_block(index)?
            };
            self.current = Some(block);
        }
        Ok(self.current.get_or_insert_with(|| CachedBlock::empty(index)))
    }

    /// Write zeros from the current end up to `target`
    fn zero_fill(&mut self, target: u64) -> io::Result<()> {
        let saved = self.position;
        self.position = self.length;
        let zeros = [0u8; RAW_BLOCK_SIZE];
        while self.position < target {
            let n = (target - self.position).min(BLOCK) as usize;
            let written = self.write_chunk(&zeros[..n])?;
            debug_assert!(written > 0);
        }
        self.position = saved;
        Ok(())
    }

    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<usize> {
        let index = self.position / BLOCK;
        let offset = (self.position % BLOCK) as usize;
        let n = buf.len().min(RAW_BLOCK_SIZE - offset);
        let overwrite = offset == 0 && n == RAW_BLOCK_SIZE;

        let block = self.current_block(index, overwrite)?;
        block.data[offset..offset + n].copy_from_slice(&buf[..n]);
        block.len = block.len.max(offset + n);
        block.dirty = true;

        self.position += n as u64;
        self.length = self.length.max(self.position);
        Ok(n)
    }
}

impl<S: RawStream> Read for BlockCipherStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || (self.length_known && self.position >= self.length) {
            return Ok(0);
        }

        let index = self.position / BLOCK;
        let offset = (self.position % BLOCK) as usize;
        let block = self.current_block(index, false)?;
        if offset >= block.len {
            return Ok(0);
        }

        let n = buf.len().min(block.len - offset);
        buf[..n].copy_from_slice(&block.data[offset..offset + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl<S: RawStream> Write for BlockCipherStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.writable {
            return Err(Error::unsupported(
                "write",
                "stream was opened forward-only for reading",
            )
            .into());
        }
        if self.position > self.length {
            self.zero_fill(self.position)?;
        }
        self.write_chunk(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_block()?;
        self.inner.flush()
    }
}

impl<S: RawStream> Seek for BlockCipherStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::Current(d) => self.position as i128 + d as i128,
            SeekFrom::End(d) => {
                if !self.length_known {
                    return Err(Error::unsupported(
                        "seek",
                        "end of a forward-only stream is unknown",
                    )
                    .into());
                }
                self.length as i128 + d as i128
            }
        };

        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of stream",
            ));
        }
        let target = target as u64;
        if !self.seekable && target < self.position {
            return Err(Error::unsupported(
                "seek",
                format!(
                    "backward seek from {} to {target} on a forward-only stream",
                    self.position
                ),
            )
            .into());
        }

        self.position = target;
        Ok(target)
    }
}

impl<S: RawStream> Drop for BlockCipherStream<S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to flush block stream on drop");
        }
    }
}

impl<S: RawStream> std::fmt::Debug for BlockCipherStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCipherStream")
            .field("position", &self.position)
            .field("length", &self.len())
            .field("seekable", &self.seekable)
            .field("repaired", &self.repaired)
            .finish()
    }
}
