//! Raw byte streams handed out by storage backends

use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// A backend byte stream that a [`BlockCipherStream`](crate::BlockCipherStream) wraps
pub trait RawStream: Read + Write + Seek + Send {
    /// Whether arbitrary seeks are supported; forward-only streams return false
    fn is_seekable(&self) -> bool {
        true
    }

    /// Truncate or extend the underlying storage
    fn set_len(&mut self, _len: u64) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream does not support resizing",
        ))
    }
}

impl RawStream for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

impl RawStream for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.get_mut().resize(len as usize, 0);
        Ok(())
    }
}

impl<T: RawStream + ?Sized> RawStream for Box<T> {
    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        (**self).set_len(len)
    }
}

/// In-memory buffer shared between handles, each with its own cursor
///
/// Cloning yields a new handle onto the same bytes positioned at zero.
#[derive(Debug, Default)]
pub struct SharedBuffer {
    data: Arc<Mutex<Vec<u8>>>,
    position: u64,
}

impl Clone for SharedBuffer {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            position: 0,
        }
    }
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: Arc::new(Mutex::new(bytes)),
            position: 0,
        }
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// Mutate the shared bytes directly
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
        f(&mut self.data.lock())
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Read for SharedBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.lock();
        let start = (self.position as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = self.data.lock();
        let start = self.position as usize;
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        self.position = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SharedBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.data.lock().len() as i128;
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::End(d) => len + d as i128,
            SeekFrom::Current(d) => self.position as i128 + d as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of buffer",
            ));
        }
        self.position = target as u64;
        Ok(self.position)
    }
}

impl RawStream for SharedBuffer {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.data.lock().resize(len as usize, 0);
        Ok(())
    }
}

/// Adapter that hides seeking, modelling pipes and append-only transports
///
/// Only seeks that resolve to the current position succeed.
#[derive(Debug)]
pub struct ForwardOnly<S> {
    inner: S,
    position: u64,
}

impl<S> ForwardOnly<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, position: 0 }
    }
}

impl<S: Read> Read for ForwardOnly<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<S: Write> Write for ForwardOnly<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<S> Seek for ForwardOnly<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(d) => self.position.checked_add_signed(d),
            SeekFrom::End(_) => None,
        };
        match target {
            Some(n) if n == self.position => Ok(n),
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "forward-only stream cannot seek",
            )),
        }
    }
}

impl<S: Read + Write + Send> RawStream for ForwardOnly<S> {
    fn is_seekable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_buffer_handles_share_bytes() {
        let mut writer = SharedBuffer::new();
        writer.write_all(b"hello").unwrap();

        let mut reader = writer.clone();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello");

        writer.with_bytes_mut(|bytes| bytes[0] = b'j');
        assert_eq!(reader.snapshot(), b"jello");
    }

    #[test]
    fn test_shared_buffer_write_past_end_zero_fills() {
        let mut buf = SharedBuffer::new();
        buf.seek(SeekFrom::Start(3)).unwrap();
        buf.write_all(b"x").unwrap();
        assert_eq!(buf.snapshot(), vec![0, 0, 0, b'x']);
    }

    #[test]
    fn test_forward_only_rejects_backward_seek() {
        let mut stream = ForwardOnly::new(Cursor::new(vec![1u8, 2, 3]));
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).unwrap();
        assert_eq!(stream.seek(SeekFrom::Current(0)).unwrap(), 1);
        assert!(stream.seek(SeekFrom::Start(0)).is_err());
        assert!(!stream.is_seekable());
    }
}
