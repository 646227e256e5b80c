//! The external sink/source contracts (spec §6).
//!
//! The engine only fixes the *contract* a buffer/stream type must satisfy;
//! concrete byte buffer and stream products are an external collaborator.
//! `Writer` and `SliceSource`/`ReadSource` below are the minimal concrete
//! implementations that make the crate runnable and testable on their own.

use crate::error::{Error, Result};

/// A buffered writer: request at least `min_size` writable bytes, fill a
/// prefix, commit with `advance`.
pub struct Writer {
    buf: Vec<u8>,
    span_start: usize,
}

impl Writer {
    pub fn new() -> Self {
        Writer { buf: Vec::new(), span_start: 0 }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Writer { buf: Vec::with_capacity(cap), span_start: 0 }
    }

    /// Request at least `min_size` writable bytes at the end of the buffer.
    #[inline]
    pub fn get_span(&mut self, min_size: usize) -> &mut [u8] {
        self.span_start = self.buf.len();
        self.buf.resize(self.span_start + min_size, 0);
        &mut self.buf[self.span_start..]
    }

    /// Commit the first `n` bytes of the most recent `get_span` call.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.buf.truncate(self.span_start + n);
    }

    #[inline]
    pub fn write_all(&mut self, bytes: &[u8]) {
        let span = self.get_span(bytes.len());
        span[..bytes.len()].copy_from_slice(bytes);
        self.advance(bytes.len());
    }

    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

/// A forward byte stream with an optional seek-forward for skipping an
/// unread stream-view tail (spec §4.7's "at most one stream view open").
pub trait ByteSource {
    fn read_byte(&mut self) -> Option<u8>;

    /// Fill as much of `dst` as available; returns bytes actually read.
    fn read_into(&mut self, dst: &mut [u8]) -> usize;

    /// Skip `n` bytes forward, consuming-and-discarding by default. Returns
    /// bytes actually skipped (less than `n` at end of stream).
    fn skip_forward(&mut self, n: usize) -> usize {
        let mut scratch = [0u8; 1024];
        let mut remaining = n;
        while remaining > 0 {
            let chunk = remaining.min(scratch.len());
            let read = self.read_into(&mut scratch[..chunk]);
            if read == 0 {
                break;
            }
            remaining -= read;
        }
        n - remaining
    }

    fn read_exact(&mut self, dst: &mut [u8]) -> Result<()> {
        let n = self.read_into(dst);
        if n != dst.len() {
            return Err(Error::UnexpectedEndOfStream);
        }
        Ok(())
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// A bounded in-memory buffer, the "bounded buffer" source of spec §4.1.
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl<'a> ByteSource for SliceSource<'a> {
    fn read_byte(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.remaining());
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    fn skip_forward(&mut self, n: usize) -> usize {
        let n = n.min(self.remaining());
        self.pos += n;
        n
    }
}

/// A forward-only reader over anything implementing [`std::io::Read`] — the
/// "forward stream" source of spec §4.1, for callers without random access.
pub struct ReadSource<R> {
    inner: R,
}

impl<R: std::io::Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        ReadSource { inner }
    }
}

impl<R: std::io::Read> ByteSource for ReadSource<R> {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.inner.read_exact(&mut byte) {
            Ok(()) => Some(byte[0]),
            Err(_) => None,
        }
    }

    fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let mut total = 0;
        while total < dst.len() {
            match self.inner.read(&mut dst[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(_) => break,
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_get_span_advance_commits_prefix() {
        let mut w = Writer::new();
        {
            let span = w.get_span(8);
            span[..3].copy_from_slice(b"abc");
        }
        w.advance(3);
        assert_eq!(w.as_slice(), b"abc");
    }

    #[test]
    fn slice_source_reads_and_skips() {
        let data = [1u8, 2, 3, 4, 5];
        let mut src = SliceSource::new(&data);
        assert_eq!(src.read_byte(), Some(1));
        assert_eq!(src.skip_forward(2), 2);
        let mut dst = [0u8; 2];
        assert_eq!(src.read_into(&mut dst), 2);
        assert_eq!(dst, [4, 5]);
        assert_eq!(src.read_byte(), None);
    }

    #[test]
    fn read_source_wraps_std_read() {
        let data = vec![9u8, 8, 7];
        let mut src = ReadSource::new(std::io::Cursor::new(data));
        assert_eq!(src.read_byte(), Some(9));
        let mut dst = [0u8; 2];
        assert_eq!(src.read_into(&mut dst), 2);
        assert_eq!(dst, [8, 7]);
    }
}
