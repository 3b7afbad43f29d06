// Seekable byte source for SIS decoding.
//
// All multi-byte fields in a SIS file are little-endian. Every integer read
// goes through `from_le_bytes`, so decoding is independent of host order.
//
// Offset-indirected fields (names, strings, payloads) are read with
// `read_at`, which puts the cursor back where it was on every exit path.
// The file-table walker relies on that: decoding a name inside a record
// inside a conditional must not move the walker.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use super::error::{Result, SisError};

// ---------------------------------------------------------------------------
// ByteSource
// ---------------------------------------------------------------------------

/// Bounds-checked little-endian reader over a seekable stream.
///
/// The stream length is sampled once at construction; every read and seek is
/// validated against it before any buffer is allocated.
#[derive(Debug)]
pub struct ByteSource<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> ByteSource<R> {
    /// Wrap a stream, measuring its length and rewinding to the start.
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner
            .seek(SeekFrom::End(0))
            .map_err(|source| SisError::Seek { offset: 0, source })?;
        inner
            .seek(SeekFrom::Start(0))
            .map_err(|source| SisError::Seek { offset: 0, source })?;
        Ok(Self { inner, len })
    }

    /// Total stream length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current absolute position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Move the cursor to an absolute offset inside the stream.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.len {
            return Err(SisError::OffsetOutOfRange {
                offset,
                len: self.len,
            });
        }
        self.inner
            .seek(SeekFrom::Start(offset))
            .map_err(|source| SisError::Seek { offset, source })?;
        Ok(())
    }

    /// Read exactly `n` bytes at the current position.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let start = self.position()?;
        let available = self.len.saturating_sub(start);
        if (n as u64) > available {
            return Err(SisError::ShortRead {
                wanted: n,
                got: available as usize,
                offset: self.len,
            });
        }
        let mut buf = alloc_buffer(n)?;
        buf.resize(n, 0);
        self.fill(&mut buf, start)?;
        Ok(buf)
    }

    /// Read a fixed-size array at the current position.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        let start = self.position()?;
        self.fill(&mut buf, start)?;
        Ok(buf)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read `count` consecutive `u32` words.
    pub fn read_u32_vec(&mut self, count: usize) -> Result<Vec<u32>> {
        let mut words = Vec::new();
        words
            .try_reserve_exact(count)
            .map_err(|_| SisError::OutOfMemory {
                len: count.saturating_mul(4),
            })?;
        for _ in 0..count {
            words.push(self.read_u32()?);
        }
        Ok(words)
    }

    /// Run `f` with the cursor at `offset`, then restore the previous
    /// position whether `f` succeeded or not.
    ///
    /// When both `f` and the restore fail, the error from `f` wins.
    pub fn at<T>(&mut self, offset: u64, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.position()?;
        let result = self.seek(offset).and_then(|()| f(self));
        let restored = self
            .inner
            .seek(SeekFrom::Start(saved))
            .map_err(|source| SisError::Seek {
                offset: saved,
                source,
            });
        let value = result?;
        restored?;
        Ok(value)
    }

    /// Read `n` bytes at an absolute offset without disturbing the cursor.
    ///
    /// Zero-length reads return immediately and never seek.
    pub fn read_at(&mut self, offset: u64, n: usize) -> Result<Vec<u8>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        self.at(offset, |src| src.read_exact(n))
    }

    /// Read an offset-indirected double-byte text field.
    ///
    /// SIS text stores one 16-bit unit per character. Only the low byte of
    /// each unit is kept, so characters above U+00FF come out wrong; the
    /// result has `len / 2` characters, each interpreted as Latin-1.
    pub fn read_text(&mut self, len: u32, offset: u32) -> Result<String> {
        let raw = self.read_at(u64::from(offset), len as usize)?;
        Ok(narrow_text(&raw))
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self, buf: &mut [u8], start: u64) -> Result<()> {
        let mut got = 0;
        while got < buf.len() {
            match self.inner.read(&mut buf[got..]) {
                Ok(0) => {
                    return Err(SisError::ShortRead {
                        wanted: buf.len(),
                        got,
                        offset: start + got as u64,
                    });
                }
                Ok(n) => got += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(SisError::Io(e)),
            }
        }
        Ok(())
    }
}

/// Allocate an empty buffer with room for `len` bytes, reporting failure
/// instead of aborting.
pub(crate) fn alloc_buffer(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SisError::OutOfMemory { len })?;
    Ok(buf)
}

/// Collapse double-byte units to single-byte characters (low byte kept).
pub fn narrow_text(raw: &[u8]) -> String {
    raw.chunks_exact(2).map(|unit| char::from(unit[0])).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(bytes: &[u8]) -> ByteSource<Cursor<Vec<u8>>> {
        ByteSource::new(Cursor::new(bytes.to_vec())).unwrap()
    }

    #[test]
    fn integers_are_little_endian() {
        let mut src = source(&[0x34, 0x12, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(src.read_u16().unwrap(), 0x1234);
        assert_eq!(src.read_u32().unwrap(), 0x1234_5678);
    }

    #[test]
    fn short_read_reports_counts() {
        let mut src = source(&[1, 2, 3]);
        src.seek(1).unwrap();
        match src.read_exact(4) {
            Err(SisError::ShortRead { wanted, got, offset }) => {
                assert_eq!((wanted, got, offset), (4, 2, 3));
            }
            other => panic!("unexpected: {other:?}"),
        }
        match src.read_u32() {
            Err(SisError::ShortRead { wanted, got, .. }) => assert_eq!((wanted, got), (4, 2)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn read_at_restores_position() {
        let mut src = source(b"abcdefgh");
        src.seek(2).unwrap();
        assert_eq!(src.read_at(5, 3).unwrap(), b"fgh");
        assert_eq!(src.position().unwrap(), 2);
        assert_eq!(src.read_exact(2).unwrap(), b"cd");
    }

    #[test]
    fn read_at_restores_position_on_error() {
        let mut src = source(b"abcdefgh");
        src.seek(3).unwrap();
        assert!(src.read_at(6, 10).is_err());
        assert_eq!(src.position().unwrap(), 3);
        assert!(matches!(
            src.read_at(100, 1),
            Err(SisError::OffsetOutOfRange { offset: 100, len: 8 })
        ));
        assert_eq!(src.position().unwrap(), 3);
    }

    #[test]
    fn nested_scoped_reads_unwind() {
        let mut src = source(b"0123456789");
        src.seek(1).unwrap();
        let inner = src
            .at(4, |s| {
                let first = s.read_exact(1)?;
                let deep = s.read_at(8, 2)?;
                let second = s.read_exact(1)?;
                Ok((first, deep, second))
            })
            .unwrap();
        assert_eq!(inner, (b"4".to_vec(), b"89".to_vec(), b"5".to_vec()));
        assert_eq!(src.position().unwrap(), 1);
    }

    #[test]
    fn zero_length_read_skips_seek() {
        let mut src = source(b"ab");
        src.seek(1).unwrap();
        // An out-of-range offset is never visited for empty reads.
        assert!(src.read_at(9999, 0).unwrap().is_empty());
        assert_eq!(src.position().unwrap(), 1);
    }

    #[test]
    fn huge_length_fails_before_allocating() {
        let mut src = source(b"ab");
        assert!(matches!(
            src.read_at(0, usize::MAX),
            Err(SisError::ShortRead { got: 2, .. })
        ));
    }

    #[test]
    fn narrow_text_keeps_low_bytes() {
        assert_eq!(narrow_text(b"a\0.\0t\0x\0t\0"), "a.txt");
        assert_eq!(narrow_text(&[0x41, 0x04, 0x42]), "A");
        assert_eq!(narrow_text(&[0xE9, 0x00]), "\u{e9}");
    }

    #[test]
    fn read_text_halves_length() {
        let mut src = source(b"xxh\0i\0");
        assert_eq!(src.read_text(4, 2).unwrap(), "hi");
        assert_eq!(src.read_text(0, 0).unwrap(), "");
    }
}
