//! No-std `core::fmt::Write` targets for rendering text protocols.
//!
//! These let the AT-command and JSON renderers use `write!` without heap
//! allocation or the standard library.

use core::fmt;

/// Writes formatted text into a borrowed byte slice.
///
/// Fails with [`fmt::Error`] instead of truncating when the slice is full.
pub(crate) struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> SliceWriter<'a> {
    #[inline]
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes written so far.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.pos
    }

    /// Append raw bytes.
    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) -> fmt::Result {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }
}

impl fmt::Write for SliceWriter<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes())
    }
}

/// Counts bytes without storing them.
#[derive(Default)]
pub(crate) struct CountingWriter {
    count: usize,
}

impl CountingWriter {
    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.count
    }
}

impl fmt::Write for CountingWriter {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.count += s.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn test_slice_writer_fills_buffer() {
        let mut buf = [0u8; 8];
        let mut w = SliceWriter::new(&mut buf);
        write!(w, "AT+{}", 42).unwrap();
        let len = w.len();
        assert_eq!(&buf[..len], b"AT+42");
    }

    #[test]
    fn test_slice_writer_rejects_overflow() {
        let mut buf = [0u8; 4];
        let mut w = SliceWriter::new(&mut buf);
        assert!(w.write_str("AT+HTTPINIT").is_err());
        assert_eq!(w.len(), 0);
    }

    #[test]
    fn test_counting_writer() {
        let mut w = CountingWriter::default();
        write!(w, "{}:{}", 6.5, "Moderate").unwrap();
        assert_eq!(w.count(), "6.5:Moderate".len());
    }
}
