//! Cursor-based little-endian codec for KAD datagrams.
//!
//! `ByteWriter` fills a caller-sized buffer; callers are expected to size it
//! up front and may use [`ByteWriter::check`] before writing. `ByteReader`
//! walks a received datagram and fails with
//! [`ProtoError::TruncatedMessage`] instead of reading past the end.

use crate::error::{ProtoError, Result};

/// Sequential writer over a fixed-capacity buffer
#[derive(Debug)]
pub struct ByteWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    /// Wrap a pre-sized buffer
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Whether `n` more bytes fit
    #[must_use]
    pub fn check(&self, n: usize) -> bool {
        self.pos
            .checked_add(n)
            .is_some_and(|end| end <= self.buf.len())
    }

    /// Bytes written so far
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    /// Current cursor position
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn reserve(&mut self, n: usize) -> Result<&mut [u8]> {
        if !self.check(n) {
            return Err(ProtoError::BufferFull {
                needed: n,
                remaining: self.buf.len() - self.pos,
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&mut self.buf[start..start + n])
    }

    /// Write one byte
    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.reserve(1)?[0] = v;
        Ok(())
    }

    /// Write a little-endian u16
    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a little-endian u32
    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a little-endian u64
    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a little-endian IEEE-754 f32
    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a raw byte range
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }
}

/// Sequential bounds-checked reader over a received buffer
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Start reading at the beginning of `buf`
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left to read
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Current cursor position
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Whether the whole buffer has been consumed
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `n` bytes and advance
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(ProtoError::truncated(n, self.remaining()));
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..start + n])
    }

    /// Read exactly `N` bytes into an array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Fill `dst` from the buffer
    pub fn read_into(&mut self, dst: &mut [u8]) -> Result<()> {
        dst.copy_from_slice(self.read_bytes(dst.len())?);
        Ok(())
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a little-endian u16
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian u32
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian u64
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian IEEE-754 f32
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Everything not yet consumed, advancing to the end
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_little_endian() {
        let mut buf = [0u8; 15];
        let mut w = ByteWriter::new(&mut buf);
        w.write_u8(0xAB).unwrap();
        w.write_u16(0x0102).unwrap();
        w.write_u32(0x0304_0506).unwrap();
        w.write_u64(0x0708_090A_0B0C_0D0E).unwrap();
        assert_eq!(w.position(), 15);
        assert_eq!(
            w.as_slice(),
            &[
                0xAB, 0x02, 0x01, 0x06, 0x05, 0x04, 0x03, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08,
                0x07
            ]
        );
    }

    #[test]
    fn test_writer_check_and_overflow() {
        let mut buf = [0u8; 3];
        let mut w = ByteWriter::new(&mut buf);
        assert!(w.check(3));
        assert!(!w.check(4));
        assert!(!w.check(usize::MAX));
        w.write_u16(7).unwrap();
        assert!(matches!(
            w.write_u16(8),
            Err(ProtoError::BufferFull {
                needed: 2,
                remaining: 1
            })
        ));
        // failed write leaves the cursor untouched
        assert_eq!(w.position(), 2);
    }

    #[test]
    fn test_reader_roundtrip_values() {
        let mut buf = [0u8; 4 + 8 + 4 + 3];
        let mut w = ByteWriter::new(&mut buf);
        w.write_u32(0xDEAD_BEEF).unwrap();
        w.write_u64(u64::MAX - 1).unwrap();
        w.write_f32(1.5).unwrap();
        w.write_bytes(b"abc").unwrap();

        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_u64().unwrap(), u64::MAX - 1);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_bytes(3).unwrap(), b"abc");
        assert!(r.is_empty());
    }

    #[test]
    fn test_reader_truncated() {
        let buf = [1u8, 2, 3];
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_u16().unwrap(), 0x0201);
        match r.read_u32() {
            Err(ProtoError::TruncatedMessage { needed, available }) => {
                assert_eq!(needed, 4);
                assert_eq!(available, 1);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        // cursor does not move on failure
        assert_eq!(r.read_u8().unwrap(), 3);
        assert!(r.read_u8().is_err());
    }

    #[test]
    fn test_read_into_and_rest() {
        let buf = [9u8, 8, 7, 6, 5];
        let mut r = ByteReader::new(&buf);
        let mut dst = [0u8; 2];
        r.read_into(&mut dst).unwrap();
        assert_eq!(dst, [9, 8]);
        assert_eq!(r.read_rest(), &[7, 6, 5]);
        assert_eq!(r.remaining(), 0);
    }

    proptest::proptest! {
        #[test]
        fn prop_write_then_read(a in proptest::prelude::any::<u8>(), b in proptest::prelude::any::<u16>(), c in proptest::prelude::any::<u32>(), d in proptest::prelude::any::<u64>()) {
            let mut buf = [0u8; 15];
            let mut w = ByteWriter::new(&mut buf);
            w.write_u8(a).unwrap();
            w.write_u16(b).unwrap();
            w.write_u32(c).unwrap();
            w.write_u64(d).unwrap();
            proptest::prop_assert!(!w.check(1));

            let mut r = ByteReader::new(&buf);
            proptest::prop_assert_eq!(r.read_u8().unwrap(), a);
            proptest::prop_assert_eq!(r.read_u16().unwrap(), b);
            proptest::prop_assert_eq!(r.read_u32().unwrap(), c);
            proptest::prop_assert_eq!(r.read_u64().unwrap(), d);
            proptest::prop_assert!(r.is_empty());
        }
    }
}
