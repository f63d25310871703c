//! Endian-aware, bounds-checked reads over one record's bytes.
//!
//! Every payload access in the crate goes through [`ByteWindow`]. A window
//! covers exactly one record, so a corrupt length or count field inside the
//! payload can at worst make a read come back `None`; it can never reach the
//! neighbouring record.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fmt;

/// Byte order a capture was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the machine running the analysis.
    pub const NATIVE: Self = if cfg!(target_endian = "little") { Self::Little } else { Self::Big };

    /// Whether values in this byte order must be swapped on this host.
    #[must_use]
    pub fn needs_swap(self) -> bool {
        self != Self::NATIVE
    }

    #[must_use]
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Self::Little => LittleEndian::read_u16(buf),
            Self::Big => BigEndian::read_u16(buf),
        }
    }

    #[must_use]
    pub fn read_i16(self, buf: &[u8]) -> i16 {
        match self {
            Self::Little => LittleEndian::read_i16(buf),
            Self::Big => BigEndian::read_i16(buf),
        }
    }

    #[must_use]
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Self::Little => LittleEndian::read_u32(buf),
            Self::Big => BigEndian::read_u32(buf),
        }
    }

    #[must_use]
    pub fn read_i32(self, buf: &[u8]) -> i32 {
        match self {
            Self::Little => LittleEndian::read_i32(buf),
            Self::Big => BigEndian::read_i32(buf),
        }
    }

    #[must_use]
    pub fn read_u64(self, buf: &[u8]) -> u64 {
        match self {
            Self::Little => LittleEndian::read_u64(buf),
            Self::Big => BigEndian::read_u64(buf),
        }
    }

    #[must_use]
    pub fn read_i64(self, buf: &[u8]) -> i64 {
        match self {
            Self::Little => LittleEndian::read_i64(buf),
            Self::Big => BigEndian::read_i64(buf),
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Little => write!(f, "little-endian"),
            Self::Big => write!(f, "big-endian"),
        }
    }
}

/// Typed view over `[record_start, record_start + len)`.
#[derive(Clone, Copy)]
pub struct ByteWindow<'a> {
    bytes: &'a [u8],
    endian: Endianness,
}

impl<'a> ByteWindow<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8], endian: Endianness) -> Self {
        Self { bytes, endian }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn endian(&self) -> Endianness {
        self.endian
    }

    /// The raw bytes of the whole window.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// `len` bytes at `offset`, if they lie entirely inside the window.
    #[must_use]
    pub fn slice(&self, offset: usize, len: usize) -> Option<&'a [u8]> {
        let end = offset.checked_add(len)?;
        self.bytes.get(offset..end)
    }

    /// Everything from `offset` to the end of the window.
    #[must_use]
    pub fn tail(&self, offset: usize) -> Option<&'a [u8]> {
        self.bytes.get(offset..)
    }

    #[must_use]
    pub fn u8(&self, offset: usize) -> Option<u8> {
        self.bytes.get(offset).copied()
    }

    #[must_use]
    pub fn u16(&self, offset: usize) -> Option<u16> {
        self.slice(offset, 2).map(|b| self.endian.read_u16(b))
    }

    #[must_use]
    pub fn i16(&self, offset: usize) -> Option<i16> {
        self.slice(offset, 2).map(|b| self.endian.read_i16(b))
    }

    #[must_use]
    pub fn u32(&self, offset: usize) -> Option<u32> {
        self.slice(offset, 4).map(|b| self.endian.read_u32(b))
    }

    #[must_use]
    pub fn i32(&self, offset: usize) -> Option<i32> {
        self.slice(offset, 4).map(|b| self.endian.read_i32(b))
    }

    #[must_use]
    pub fn u64(&self, offset: usize) -> Option<u64> {
        self.slice(offset, 8).map(|b| self.endian.read_u64(b))
    }

    #[must_use]
    pub fn i64(&self, offset: usize) -> Option<i64> {
        self.slice(offset, 8).map(|b| self.endian.read_i64(b))
    }

    /// Eight bytes exactly as stored, for values whose type is decided later.
    #[must_use]
    pub fn raw8(&self, offset: usize) -> Option<[u8; 8]> {
        let bytes = self.slice(offset, 8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(bytes);
        Some(out)
    }

    /// NUL-terminated bytes starting at `offset`.
    ///
    /// Returns `None` when no terminator occurs before the end of the window.
    #[must_use]
    pub fn cstr_bytes(&self, offset: usize) -> Option<&'a [u8]> {
        let rest = self.bytes.get(offset..)?;
        let nul = rest.iter().position(|&b| b == 0)?;
        Some(&rest[..nul])
    }

    /// NUL-terminated UTF-8 string starting at `offset`.
    ///
    /// Absent when unterminated within the window or not valid UTF-8.
    #[must_use]
    pub fn cstr(&self, offset: usize) -> Option<&'a str> {
        self.cstr_bytes(offset).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// String stored in a fixed-size field of `field_len` bytes.
    ///
    /// The terminator is searched for inside the field only; a field filled
    /// to the brim is taken whole. Absent if the field is cut off by the end
    /// of the window.
    #[must_use]
    pub fn fixed_str(&self, offset: usize, field_len: usize) -> Option<&'a str> {
        let field = self.slice(offset, field_len)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        std::str::from_utf8(&field[..end]).ok()
    }
}

impl fmt::Debug for ByteWindow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteWindow").field("len", &self.bytes.len()).field("endian", &self.endian).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_both_orders() {
        let le = [0x34, 0x12, 0, 0, 0, 0, 0, 0];
        let be = [0x12, 0x34, 0, 0, 0, 0, 0, 0];
        assert_eq!(ByteWindow::new(&le, Endianness::Little).u16(0), Some(0x1234));
        assert_eq!(ByteWindow::new(&be, Endianness::Big).u16(0), Some(0x1234));
        assert_eq!(ByteWindow::new(&le, Endianness::Little).u64(0), Some(0x1234));
    }

    #[test]
    fn test_out_of_window_reads_are_absent() {
        let bytes = [1u8, 2, 3];
        let window = ByteWindow::new(&bytes, Endianness::Little);
        assert_eq!(window.u32(0), None);
        assert_eq!(window.u16(2), None);
        assert_eq!(window.u8(3), None);
        assert_eq!(window.slice(usize::MAX, 2), None);
        assert_eq!(window.u16(1), Some(0x0302));
    }

    #[test]
    fn test_cstr_requires_terminator_inside_window() {
        let bytes = b"abc\0def";
        let window = ByteWindow::new(bytes, Endianness::Little);
        assert_eq!(window.cstr(0), Some("abc"));
        assert_eq!(window.cstr(4), None);
        assert_eq!(window.cstr(3), Some(""));
        assert_eq!(window.cstr(100), None);
    }

    #[test]
    fn test_fixed_str() {
        let bytes = b"ab\0\0wxyz";
        let window = ByteWindow::new(bytes, Endianness::Little);
        assert_eq!(window.fixed_str(0, 4), Some("ab"));
        assert_eq!(window.fixed_str(4, 4), Some("wxyz"));
        assert_eq!(window.fixed_str(4, 8), None);
    }

    #[test]
    fn test_native_never_swaps() {
        assert!(!Endianness::NATIVE.needs_swap());
    }
}
