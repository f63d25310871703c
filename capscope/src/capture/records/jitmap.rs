//! JIT symbol maps: synthetic addresses handed out by a runtime, with names.

use capscope_common::jitmap;

use crate::capture::ByteWindow;

record_view! {
    JitmapRecord
}

impl<'a> JitmapRecord<'a> {
    /// Number of mappings the writer declared.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.window().u32(jitmap::N_JITMAPS).unwrap_or_default()
    }

    /// Mappings in record order, at most [`size`](Self::size) of them.
    /// Stops early on a truncated entry; trailing padding is never read.
    #[must_use]
    pub fn mappings(&self) -> JitmapMappings<'a> {
        JitmapMappings { window: self.window(), pos: jitmap::DATA, remaining: self.size() }
    }
}

/// Iterator over `(address, name)` pairs of a [`JitmapRecord`].
#[derive(Debug, Clone)]
pub struct JitmapMappings<'a> {
    window: ByteWindow<'a>,
    pos: usize,
    remaining: u32,
}

impl<'a> Iterator for JitmapMappings<'a> {
    type Item = (u64, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        // An address with no room left for even an empty name is not an entry.
        if self.remaining == 0 || self.pos + 8 >= self.window.len() {
            return None;
        }
        let address = self.window.u64(self.pos)?;
        let name_bytes = self.window.cstr_bytes(self.pos + 8)?;
        let name = std::str::from_utf8(name_bytes).ok()?;
        self.pos += 8 + name_bytes.len() + 1;
        self.remaining -= 1;
        Some((address, name))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::RecordBytes;
    use super::*;
    use crate::capture::Endianness;
    use capscope_common::{self as wire, JITMAP_ADDRESS_TAG};

    #[test]
    fn test_mappings() {
        let mut rec = RecordBytes::new(wire::FRAME_JITMAP, 64, Endianness::Little);
        rec.put_u32(jitmap::N_JITMAPS, 2)
            .put_u64(28, JITMAP_ADDRESS_TAG | 1)
            .put_str(36, "foo\0")
            .put_u64(40, JITMAP_ADDRESS_TAG | 2)
            .put_str(48, "barbaz\0");
        let j = JitmapRecord::new(rec.frame());
        assert_eq!(j.size(), 2);
        let maps: Vec<_> = j.mappings().collect();
        assert_eq!(maps, vec![(JITMAP_ADDRESS_TAG | 1, "foo"), (JITMAP_ADDRESS_TAG | 2, "barbaz")]);
    }

    #[test]
    fn test_unterminated_name_stops() {
        let mut rec = RecordBytes::new(wire::FRAME_JITMAP, 40, Endianness::Little);
        rec.put_u32(jitmap::N_JITMAPS, 1).put_u64(28, 5).put_str(36, "abcd");
        assert_eq!(JitmapRecord::new(rec.frame()).mappings().count(), 0);
    }
}
