//! Chunks of files embedded into the capture (e.g. `/proc/mounts`).

use capscope_common::file_chunk;

use crate::capture::Endianness;

record_view! {
    /// One chunk of an embedded file. Chunks sharing a path are concatenated
    /// in timeline order until one is flagged as last.
    FileChunkRecord
}

impl<'a> FileChunkRecord<'a> {
    #[must_use]
    pub fn path(&self) -> Option<&'a str> {
        let window = self.window();
        // Only paths terminated inside the field are usable as keys.
        let field = window.slice(file_chunk::PATH, file_chunk::PATH_LEN)?;
        let nul = field.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&field[..nul]).ok()
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        let flags = self.window().u8(file_chunk::FLAGS).unwrap_or_default();
        let mask = match self.window().endian() {
            Endianness::Little => 0x01,
            Endianness::Big => 0x80,
        };
        flags & mask != 0
    }

    /// Payload bytes, never extending past the record.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        let window = self.window();
        let declared = usize::from(window.u16(file_chunk::LEN).unwrap_or_default());
        let available = window.len().saturating_sub(file_chunk::DATA);
        window.slice(file_chunk::DATA, declared.min(available)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::RecordBytes;
    use super::*;
    use capscope_common as wire;

    #[test]
    fn test_chunk_fields() {
        for (endian, flag) in [(Endianness::Little, 0x01), (Endianness::Big, 0x80)] {
            let mut rec = RecordBytes::new(wire::FRAME_FILE_CHUNK, 296, endian);
            rec.bytes[file_chunk::FLAGS] = flag;
            rec.put_u16(file_chunk::LEN, 5).put_str(file_chunk::PATH, "/proc/cpuinfo\0").put_str(file_chunk::DATA, "hello");
            let c = FileChunkRecord::new(rec.frame());
            assert_eq!(c.path(), Some("/proc/cpuinfo"));
            assert!(c.is_last());
            assert_eq!(c.data(), b"hello");
        }
    }

    #[test]
    fn test_oversized_len_clamped() {
        let mut rec = RecordBytes::new(wire::FRAME_FILE_CHUNK, 288, Endianness::Little);
        rec.put_u16(file_chunk::LEN, 4000).put_str(file_chunk::PATH, "/x\0");
        let c = FileChunkRecord::new(rec.frame());
        assert_eq!(c.data().len(), 4);
        assert!(!c.is_last());
    }

    #[test]
    fn test_unterminated_path_is_absent() {
        let mut rec = RecordBytes::new(wire::FRAME_FILE_CHUNK, 288, Endianness::Little);
        rec.bytes[file_chunk::PATH..file_chunk::DATA].fill(b'a');
        assert_eq!(FileChunkRecord::new(rec.frame()).path(), None);
    }
}
