//! Memory mapping records.

use capscope_common::map;

record_view! {
    /// A file (or anonymous region) mapped into a process's address space.
    MapRecord
}

impl<'a> MapRecord<'a> {
    #[must_use]
    pub fn start(&self) -> u64 {
        self.window().u64(map::START).unwrap_or_default()
    }

    /// Exclusive end address.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.window().u64(map::END).unwrap_or_default()
    }

    /// Offset of `start` within the backing file.
    #[must_use]
    pub fn file_offset(&self) -> u64 {
        self.window().u64(map::OFFSET).unwrap_or_default()
    }

    #[must_use]
    pub fn inode(&self) -> u64 {
        self.window().u64(map::INODE).unwrap_or_default()
    }

    /// Path of the backing file as seen by the process.
    #[must_use]
    pub fn file(&self) -> Option<&'a str> {
        self.window().cstr(map::FILENAME)
    }

    /// Build id stored as `@<id>` right after the file name's terminator.
    #[must_use]
    pub fn build_id(&self) -> Option<&'a str> {
        let name_len = self.window().cstr_bytes(map::FILENAME)?.len();
        let rest = self.window().cstr(map::FILENAME + name_len + 1)?;
        rest.strip_prefix('@')
    }

    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address >= self.start() && address < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::RecordBytes;
    use super::*;
    use crate::capture::Endianness;
    use capscope_common as wire;

    #[test]
    fn test_map_fields_and_build_id() {
        for endian in [Endianness::Little, Endianness::Big] {
            let mut rec = RecordBytes::new(wire::FRAME_MAP, 96, endian);
            rec.put_u64(map::START, 0x1000)
                .put_u64(map::END, 0x2000)
                .put_u64(map::OFFSET, 0x400)
                .put_u64(map::INODE, 99)
                .put_str(map::FILENAME, "/usr/bin/app\0@abc123\0");
            let m = MapRecord::new(rec.frame());
            assert_eq!(m.start(), 0x1000);
            assert_eq!(m.end(), 0x2000);
            assert_eq!(m.file_offset(), 0x400);
            assert_eq!(m.inode(), 99);
            assert_eq!(m.file(), Some("/usr/bin/app"));
            assert_eq!(m.build_id(), Some("abc123"));
            assert!(m.contains(0x1fff));
            assert!(!m.contains(0x2000));
        }
    }

    #[test]
    fn test_unterminated_filename_is_absent() {
        let mut rec = RecordBytes::new(wire::FRAME_MAP, 64, Endianness::Little);
        rec.put_str(map::FILENAME, "/usr/lib");
        let m = MapRecord::new(rec.frame());
        assert_eq!(m.file(), None);
        assert_eq!(m.build_id(), None);
    }

    #[test]
    fn test_no_build_id() {
        let mut rec = RecordBytes::new(wire::FRAME_MAP, 72, Endianness::Little);
        rec.put_str(map::FILENAME, "/lib/libc.so\0");
        assert_eq!(MapRecord::new(rec.frame()).build_id(), None);
    }
}
