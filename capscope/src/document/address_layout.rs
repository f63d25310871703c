//! Reconstructed process address spaces.
//!
//! Map records tell us which file backs each range of a process's virtual
//! address space. Symbolizers use this to turn a runtime address into a
//! (file, file-relative address) pair.
//!
//! ## Address Translation
//!
//! ```text
//! runtime address  0x55f3a2b4c780
//! mapping          0x55f3a2b4c000 - 0x55f3a2b5f000  offset 0x1000  /usr/bin/app
//! file address     0x55f3a2b4c780 - 0x55f3a2b4c000 + 0x1000 = 0x1780
//! ```

use log::debug;

use crate::capture::records::MapRecord;

/// Half-open range `[start, end)` of virtual addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// One file mapping of a process, copied out of a Map record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub range: MemoryRange,
    /// Offset of `range.start` within the file.
    pub file_offset: u64,
    pub inode: u64,
    pub file: String,
    pub build_id: Option<String>,
}

impl Mapping {
    #[must_use]
    pub fn from_record(record: &MapRecord<'_>) -> Self {
        Self {
            range: MemoryRange { start: record.start(), end: record.end() },
            file_offset: record.file_offset(),
            inode: record.inode(),
            file: record.file().unwrap_or_default().to_string(),
            build_id: record.build_id().map(str::to_string),
        }
    }

    /// Address relative to the start of the backing file.
    #[must_use]
    pub fn file_relative(&self, address: u64) -> u64 {
        address.wrapping_sub(self.range.start).wrapping_add(self.file_offset)
    }
}

/// Non-overlapping, sorted set of mappings for one process.
#[derive(Debug, Clone, Default)]
pub struct AddressLayout {
    mappings: Vec<Mapping>,
    sealed: bool,
}

impl AddressLayout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mapping: Mapping) {
        self.mappings.push(mapping);
        self.sealed = false;
    }

    /// Sort by `(start, end)` and drop every mapping that overlaps the one
    /// after it, so the newest view of a range wins. Idempotent.
    pub fn seal(&mut self) {
        if self.sealed {
            return;
        }
        self.mappings.sort_by_key(|m| m.range);

        let mut i = 0;
        while i + 1 < self.mappings.len() {
            let (a, b) = (self.mappings[i].range, self.mappings[i + 1].range);
            if a.start <= b.start && a.end > b.start {
                debug!("Dropping mapping 0x{:x}-0x{:x} overlapping 0x{:x}", a.start, a.end, b.start);
                self.mappings.remove(i);
            } else {
                i += 1;
            }
        }
        self.sealed = true;
    }

    /// The mapping containing `address`. The layout must be sealed.
    #[must_use]
    pub fn lookup(&self, address: u64) -> Option<&Mapping> {
        let idx = self.mappings.partition_point(|m| m.range.start <= address);
        let candidate = self.mappings.get(idx.checked_sub(1)?)?;
        candidate.range.contains(address).then_some(candidate)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(start: u64, end: u64, file: &str) -> Mapping {
        Mapping {
            range: MemoryRange { start, end },
            file_offset: 0x1000,
            inode: 0,
            file: file.to_string(),
            build_id: None,
        }
    }

    #[test]
    fn test_memory_range_contains() {
        let range = MemoryRange { start: 0x1000, end: 0x2000 };

        assert!(range.contains(0x1000));
        assert!(range.contains(0x1500));
        assert!(range.contains(0x1FFF));
        assert!(!range.contains(0x0FFF));
        assert!(!range.contains(0x2000));
        assert_eq!(range.len(), 0x1000);
    }

    #[test]
    fn test_lookup_sorted() {
        let mut layout = AddressLayout::new();
        layout.push(mapping(0x5000, 0x6000, "/lib/b.so"));
        layout.push(mapping(0x1000, 0x2000, "/lib/a.so"));
        layout.seal();

        assert_eq!(layout.lookup(0x1800).map(|m| m.file.as_str()), Some("/lib/a.so"));
        assert_eq!(layout.lookup(0x5fff).map(|m| m.file.as_str()), Some("/lib/b.so"));
        assert!(layout.lookup(0x2000).is_none());
        assert!(layout.lookup(0x10).is_none());
        assert!(layout.lookup(0x9000).is_none());
    }

    #[test]
    fn test_overlap_keeps_later_start() {
        let mut layout = AddressLayout::new();
        layout.push(mapping(0x1000, 0x3000, "/old"));
        layout.push(mapping(0x2000, 0x4000, "/new"));
        layout.seal();
        assert_eq!(layout.len(), 1);
        assert_eq!(layout.lookup(0x2500).map(|m| m.file.as_str()), Some("/new"));
    }

    #[test]
    fn test_file_relative() {
        let m = mapping(0x7f00_0000, 0x7f10_0000, "/lib/c.so");
        assert_eq!(m.file_relative(0x7f00_0780), 0x1780);
    }
}
