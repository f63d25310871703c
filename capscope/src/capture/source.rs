//! Backing storage for a loaded capture.

use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::ops::Deref;
use std::path::Path;

/// The bytes of a capture, either mapped from disk or held in memory.
#[derive(Debug)]
pub enum CaptureData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl CaptureData {
    /// Map `path` read-only.
    ///
    /// # Errors
    /// Fails if the file cannot be opened or mapped.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is read-only and captures are not modified while
        // being analyzed. A concurrent writer truncating the file is outside what
        // the reader can defend against.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self::Mapped(mmap))
    }
}

impl From<Vec<u8>> for CaptureData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Owned(bytes)
    }
}

impl Deref for CaptureData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(m) => m,
            Self::Owned(v) => v,
        }
    }
}

impl AsRef<[u8]> for CaptureData {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_maps_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"capture bytes").unwrap();
        let data = CaptureData::open(file.path()).unwrap();
        assert_eq!(&data[..], b"capture bytes");
    }

    #[test]
    fn test_owned() {
        let data = CaptureData::from(vec![1, 2, 3]);
        assert_eq!(data.len(), 3);
    }
}
