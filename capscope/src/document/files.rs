//! Files embedded in the capture, reassembled from their chunks.

use flate2::read::GzDecoder;
use std::io::{self, Read};

use crate::capture::records::FileChunkRecord;

/// An embedded file. Chunks are kept as views into the capture and are only
/// concatenated (and decompressed) when read.
#[derive(Debug, Clone)]
pub struct DocumentFile<'d> {
    path: String,
    chunks: Vec<FileChunkRecord<'d>>,
    compressed: bool,
}

impl<'d> DocumentFile<'d> {
    pub(crate) fn new(path: impl Into<String>, chunks: Vec<FileChunkRecord<'d>>, compressed: bool) -> Self {
        Self { path: path.into(), chunks, compressed }
    }

    /// Path as recorded, without any `.gz` suffix.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the stored chunks are gzip-compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    #[must_use]
    pub fn chunks(&self) -> &[FileChunkRecord<'d>] {
        &self.chunks
    }

    /// Stored size in bytes, before decompression.
    #[must_use]
    pub fn stored_size(&self) -> usize {
        self.chunks.iter().map(|c| c.data().len()).sum()
    }

    /// The file contents, decompressed if needed.
    ///
    /// # Errors
    /// Fails if a compressed file is not valid gzip.
    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        let mut raw = Vec::with_capacity(self.stored_size());
        for chunk in &self.chunks {
            raw.extend_from_slice(chunk.data());
        }
        if !self.compressed {
            return Ok(raw);
        }
        let mut out = Vec::new();
        GzDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
        Ok(out)
    }

    /// The file contents as text; invalid UTF-8 is replaced.
    ///
    /// # Errors
    /// Same as [`read_bytes`](Self::read_bytes).
    pub fn read_to_string(&self) -> io::Result<String> {
        let bytes = self.read_bytes()?;
        Ok(String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
    }
}
