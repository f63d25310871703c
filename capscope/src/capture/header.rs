//! Fixed file header at the start of every capture.

use capscope_common::{self as wire, header};
use log::warn;

use super::bytes::{ByteWindow, Endianness};
use crate::domain::{CaptureError, TimeSpan};

/// Decoded file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHeader {
    pub endian: Endianness,
    pub version: u8,
    /// Wall-clock time the recording started, as written (ISO-8601).
    pub capture_time: String,
    /// Monotonic clock at the start of the recording.
    pub time: i64,
    /// Monotonic clock at the end of the recording, 0 if never written.
    pub end_time: i64,
}

impl CaptureHeader {
    /// Decode the header from the start of a capture.
    ///
    /// # Errors
    /// Returns [`CaptureError::HeaderTooShort`] if `data` cannot hold a header.
    pub fn parse(data: &[u8]) -> Result<Self, CaptureError> {
        if data.len() < wire::CAPTURE_HEADER_SIZE {
            return Err(CaptureError::HeaderTooShort {
                len: data.len(),
                expected: wire::CAPTURE_HEADER_SIZE,
            });
        }

        let flags = data[header::FLAGS];
        let endian = if flags & 0x01 != 0 { Endianness::Little } else { Endianness::Big };
        let window = ByteWindow::new(&data[..wire::CAPTURE_HEADER_SIZE], endian);

        let magic = window.u32(header::MAGIC).unwrap_or_default();
        if magic != wire::CAPTURE_MAGIC {
            warn!("Capture magic 0x{magic:08x} does not match, reading anyway as {endian}");
        }

        Ok(Self {
            endian,
            version: data[header::VERSION],
            capture_time: window
                .fixed_str(header::CAPTURE_TIME, header::CAPTURE_TIME_LEN)
                .unwrap_or_default()
                .to_string(),
            time: window.i64(header::TIME).unwrap_or_default(),
            end_time: window.i64(header::END_TIME).unwrap_or_default(),
        })
    }

    /// Whether records must be byte-swapped on this host.
    #[must_use]
    pub fn needs_swap(&self) -> bool {
        self.endian.needs_swap()
    }

    /// Time span as declared by the writer, before post-load widening.
    #[must_use]
    pub fn time_span(&self) -> TimeSpan {
        TimeSpan::new(self.time, self.end_time.max(self.time))
    }
}
