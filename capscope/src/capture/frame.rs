//! Generic record view and dispatch to the per-kind decoders.

use capscope_common::{self as wire, frame as hdr};
use std::fmt;

use super::bytes::{ByteWindow, Endianness};
use super::kind::FrameKind;
use super::records::{
    AllocationRecord, CounterDefineRecord, CounterSetRecord, DBusMessageRecord, FileChunkRecord,
    ForkRecord, JitmapRecord, LogRecord, MapRecord, MarkRecord, MetadataRecord, OverlayRecord,
    ProcessRecord, SampleRecord, TraceRecord, Traceable,
};
use crate::domain::{CpuId, Pid, Timestamp};

/// Location of one record inside the capture bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePointer {
    pub offset: usize,
    pub len: u16,
}

impl FramePointer {
    /// Byte range covered by the record.
    #[must_use]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + usize::from(self.len)
    }
}

/// One record of the capture, positioned on the sorted timeline.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    position: u32,
    window: ByteWindow<'a>,
}

impl<'a> Frame<'a> {
    /// Wrap the bytes of a single record. `bytes` must be exactly the record.
    #[must_use]
    pub fn new(position: u32, bytes: &'a [u8], endian: Endianness) -> Self {
        Self { position, window: ByteWindow::new(bytes, endian) }
    }

    /// Index of this record in the document's time-sorted timeline.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    #[must_use]
    pub fn window(&self) -> ByteWindow<'a> {
        self.window
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Raw kind tag; single byte, never swapped.
    #[must_use]
    pub fn raw_kind(&self) -> u8 {
        self.window.u8(hdr::TYPE).unwrap_or_default()
    }

    #[must_use]
    pub fn kind(&self) -> Option<FrameKind> {
        FrameKind::from_tag(self.raw_kind())
    }

    #[must_use]
    pub fn cpu(&self) -> CpuId {
        CpuId(i32::from(self.window.i16(hdr::CPU).unwrap_or(-1)))
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        Pid(self.window.i32(hdr::PID).unwrap_or_default())
    }

    #[must_use]
    pub fn time(&self) -> Timestamp {
        Timestamp(self.window.i64(hdr::TIME).unwrap_or_default())
    }

    /// Decode the kind-specific payload.
    #[must_use]
    pub fn record(&self) -> Record<'a> {
        let frame = *self;
        match self.kind() {
            Some(FrameKind::Timestamp) => Record::Timestamp(frame),
            Some(FrameKind::Sample) => Record::Sample(SampleRecord::new(frame)),
            Some(FrameKind::Map) => Record::Map(MapRecord::new(frame)),
            Some(FrameKind::Process) => Record::Process(ProcessRecord::new(frame)),
            Some(FrameKind::Fork) => Record::Fork(ForkRecord::new(frame)),
            Some(FrameKind::Exit) => Record::Exit(frame),
            Some(FrameKind::Jitmap) => Record::Jitmap(JitmapRecord::new(frame)),
            Some(FrameKind::CounterDefine) => Record::CounterDefine(CounterDefineRecord::new(frame)),
            Some(FrameKind::CounterSet) => Record::CounterSet(CounterSetRecord::new(frame)),
            Some(FrameKind::Mark) => Record::Mark(MarkRecord::new(frame)),
            Some(FrameKind::Metadata) => Record::Metadata(MetadataRecord::new(frame)),
            Some(FrameKind::Log) => Record::Log(LogRecord::new(frame)),
            Some(FrameKind::FileChunk) => Record::FileChunk(FileChunkRecord::new(frame)),
            Some(FrameKind::Allocation) => Record::Allocation(AllocationRecord::new(frame)),
            Some(FrameKind::Overlay) => Record::Overlay(OverlayRecord::new(frame)),
            Some(FrameKind::Trace) => Record::Trace(TraceRecord::new(frame)),
            Some(FrameKind::DBusMessage) => Record::DBusMessage(DBusMessageRecord::new(frame)),
            None => Record::Unknown(frame),
        }
    }

    /// The record as a stack-carrying traceable, if it is one.
    #[must_use]
    pub fn traceable(&self) -> Option<Traceable<'a>> {
        match self.kind()? {
            FrameKind::Sample => Some(Traceable::Sample(SampleRecord::new(*self))),
            FrameKind::Allocation => Some(Traceable::Allocation(AllocationRecord::new(*self))),
            _ => None,
        }
    }

    /// Typed accessor shortcuts used throughout the document layer.
    #[must_use]
    pub fn as_mark(&self) -> Option<MarkRecord<'a>> {
        (self.raw_kind() == wire::FRAME_MARK).then(|| MarkRecord::new(*self))
    }

    #[must_use]
    pub fn as_file_chunk(&self) -> Option<FileChunkRecord<'a>> {
        (self.raw_kind() == wire::FRAME_FILE_CHUNK).then(|| FileChunkRecord::new(*self))
    }

    #[must_use]
    pub fn as_process(&self) -> Option<ProcessRecord<'a>> {
        (self.raw_kind() == wire::FRAME_PROCESS).then(|| ProcessRecord::new(*self))
    }

    #[must_use]
    pub fn as_map(&self) -> Option<MapRecord<'a>> {
        (self.raw_kind() == wire::FRAME_MAP).then(|| MapRecord::new(*self))
    }

    #[must_use]
    pub fn as_jitmap(&self) -> Option<JitmapRecord<'a>> {
        (self.raw_kind() == wire::FRAME_JITMAP).then(|| JitmapRecord::new(*self))
    }

    #[must_use]
    pub fn as_log(&self) -> Option<LogRecord<'a>> {
        (self.raw_kind() == wire::FRAME_LOG).then(|| LogRecord::new(*self))
    }
}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("position", &self.position)
            .field("kind", &self.kind())
            .field("len", &self.len())
            .field("time", &self.time().0)
            .field("pid", &self.pid().0)
            .finish()
    }
}

/// A record decoded by kind. Dispatch is a closed match on the kind tag.
#[derive(Debug, Clone, Copy)]
pub enum Record<'a> {
    Timestamp(Frame<'a>),
    Sample(SampleRecord<'a>),
    Map(MapRecord<'a>),
    Process(ProcessRecord<'a>),
    Fork(ForkRecord<'a>),
    Exit(Frame<'a>),
    Jitmap(JitmapRecord<'a>),
    CounterDefine(CounterDefineRecord<'a>),
    CounterSet(CounterSetRecord<'a>),
    Mark(MarkRecord<'a>),
    Metadata(MetadataRecord<'a>),
    Log(LogRecord<'a>),
    FileChunk(FileChunkRecord<'a>),
    Allocation(AllocationRecord<'a>),
    Overlay(OverlayRecord<'a>),
    Trace(TraceRecord<'a>),
    DBusMessage(DBusMessageRecord<'a>),
    Unknown(Frame<'a>),
}

impl<'a> Record<'a> {
    /// The undecoded record underneath.
    #[must_use]
    pub fn frame(&self) -> Frame<'a> {
        match self {
            Self::Timestamp(f) | Self::Exit(f) | Self::Unknown(f) => *f,
            Self::Sample(r) => r.frame(),
            Self::Map(r) => r.frame(),
            Self::Process(r) => r.frame(),
            Self::Fork(r) => r.frame(),
            Self::Jitmap(r) => r.frame(),
            Self::CounterDefine(r) => r.frame(),
            Self::CounterSet(r) => r.frame(),
            Self::Mark(r) => r.frame(),
            Self::Metadata(r) => r.frame(),
            Self::Log(r) => r.frame(),
            Self::FileChunk(r) => r.frame(),
            Self::Allocation(r) => r.frame(),
            Self::Overlay(r) => r.frame(),
            Self::Trace(r) => r.frame(),
            Self::DBusMessage(r) => r.frame(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(kind: u8, len: u16, endian: Endianness) -> Vec<u8> {
        let mut bytes = vec![0u8; usize::from(len)];
        match endian {
            Endianness::Little => {
                bytes[0..2].copy_from_slice(&len.to_le_bytes());
                bytes[2..4].copy_from_slice(&3i16.to_le_bytes());
                bytes[4..8].copy_from_slice(&42i32.to_le_bytes());
                bytes[8..16].copy_from_slice(&1500i64.to_le_bytes());
            }
            Endianness::Big => {
                bytes[0..2].copy_from_slice(&len.to_be_bytes());
                bytes[2..4].copy_from_slice(&3i16.to_be_bytes());
                bytes[4..8].copy_from_slice(&42i32.to_be_bytes());
                bytes[8..16].copy_from_slice(&1500i64.to_be_bytes());
            }
        }
        bytes[16] = kind;
        bytes
    }

    #[test]
    fn test_header_fields_both_orders() {
        for endian in [Endianness::Little, Endianness::Big] {
            let bytes = header(wire::FRAME_EXIT, 24, endian);
            let frame = Frame::new(0, &bytes, endian);
            assert_eq!(frame.kind(), Some(FrameKind::Exit));
            assert_eq!(frame.cpu(), CpuId(3));
            assert_eq!(frame.pid(), Pid(42));
            assert_eq!(frame.time(), Timestamp(1500));
            assert!(matches!(frame.record(), Record::Exit(_)));
        }
    }

    #[test]
    fn test_unknown_kind() {
        let bytes = header(99, 24, Endianness::Little);
        let frame = Frame::new(7, &bytes, Endianness::Little);
        assert_eq!(frame.kind(), None);
        assert!(matches!(frame.record(), Record::Unknown(f) if f.position() == 7));
        assert!(frame.traceable().is_none());
    }

    #[test]
    fn test_typed_shortcuts_check_kind() {
        let bytes = header(wire::FRAME_MARK, 96, Endianness::Little);
        let frame = Frame::new(0, &bytes, Endianness::Little);
        assert!(frame.as_mark().is_some());
        assert!(frame.as_process().is_none());
    }
}
