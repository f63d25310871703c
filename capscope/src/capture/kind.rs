//! The closed set of record kinds.

use capscope_common as wire;
use std::fmt;

/// Kind tag stored in byte 16 of every record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameKind {
    Timestamp,
    Sample,
    Map,
    Process,
    Fork,
    Exit,
    Jitmap,
    CounterDefine,
    CounterSet,
    Mark,
    Metadata,
    Log,
    FileChunk,
    Allocation,
    Overlay,
    Trace,
    DBusMessage,
}

impl FrameKind {
    /// Every kind, in tag order.
    pub const ALL: [FrameKind; 17] = [
        Self::Timestamp,
        Self::Sample,
        Self::Map,
        Self::Process,
        Self::Fork,
        Self::Exit,
        Self::Jitmap,
        Self::CounterDefine,
        Self::CounterSet,
        Self::Mark,
        Self::Metadata,
        Self::Log,
        Self::FileChunk,
        Self::Allocation,
        Self::Overlay,
        Self::Trace,
        Self::DBusMessage,
    ];

    /// Kinds whose timestamps describe recorded activity rather than
    /// bookkeeping. Used to widen the end of the time span after loading.
    pub const DATA_BEARING: [FrameKind; 11] = [
        Self::Allocation,
        Self::CounterSet,
        Self::DBusMessage,
        Self::Exit,
        Self::Fork,
        Self::Log,
        Self::Map,
        Self::Mark,
        Self::Process,
        Self::Sample,
        Self::Trace,
    ];

    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            wire::FRAME_TIMESTAMP => Self::Timestamp,
            wire::FRAME_SAMPLE => Self::Sample,
            wire::FRAME_MAP => Self::Map,
            wire::FRAME_PROCESS => Self::Process,
            wire::FRAME_FORK => Self::Fork,
            wire::FRAME_EXIT => Self::Exit,
            wire::FRAME_JITMAP => Self::Jitmap,
            wire::FRAME_CTRDEF => Self::CounterDefine,
            wire::FRAME_CTRSET => Self::CounterSet,
            wire::FRAME_MARK => Self::Mark,
            wire::FRAME_METADATA => Self::Metadata,
            wire::FRAME_LOG => Self::Log,
            wire::FRAME_FILE_CHUNK => Self::FileChunk,
            wire::FRAME_ALLOCATION => Self::Allocation,
            wire::FRAME_OVERLAY => Self::Overlay,
            wire::FRAME_TRACE => Self::Trace,
            wire::FRAME_DBUS_MESSAGE => Self::DBusMessage,
            _ => return None,
        })
    }

    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Timestamp => wire::FRAME_TIMESTAMP,
            Self::Sample => wire::FRAME_SAMPLE,
            Self::Map => wire::FRAME_MAP,
            Self::Process => wire::FRAME_PROCESS,
            Self::Fork => wire::FRAME_FORK,
            Self::Exit => wire::FRAME_EXIT,
            Self::Jitmap => wire::FRAME_JITMAP,
            Self::CounterDefine => wire::FRAME_CTRDEF,
            Self::CounterSet => wire::FRAME_CTRSET,
            Self::Mark => wire::FRAME_MARK,
            Self::Metadata => wire::FRAME_METADATA,
            Self::Log => wire::FRAME_LOG,
            Self::FileChunk => wire::FRAME_FILE_CHUNK,
            Self::Allocation => wire::FRAME_ALLOCATION,
            Self::Overlay => wire::FRAME_OVERLAY,
            Self::Trace => wire::FRAME_TRACE,
            Self::DBusMessage => wire::FRAME_DBUS_MESSAGE,
        }
    }

    /// Dense index in `0..ALL.len()`, for per-kind tables.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.tag() - 1)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Sample => "sample",
            Self::Map => "map",
            Self::Process => "process",
            Self::Fork => "fork",
            Self::Exit => "exit",
            Self::Jitmap => "jitmap",
            Self::CounterDefine => "counter-define",
            Self::CounterSet => "counter-set",
            Self::Mark => "mark",
            Self::Metadata => "metadata",
            Self::Log => "log",
            Self::FileChunk => "file-chunk",
            Self::Allocation => "allocation",
            Self::Overlay => "overlay",
            Self::Trace => "trace",
            Self::DBusMessage => "dbus-message",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
