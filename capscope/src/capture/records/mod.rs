//! Typed views over the payload of each record kind.
//!
//! Every view is a `Copy` wrapper around a [`Frame`](super::Frame) and reads
//! its fields lazily through the frame's [`ByteWindow`](super::ByteWindow).
//! Nothing is decoded until an accessor is called.

/// Declares a view type over a single record kind together with the accessors
/// every view shares.
macro_rules! record_view {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name<'a> {
            frame: $crate::capture::Frame<'a>,
        }

        impl<'a> $name<'a> {
            #[must_use]
            pub fn new(frame: $crate::capture::Frame<'a>) -> Self {
                Self { frame }
            }

            #[must_use]
            pub fn frame(&self) -> $crate::capture::Frame<'a> {
                self.frame
            }

            #[must_use]
            pub fn time(&self) -> $crate::domain::Timestamp {
                self.frame.time()
            }

            #[must_use]
            pub fn pid(&self) -> $crate::domain::Pid {
                self.frame.pid()
            }

            /// Position on the document timeline.
            #[must_use]
            pub fn position(&self) -> u32 {
                self.frame.position()
            }

            #[must_use]
            pub fn window(&self) -> $crate::capture::ByteWindow<'a> {
                self.frame.window()
            }
        }
    };
}

mod counter;
mod dbus;
mod file_chunk;
mod jitmap;
mod mark;
mod mmap;
mod overlay;
mod process;
mod stack;

pub use counter::{
    CounterDefineRecord, CounterDefinition, CounterKind, CounterSetRecord, CounterSetValues, CounterValue,
    RawCounterValue,
};
pub use dbus::{BusType, DBusMessageRecord};
pub use file_chunk::FileChunkRecord;
pub use jitmap::{JitmapMappings, JitmapRecord};
pub use mark::{LogRecord, LogSeverity, MarkRecord, MetadataRecord};
pub use mmap::MapRecord;
pub use overlay::OverlayRecord;
pub use process::{ForkRecord, ProcessRecord};
pub use stack::{AllocationRecord, SampleRecord, TraceRecord, Traceable};
