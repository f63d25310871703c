//! Marks, log lines and metadata: the annotation records.

use capscope_common::{log, mark, metadata};
use std::fmt;

use crate::domain::{TimeSpan, Timestamp};

record_view! {
    /// A named interval within a group, with an optional message.
    MarkRecord
}

record_view! {
    /// A log line forwarded into the capture.
    LogRecord
}

record_view! {
    /// Free-form key/value metadata.
    MetadataRecord
}

impl<'a> MarkRecord<'a> {
    /// Duration in nanoseconds; 0 for instantaneous marks.
    #[must_use]
    pub fn duration(&self) -> i64 {
        self.window().i64(mark::DURATION).unwrap_or_default()
    }

    #[must_use]
    pub fn end_time(&self) -> Timestamp {
        Timestamp(self.time().0.saturating_add(self.duration()))
    }

    #[must_use]
    pub fn span(&self) -> TimeSpan {
        TimeSpan { begin: self.time(), end: self.end_time() }
    }

    #[must_use]
    pub fn group(&self) -> Option<&'a str> {
        self.window().fixed_str(mark::GROUP, mark::GROUP_LEN)
    }

    #[must_use]
    pub fn name(&self) -> Option<&'a str> {
        self.window().fixed_str(mark::NAME, mark::NAME_LEN)
    }

    #[must_use]
    pub fn message(&self) -> Option<&'a str> {
        self.window().cstr(mark::MESSAGE)
    }
}

/// GLib-style log levels as written by the log forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Error,
    Critical,
    Warning,
    Message,
    Info,
    Debug,
    Other(u16),
}

impl LogSeverity {
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0x04 => Self::Error,
            0x08 => Self::Critical,
            0x10 => Self::Warning,
            0x20 => Self::Message,
            0x40 => Self::Info,
            0x80 => Self::Debug,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Critical => "Critical",
            Self::Warning => "Warning",
            Self::Message => "Message",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Other(_) => "Unknown",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl<'a> LogRecord<'a> {
    #[must_use]
    pub fn severity(&self) -> LogSeverity {
        LogSeverity::from_raw(self.window().u16(log::SEVERITY).unwrap_or_default())
    }

    #[must_use]
    pub fn domain(&self) -> Option<&'a str> {
        self.window().fixed_str(log::DOMAIN, log::DOMAIN_LEN)
    }

    #[must_use]
    pub fn message(&self) -> Option<&'a str> {
        self.window().cstr(log::MESSAGE)
    }
}

impl<'a> MetadataRecord<'a> {
    #[must_use]
    pub fn id(&self) -> Option<&'a str> {
        self.window().fixed_str(metadata::ID, metadata::ID_LEN)
    }

    #[must_use]
    pub fn value(&self) -> Option<&'a str> {
        self.window().cstr(metadata::METADATA)
    }
}
