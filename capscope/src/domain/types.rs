//! Domain types providing compile-time safety and self-documentation
//!
//! Captures store process ids, thread ids and CPU numbers as plain signed
//! integers side by side in every record. These newtypes keep a TID from being
//! passed where a PID is expected.

use std::fmt;

/// Process ID as recorded in the capture.
///
/// Negative values are used by some writers for "no process"; lookups clamp
/// them to the idle process 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<i32> for Pid {
    fn from(pid: i32) -> Self {
        Pid(pid)
    }
}

/// Thread ID as recorded in the capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tid(pub i32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

impl From<i32> for Tid {
    fn from(tid: i32) -> Self {
        Tid(tid)
    }
}

/// CPU the record was emitted on; -1 when the writer did not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuId(pub i32);

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CPU:{}", self.0)
    }
}

/// Monotonic timestamp in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Microseconds elapsed since `origin`, as used by trace viewers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn micros_since(self, origin: Timestamp) -> f64 {
        (self.0 - origin.0) as f64 / 1000.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Inclusive `[begin, end]` interval of the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeSpan {
    pub begin: Timestamp,
    pub end: Timestamp,
}

impl TimeSpan {
    #[must_use]
    pub fn new(begin: i64, end: i64) -> Self {
        Self { begin: Timestamp(begin), end: Timestamp(end) }
    }

    /// Length of the span in nanoseconds.
    #[must_use]
    pub fn duration(&self) -> i64 {
        self.end.0 - self.begin.0
    }

    #[must_use]
    pub fn contains(&self, time: Timestamp) -> bool {
        time >= self.begin && time <= self.end
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.begin.0, self.end.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_display() {
        assert_eq!(Pid(1234).to_string(), "PID:1234");
        assert_eq!(Tid(7).to_string(), "TID:7");
        assert_eq!(CpuId(-1).to_string(), "CPU:-1");
    }

    #[test]
    fn test_time_span() {
        let span = TimeSpan::new(1000, 2000);
        assert_eq!(span.duration(), 1000);
        assert!(span.contains(Timestamp(1000)));
        assert!(span.contains(Timestamp(2000)));
        assert!(!span.contains(Timestamp(2001)));
        assert_eq!(span.to_string(), "1000..2000");
    }

    #[test]
    fn test_micros_since() {
        let origin = Timestamp(1_000);
        assert!((Timestamp(3_500).micros_since(origin) - 2.5).abs() < f64::EPSILON);
    }
}
