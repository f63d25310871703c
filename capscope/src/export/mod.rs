//! Trace export functionality
//!
//! Exports the timeline of a capture (marks, counters, logs) to the Chrome
//! Trace Event Format for viewing in chrome://tracing or Perfetto.

pub mod chrome_trace;

pub use chrome_trace::{ChromeTraceEvent, ChromeTraceExporter};
