use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::document::Document;
use crate::domain::{ExportError, Timestamp};

/// Chrome Trace Event format
/// Spec: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/preview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromeTraceEvent {
    /// Mark name, counter name or log domain
    pub name: String,
    /// Category for filtering/coloring
    pub cat: String,
    /// Phase: "X" = complete, "C" = counter, "i" = instant, "M" = metadata
    pub ph: String,
    /// Timestamp in microseconds since the start of the recording
    pub ts: f64,
    /// Duration in microseconds ("X" events only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dur: Option<f64>,
    pub pid: i32,
    pub tid: i32,
    /// Instant event scope ("i" events only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<BTreeMap<String, JsonValue>>,
}

/// Chrome Trace Format container
#[derive(Debug, Serialize)]
struct ChromeTrace<'a> {
    #[serde(rename = "traceEvents")]
    trace_events: &'a [ChromeTraceEvent],
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: &'a str,
}

/// Timeline export of a capture's marks, counters and logs
#[derive(Debug, Default)]
pub struct ChromeTraceExporter {
    events: Vec<ChromeTraceEvent>,
}

impl ChromeTraceExporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every mark, counter value and log message of `document`.
    #[must_use]
    pub fn from_document(document: &Document) -> Self {
        let mut exporter = Self::new();
        exporter.add_document(document);
        exporter
    }

    pub fn add_document(&mut self, document: &Document) {
        let origin = document.time_span().begin;
        self.add_marks(document, origin);
        self.add_counters(document, origin);
        self.add_logs(document, origin);
        self.add_process_names(document);
    }

    fn add_marks(&mut self, document: &Document, origin: Timestamp) {
        for mark in document.list_marks().iter() {
            let mut args = BTreeMap::new();
            if let Some(message) = mark.message().filter(|m| !m.is_empty()) {
                args.insert("message".to_string(), serde_json::json!(message));
            }
            #[allow(clippy::cast_precision_loss)]
            let dur = mark.duration().max(0) as f64 / 1000.0;
            self.events.push(ChromeTraceEvent {
                name: mark.name().unwrap_or_default().to_string(),
                cat: mark.group().unwrap_or_default().to_string(),
                ph: "X".to_string(), // Complete
                ts: mark.time().micros_since(origin),
                dur: Some(dur),
                pid: mark.pid().0,
                tid: mark.frame().cpu().0,
                s: None,
                args: (!args.is_empty()).then_some(args),
            });
        }
    }

    fn add_counters(&mut self, document: &Document, origin: Timestamp) {
        for counter in document.list_counters() {
            for point in counter.values() {
                let mut args = BTreeMap::new();
                args.insert(counter.name.clone(), serde_json::json!(point.value.as_f64()));
                self.events.push(ChromeTraceEvent {
                    name: counter.name.clone(),
                    cat: counter.category.clone(),
                    ph: "C".to_string(), // Counter
                    ts: point.time.micros_since(origin),
                    dur: None,
                    pid: 0,
                    tid: 0,
                    s: None,
                    args: Some(args),
                });
            }
        }
    }

    fn add_logs(&mut self, document: &Document, origin: Timestamp) {
        for log in document.list_logs().iter() {
            let mut args = BTreeMap::new();
            args.insert("severity".to_string(), serde_json::json!(log.severity().label()));
            args.insert("message".to_string(), serde_json::json!(log.message().unwrap_or_default()));
            self.events.push(ChromeTraceEvent {
                name: log.domain().unwrap_or("log").to_string(),
                cat: "log".to_string(),
                ph: "i".to_string(), // Instant
                ts: log.time().micros_since(origin),
                dur: None,
                pid: log.pid().0,
                tid: log.frame().cpu().0,
                s: Some("p".to_string()),
                args: Some(args),
            });
        }
    }

    /// Name the process lanes after their command lines
    fn add_process_names(&mut self, document: &Document) {
        let pids: std::collections::BTreeSet<i32> = self.events.iter().map(|e| e.pid).collect();
        for pid in pids {
            let Some(name) = document.process_info(crate::domain::Pid(pid)).and_then(|p| p.cmdline.clone()) else {
                continue;
            };
            let mut args = BTreeMap::new();
            args.insert("name".to_string(), serde_json::json!(name));
            self.events.push(ChromeTraceEvent {
                name: "process_name".to_string(),
                cat: String::new(),
                ph: "M".to_string(), // Metadata
                ts: 0.0,
                dur: None,
                pid,
                tid: 0,
                s: None,
                args: Some(args),
            });
        }
    }

    /// Write the trace as JSON to any writer (file, stdout, buffer, etc.)
    ///
    /// # Errors
    /// Fails if serialization or the writer fails.
    pub fn export<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let trace = ChromeTrace { trace_events: &self.events, display_time_unit: "ms" };
        serde_json::to_writer_pretty(writer, &trace)?;
        Ok(())
    }

    /// Write the trace to a new file at `path`.
    ///
    /// # Errors
    /// Fails if the file cannot be created or written.
    pub fn export_to_path(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.export(&mut writer).context("Failed to write trace JSON")?;
        writer.flush().context("Failed to flush trace JSON")?;
        Ok(())
    }

    #[must_use]
    pub fn events(&self) -> &[ChromeTraceEvent] {
        &self.events
    }

    /// Get the number of events collected
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}
