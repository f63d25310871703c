mod common;

use capscope::export::ChromeTraceExporter;
use common::CaptureBuilder;
use serde_json::Value;

fn timeline() -> CaptureBuilder {
    let mut b = CaptureBuilder::little();
    b.process(1_000, 42, "gnome-shell --wayland")
        .counter_define(1_500, &[(1, false, "CPU", "Total"), (2, true, "Memory", "Used")])
        .mark(2_000, 42, 3_000, "gtk", "frame", "layout")
        .mark(2_500, 42, 500, "gtk", "paint", "")
        .counter_set_i64(3_000, &[(1, 42)])
        .counter_set_f64(4_000, &[(2, 1.5)])
        .log(5_000, 42, 0x10, "Gtk", "widget has no parent")
        .log(6_000, 77, 0x80, "Mutter", "frame clock idle");
    b
}

fn events_with_phase<'a>(parsed: &'a Value, ph: &str) -> Vec<&'a Value> {
    parsed["traceEvents"].as_array().map_or_else(Vec::new, |events| events.iter().filter(|e| e["ph"] == ph).collect())
}

#[tokio::test]
async fn test_export_covers_marks_counters_and_logs() {
    let doc = timeline().load().await;
    let exporter = ChromeTraceExporter::from_document(&doc);

    let mut buffer = Vec::new();
    exporter.export(&mut buffer).expect("export");
    let parsed: Value = serde_json::from_slice(&buffer).expect("valid JSON");
    assert_eq!(parsed["displayTimeUnit"], "ms");

    let marks = events_with_phase(&parsed, "X");
    assert_eq!(marks.len(), 2);
    assert_eq!(marks[0]["name"], "frame");
    assert_eq!(marks[0]["cat"], "gtk");
    assert_eq!(marks[0]["pid"], 42);
    assert_eq!(marks[0]["ts"], 1.0);
    assert_eq!(marks[0]["dur"], 3.0);
    assert_eq!(marks[0]["args"]["message"], "layout");
    assert!(marks[1].get("args").is_none());

    let counters = events_with_phase(&parsed, "C");
    assert_eq!(counters.len(), 2);
    assert_eq!(counters[0]["name"], "Total");
    assert_eq!(counters[0]["args"]["Total"], 42.0);
    assert_eq!(counters[1]["cat"], "Memory");
    assert_eq!(counters[1]["args"]["Used"], 1.5);
    assert_eq!(counters[1]["ts"], 3.0);

    let logs = events_with_phase(&parsed, "i");
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["name"], "Gtk");
    assert_eq!(logs[0]["s"], "p");
    assert_eq!(logs[0]["args"]["severity"], "Warning");
    assert_eq!(logs[0]["args"]["message"], "widget has no parent");
    assert_eq!(logs[1]["args"]["severity"], "Debug");

    // Only processes with a command line get a named lane.
    let names = events_with_phase(&parsed, "M");
    assert_eq!(names.len(), 1);
    assert_eq!(names[0]["pid"], 42);
    assert_eq!(names[0]["args"]["name"], "gnome-shell --wayland");

    assert_eq!(exporter.event_count(), 7);
}

#[tokio::test]
async fn test_export_of_capture_without_timeline_data() {
    let mut b = CaptureBuilder::little();
    b.sample(2_000, 7, 7, &[0x1010]);
    let doc = b.load().await;

    let exporter = ChromeTraceExporter::from_document(&doc);
    assert_eq!(exporter.event_count(), 0);
}

#[tokio::test]
async fn test_export_to_path() {
    let doc = timeline().load().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("trace.json");

    let exporter = ChromeTraceExporter::from_document(&doc);
    exporter.export_to_path(&path).expect("write trace");

    let parsed: Value = serde_json::from_slice(&std::fs::read(&path).expect("read trace")).expect("valid JSON");
    assert_eq!(parsed["traceEvents"].as_array().map(Vec::len), Some(exporter.event_count()));

    let missing = dir.path().join("no-such-dir").join("trace.json");
    assert!(exporter.export_to_path(&missing).is_err());
}
