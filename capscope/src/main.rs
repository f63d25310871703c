//! # capscope - Main Entry Point
//!
//! Opens a capture, prints the requested reports and optionally writes a
//! Chrome trace or a copy of the capture.
//!
//! ```text
//! open ──► load ──► [symbolize] ──► [callgraph/hotspots] ──► print
//!                 └──► [export] [save]
//! ```

// Report printing is intentionally long for clarity; durations lose precision for display
#![allow(clippy::too_many_lines, clippy::cast_precision_loss)]

use anyhow::{Context, Result};
use capscope::analysis::{build_hotspot_callgraph, function_hotspots, Callgraph, CallgraphFlags, HotspotCounts, NodeId};
use capscope::cli::Args;
use capscope::document::{Document, LoadOptions, ProgressSink};
use capscope::domain::{CallgraphError, CaptureError, SymbolizeError};
use capscope::export::ChromeTraceExporter;
use capscope::symbolization::{ElfSymbolizer, JitmapSymbolizer, KallsymsSymbolizer, MultiSymbolizer};
use clap::Parser;
use log::info;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_FORMAT: i32 = 65;
const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let cancelled = matches!(err.downcast_ref::<CaptureError>(), Some(CaptureError::Cancelled))
        || err.downcast_ref::<SymbolizeError>().is_some_and(SymbolizeError::is_cancelled)
        || matches!(err.downcast_ref::<CallgraphError>(), Some(CallgraphError::Cancelled));
    if cancelled {
        return EXIT_INTERRUPTED;
    }
    match err.downcast_ref::<CaptureError>() {
        Some(CaptureError::HeaderTooShort { .. }) => EXIT_FORMAT,
        _ => EXIT_ERROR,
    }
}

fn progress_sink(enabled: bool) -> ProgressSink {
    if !enabled {
        return ProgressSink::None;
    }
    ProgressSink::callback(|fraction, message| {
        eprintln!("[{:>3.0}%] {message}", fraction * 100.0);
    })
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();

    // Ctrl-C cancels whatever long-running stage is in flight
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let options = LoadOptions::new().with_progress(progress_sink(args.progress)).with_cancellation(cancel.clone());
    let document = Document::open(&args.capture, options)
        .await
        .with_context(|| format!("Failed to load {}", args.capture.display()))?;
    info!("Loaded {} records from {}", document.len(), args.capture.display());

    let mut out = std::io::stdout().lock();

    if args.summary || !args.wants_details() {
        print_summary(&mut out, &document)?;
    }
    if args.marks {
        print_marks(&mut out, &document)?;
    }
    if args.counters {
        print_counters(&mut out, &document)?;
    }
    if args.processes {
        print_processes(&mut out, &document)?;
    }
    if args.files {
        for file in document.list_files() {
            writeln!(out, "{:>10}  {}{}", file.stored_size(), file.path(), if file.is_compressed() { " (gz)" } else { "" })?;
        }
    }
    if let Some(path) = &args.cat {
        let file = document.lookup_file(path).with_context(|| format!("No embedded file named {path}"))?;
        let bytes = file.read_bytes().with_context(|| format!("Failed to read embedded {path}"))?;
        out.write_all(&bytes)?;
    }

    if args.wants_symbols() {
        let mut symbolizer = MultiSymbolizer::new();
        if args.kallsyms {
            symbolizer = symbolizer.with(KallsymsSymbolizer::new());
        }
        let mut elf = ElfSymbolizer::new();
        if let Some(sysroot) = &args.sysroot {
            elf = elf.with_sysroot(sysroot);
        }
        for dir in &args.debug_dirs {
            elf = elf.with_debug_dir(dir);
        }
        symbolizer = symbolizer.with(elf).with(JitmapSymbolizer::new());

        document
            .symbolize(Arc::new(symbolizer), progress_sink(args.progress), cancel.clone())
            .await
            .context("Failed to symbolize stacks")?;

        let mut flags = CallgraphFlags::empty();
        flags.set(CallgraphFlags::BOTTOM_UP, args.bottom_up);
        flags.set(CallgraphFlags::INCLUDE_THREADS, args.threads);
        flags.set(CallgraphFlags::HIDE_SYSTEM_LIBRARIES, args.hide_system_libraries);

        let traceables = document.list_samples().into_positions();
        let graph = build_hotspot_callgraph(Arc::clone(&document), flags, traceables, cancel.clone())
            .await
            .context("Failed to build callgraph")?;

        if args.callgraph {
            print_callgraph(&mut out, &graph, args.depth)?;
        }
        if let Some(n) = args.hotspots {
            print_hotspots(&mut out, &graph, n)?;
        }
    }

    if let Some(path) = &args.export {
        let exporter = ChromeTraceExporter::from_document(&document);
        exporter.export_to_path(path)?;
        eprintln!("Exported {} events to {}", exporter.event_count(), path.display());
    }
    if let Some(path) = &args.save {
        document.save(path).await.with_context(|| format!("Failed to save to {}", path.display()))?;
        eprintln!("Saved capture as \"{}\"", document.title());
    }

    Ok(())
}

fn print_summary(out: &mut impl Write, document: &Document) -> Result<()> {
    let header = document.header();
    let span = document.time_span();
    writeln!(out, "{}", document.title())?;
    writeln!(out, "  format version   {} ({}, {})", header.version, header.endian, if document.is_native() { "native" } else { "swapped" })?;
    writeln!(out, "  time span        {} .. {} ({:.3} s)", span.begin.0, span.end.0, span.duration() as f64 / 1e9)?;
    writeln!(out, "  records          {}", document.len())?;

    let report = document.report();
    if let Some(offset) = report.truncated_at {
        writeln!(out, "  truncated at     byte {offset}")?;
    }
    for skipped in &report.skipped_enrichments {
        writeln!(out, "  missing          {skipped}")?;
    }

    writeln!(out)?;
    for kind in capscope::capture::FrameKind::ALL {
        let n = document.list_by_kind(kind).len();
        if n > 0 {
            writeln!(out, "  {:<16} {n}", kind.name())?;
        }
    }
    writeln!(out, "  {:<16} {}", "with kernel", document.list_samples_with_context_switch().len())?;
    writeln!(out, "  {:<16} {}", "cpus", document.list_cpu_info().len())?;
    Ok(())
}

fn print_marks(out: &mut impl Write, document: &Document) -> Result<()> {
    writeln!(out, "{:<24} {:<32} {:>8} {:>12} {:>12} {:>12} {:>12}", "GROUP", "NAME", "COUNT", "MIN", "MEDIAN", "MEAN", "MAX")?;
    for group in document.catalog_marks() {
        for entry in group {
            writeln!(
                out,
                "{:<24} {:<32} {:>8} {:>12} {:>12} {:>12} {:>12}",
                entry.group,
                entry.name,
                entry.count,
                format_duration(entry.min),
                format_duration(entry.median),
                format_duration(entry.mean),
                format_duration(entry.max)
            )?;
        }
    }
    Ok(())
}

fn print_counters(out: &mut impl Write, document: &Document) -> Result<()> {
    for counter in document.list_counters() {
        writeln!(
            out,
            "{:>4}  {:<24} {:<32} {:>8} values  [{} .. {}]  mean {:.2}  median {}",
            counter.id,
            counter.category,
            counter.name,
            counter.len(),
            counter.min_value(),
            counter.max_value(),
            counter.mean_value(),
            counter.median_value()
        )?;
    }
    Ok(())
}

fn print_processes(out: &mut impl Write, document: &Document) -> Result<()> {
    for process in document.process_infos() {
        let name = process.cmdline.as_deref().unwrap_or("");
        writeln!(
            out,
            "{:>7}  {:<48} {:>5} maps {:>4} threads{}",
            process.pid.0,
            name,
            process.address_layout.len(),
            process.thread_ids.len(),
            if process.is_kernel_process() { "  [kernel]" } else { "" }
        )?;
    }
    Ok(())
}

fn print_callgraph(out: &mut impl Write, graph: &Callgraph<HotspotCounts>, max_depth: usize) -> Result<()> {
    let total = graph.root().count().max(1) as f64;
    let mut stack = vec![(NodeId::ROOT, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let node = graph.node(id);
        writeln!(
            out,
            "{:indent$}{} ({}, {:.1}%)",
            "",
            node.symbol(),
            node.count(),
            node.count() as f64 / total * 100.0,
            indent = depth * 2
        )?;
        if depth < max_depth {
            stack.extend(node.children().iter().rev().map(|&child| (child, depth + 1)));
        }
    }
    Ok(())
}

fn print_hotspots(out: &mut impl Write, graph: &Callgraph<HotspotCounts>, n: usize) -> Result<()> {
    writeln!(out, "{:>7} {:>7}  FUNCTION", "TOTAL", "SELF")?;
    for hotspot in function_hotspots(graph).into_iter().take(n) {
        let nick = hotspot.nick.map(|n| format!(" [{n}]")).unwrap_or_default();
        writeln!(out, "{:>6.1}% {:>6.1}%  {}{nick}", hotspot.total_percent, hotspot.self_percent, hotspot.name)?;
    }
    Ok(())
}

fn format_duration(ns: i64) -> String {
    match ns.unsigned_abs() {
        0..=9_999 => format!("{ns} ns"),
        10_000..=9_999_999 => format!("{:.2} µs", ns as f64 / 1e3),
        10_000_000..=9_999_999_999 => format!("{:.2} ms", ns as f64 / 1e6),
        _ => format!("{:.2} s", ns as f64 / 1e9),
    }
}
