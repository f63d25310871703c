//! # capscope - Capture Analysis Engine
//!
//! capscope reads sysprof-style capture files: a fixed header followed by a
//! timeline of length-prefixed records (stack samples, allocations, process
//! and mapping events, marks, counters, logs and embedded files) written by
//! a system-wide profiler.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Capture file (mmap)                        │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ bounds-checked, byte-swapped reads
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  capture: header, record framing, typed record views            │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ scan, sort, index, enrich
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  document: timeline, per-kind indexes, processes, mounts,       │
//! │            counters, marks, embedded files                      │
//! └──────────┬───────────────────────────────┬──────────────────────┘
//!            │                               │
//!            ▼                               ▼
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │  symbolization       │───────▶│  analysis            │
//! │  kallsyms/ELF/JIT    │        │  callgraph, hotspots │
//! └──────────────────────┘        └──────────────────────┘
//!                                            │
//!                                            ▼
//!                                 ┌──────────────────────┐
//!                                 │  export / cli         │
//!                                 └──────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`capture`]: Byte accessor, file header, record framing and one typed
//!   view per record kind. Every string read is bounded by its record.
//! - [`document`]: Loading and the read-only query surface over a loaded
//!   capture.
//! - [`symbolization`]: Symbolizer strategies and the per-document symbol
//!   tables they populate.
//! - [`analysis`]: Callgraph aggregation and hotspot ranking.
//! - [`export`]: Chrome Trace Event JSON of marks, counters and logs.
//! - [`cli`]: Command-line arguments of the `capscope` binary.
//! - [`domain`]: Core types (`Pid`, `Tid`, `Timestamp`) and error enums.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Overview of a capture
//! capscope recording.syscap
//!
//! # Hottest functions, resolving kernel frames too
//! capscope recording.syscap --hotspots 25 --kallsyms
//!
//! # Timeline for chrome://tracing
//! capscope recording.syscap --export trace.json
//! ```

pub mod analysis;
pub mod capture;
pub mod cli;
pub mod document;
pub mod domain;
pub mod export;
pub mod symbolization;
