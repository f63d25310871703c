//! # Document
//!
//! A loaded capture: the mapped bytes, the time-sorted timeline of records
//! over them, and every index and derived model built during loading.
//!
//! ## Lifecycle
//!
//! ```text
//! CaptureData ──load()──► Document ──symbolize()──► symbols slot swapped in
//!                            │
//!                            └── read-only queries from any thread
//! ```
//!
//! After loading, the only mutable state is the display title, the symbol
//! slot, the thread-symbol cache and the busy counter. Everything else is
//! immutable and shared through `Arc<Document>`.

pub mod address_layout;
pub mod counters;
pub mod cpu_info;
pub mod files;
pub mod index;
pub mod list;
pub mod loader;
pub mod marks;
pub mod mounts;
pub mod options;
pub mod process;
pub mod progress;

use capscope_common as wire;
use log::info;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use address_layout::{AddressLayout, Mapping, MemoryRange};
pub use counters::{Counter, CounterPoint};
pub use cpu_info::CpuInfo;
pub use files::DocumentFile;
pub use index::IndexSet;
pub use list::FrameList;
pub use loader::LoadReport;
pub use marks::{MarkCatalog, MarkGroups};
pub use mounts::{Mount, MountDevice, MountNamespace};
pub use options::LoadOptions;
pub use process::ProcessInfo;
pub use progress::{ProgressSink, ProgressUpdate};

use crate::capture::records::{
    AllocationRecord, DBusMessageRecord, FileChunkRecord, ForkRecord, JitmapRecord, LogRecord, MapRecord, MarkRecord,
    MetadataRecord, OverlayRecord, ProcessRecord, SampleRecord, TraceRecord, Traceable,
};
use crate::capture::{AddressContext, CaptureData, CaptureHeader, Endianness, Frame, FrameKind, FramePointer};
use crate::domain::{CaptureError, Pid, SymbolizeError, Tid, TimeSpan, Timestamp};
use crate::symbolization::{DocumentSymbols, Symbol, SymbolKind, Symbolizer};

/// A loaded capture.
pub struct Document {
    data: CaptureData,
    header: CaptureHeader,
    /// The global timeline: every record, sorted by time.
    frames: Vec<FramePointer>,
    /// One index per [`FrameKind`], in tag order.
    kinds: Vec<IndexSet>,
    traceables: IndexSet,
    samples_with_context_switch: IndexSet,
    pids: BTreeSet<Pid>,
    processes: BTreeMap<Pid, ProcessInfo>,
    /// Devices from `/proc/mounts`, shared by every process namespace.
    mount_namespace: MountNamespace,
    files_first_position: BTreeMap<String, u32>,
    mark_groups: MarkGroups,
    counters: Vec<Counter>,
    cpu_info: Vec<CpuInfo>,
    time_span: TimeSpan,
    report: LoadReport,

    title: RwLock<Option<String>>,
    busy: AtomicUsize,
    symbols: RwLock<Arc<DocumentSymbols>>,
    thread_symbols: RwLock<HashMap<Tid, Arc<Symbol>>>,
    missing_process: Arc<Symbol>,
}

/// Keeps [`Document::is_busy`] raised while alive.
pub(crate) struct BusyGuard<'a>(&'a AtomicUsize);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn decode_traceable(frame: Frame<'_>) -> Traceable<'_> {
    match frame.kind() {
        Some(FrameKind::Allocation) => Traceable::Allocation(AllocationRecord::new(frame)),
        _ => Traceable::Sample(SampleRecord::new(frame)),
    }
}

impl Document {
    // ========================================================================
    // Loading
    // ========================================================================

    /// Index a capture on a blocking worker.
    ///
    /// # Errors
    /// [`CaptureError::HeaderTooShort`] if the data cannot hold a header,
    /// [`CaptureError::Cancelled`] if `options.cancel` fires first.
    pub async fn load(data: CaptureData, options: LoadOptions) -> Result<Arc<Self>, CaptureError> {
        let document = tokio::task::spawn_blocking(move || Self::build(data, &options)).await??;
        Ok(Arc::new(document))
    }

    /// Map a capture file and index it.
    ///
    /// # Errors
    /// Fails if the file cannot be opened or mapped, or as [`Document::load`].
    pub async fn open(path: impl AsRef<Path>, options: LoadOptions) -> Result<Arc<Self>, CaptureError> {
        let path = path.as_ref().to_path_buf();
        let data = tokio::task::spawn_blocking(move || CaptureData::open(&path)).await??;
        Self::load(data, options).await
    }

    // ========================================================================
    // Timeline
    // ========================================================================

    /// Number of records on the timeline.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The record at `position` on the timeline.
    #[must_use]
    pub fn frame_at(&self, position: u32) -> Option<Frame<'_>> {
        let pointer = self.frames.get(usize::try_from(position).ok()?)?;
        let bytes = self.data.get(pointer.range())?;
        Some(Frame::new(position, bytes, self.header.endian))
    }

    /// Every record, in timeline order.
    pub fn frames(&self) -> impl Iterator<Item = Frame<'_>> + '_ {
        (0..self.frames.len()).filter_map(|p| u32::try_from(p).ok().and_then(|p| self.frame_at(p)))
    }

    #[must_use]
    pub fn header(&self) -> &CaptureHeader {
        &self.header
    }

    #[must_use]
    pub fn endian(&self) -> Endianness {
        self.header.endian
    }

    /// Whether the capture was written in this host's byte order.
    #[must_use]
    pub fn is_native(&self) -> bool {
        !self.header.needs_swap()
    }

    #[must_use]
    pub fn time_span(&self) -> TimeSpan {
        self.time_span
    }

    /// Monotonic clock at the start of the recording.
    #[must_use]
    pub fn clock_at_start(&self) -> Timestamp {
        Timestamp(self.header.time)
    }

    /// What the loader skipped or cut short.
    #[must_use]
    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// The raw capture bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    // ========================================================================
    // Title & saving
    // ========================================================================

    #[must_use]
    pub fn title(&self) -> String {
        self.title.read().clone().unwrap_or_else(|| self.recording_label())
    }

    /// Shown under a custom title; absent otherwise.
    #[must_use]
    pub fn subtitle(&self) -> Option<String> {
        self.title.read().as_ref().map(|_| self.recording_label())
    }

    pub fn set_title(&self, title: impl Into<String>) {
        *self.title.write() = Some(title.into());
    }

    fn recording_label(&self) -> String {
        format!("Recording at {}", self.header.capture_time)
    }

    /// Whether a save, symbolization or callgraph build is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire) > 0
    }

    pub(crate) fn busy_guard(&self) -> BusyGuard<'_> {
        self.busy.fetch_add(1, Ordering::AcqRel);
        BusyGuard(&self.busy)
    }

    /// Copy the capture bytes to `destination`, then title the document
    /// after the destination's file name.
    ///
    /// # Errors
    /// Fails if the destination cannot be written.
    pub async fn save(self: &Arc<Self>, destination: impl AsRef<Path>) -> Result<(), CaptureError> {
        let document = Arc::clone(self);
        let destination = destination.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), CaptureError> {
            let _busy = document.busy_guard();
            std::fs::write(&destination, document.bytes())?;
            if let Some(name) = destination.file_name() {
                document.set_title(name.to_string_lossy());
            }
            info!("Saved capture to {}", destination.display());
            Ok(())
        })
        .await?
    }

    // ========================================================================
    // Lists
    // ========================================================================

    fn list<'d, T>(&'d self, positions: Cow<'d, IndexSet>, decode: fn(Frame<'d>) -> T) -> FrameList<'d, T> {
        FrameList::new(self, positions, decode)
    }

    fn kind_index(&self, kind: FrameKind) -> &IndexSet {
        &self.kinds[kind.index()]
    }

    /// Every record of one kind.
    #[must_use]
    pub fn list_by_kind(&self, kind: FrameKind) -> FrameList<'_, Frame<'_>> {
        self.list(Cow::Borrowed(self.kind_index(kind)), |f| f)
    }

    /// Samples and allocations.
    #[must_use]
    pub fn list_traceables(&self) -> FrameList<'_, Traceable<'_>> {
        self.list(Cow::Borrowed(&self.traceables), decode_traceable)
    }

    /// The traceables among `positions`; other positions are ignored.
    #[must_use]
    pub fn list_traceables_at(&self, positions: &IndexSet) -> FrameList<'_, Traceable<'_>> {
        self.list(Cow::Owned(self.traceables.intersection(positions)), decode_traceable)
    }

    #[must_use]
    pub fn list_samples(&self) -> FrameList<'_, SampleRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::Sample)), SampleRecord::new)
    }

    /// Samples whose stack crosses into the kernel.
    #[must_use]
    pub fn list_samples_with_context_switch(&self) -> FrameList<'_, SampleRecord<'_>> {
        self.list(Cow::Borrowed(&self.samples_with_context_switch), SampleRecord::new)
    }

    #[must_use]
    pub fn list_samples_without_context_switch(&self) -> FrameList<'_, SampleRecord<'_>> {
        let positions = self.kind_index(FrameKind::Sample).difference(&self.samples_with_context_switch);
        self.list(Cow::Owned(positions), SampleRecord::new)
    }

    #[must_use]
    pub fn list_allocations(&self) -> FrameList<'_, AllocationRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::Allocation)), AllocationRecord::new)
    }

    #[must_use]
    pub fn list_traces(&self) -> FrameList<'_, TraceRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::Trace)), TraceRecord::new)
    }

    #[must_use]
    pub fn list_marks(&self) -> FrameList<'_, MarkRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::Mark)), MarkRecord::new)
    }

    /// Marks of every name under `group`.
    #[must_use]
    pub fn list_marks_by_group(&self, group: &str) -> FrameList<'_, MarkRecord<'_>> {
        let positions = self
            .mark_groups
            .get(group)
            .map(|names| names.values().fold(IndexSet::new(), |acc, set| acc.union(set)))
            .unwrap_or_default();
        self.list(Cow::Owned(positions), MarkRecord::new)
    }

    /// First Process record of every pid.
    #[must_use]
    pub fn list_processes(&self) -> FrameList<'_, ProcessRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::Process)), ProcessRecord::new)
    }

    #[must_use]
    pub fn list_jitmaps(&self) -> FrameList<'_, JitmapRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::Jitmap)), JitmapRecord::new)
    }

    #[must_use]
    pub fn list_logs(&self) -> FrameList<'_, LogRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::Log)), LogRecord::new)
    }

    #[must_use]
    pub fn list_metadata(&self) -> FrameList<'_, MetadataRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::Metadata)), MetadataRecord::new)
    }

    #[must_use]
    pub fn list_dbus_messages(&self) -> FrameList<'_, DBusMessageRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::DBusMessage)), DBusMessageRecord::new)
    }

    #[must_use]
    pub fn list_mmaps(&self) -> FrameList<'_, MapRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::Map)), MapRecord::new)
    }

    #[must_use]
    pub fn list_forks(&self) -> FrameList<'_, ForkRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::Fork)), ForkRecord::new)
    }

    #[must_use]
    pub fn list_exits(&self) -> FrameList<'_, Frame<'_>> {
        self.list_by_kind(FrameKind::Exit)
    }

    #[must_use]
    pub fn list_overlays(&self) -> FrameList<'_, OverlayRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::Overlay)), OverlayRecord::new)
    }

    #[must_use]
    pub fn list_file_chunks(&self) -> FrameList<'_, FileChunkRecord<'_>> {
        self.list(Cow::Borrowed(self.kind_index(FrameKind::FileChunk)), FileChunkRecord::new)
    }

    #[must_use]
    pub fn list_counters(&self) -> &[Counter] {
        &self.counters
    }

    #[must_use]
    pub fn list_cpu_info(&self) -> &[CpuInfo] {
        &self.cpu_info
    }

    // ========================================================================
    // Embedded files
    // ========================================================================

    /// An embedded file by path. A gzip-compressed copy stored as
    /// `path.gz` is found too and decompressed on read.
    #[must_use]
    pub fn lookup_file(&self, path: &str) -> Option<DocumentFile<'_>> {
        if let Some(&first) = self.files_first_position.get(path) {
            return Some(self.collect_file(path, path, first, false));
        }
        let compressed = format!("{path}.gz");
        let &first = self.files_first_position.get(&compressed)?;
        Some(self.collect_file(path, &compressed, first, true))
    }

    fn collect_file(&self, path: &str, stored_path: &str, first: u32, compressed: bool) -> DocumentFile<'_> {
        let index = self.kind_index(FrameKind::FileChunk).as_slice();
        let start = index.partition_point(|&p| p < first);
        let mut chunks = Vec::new();
        for &position in &index[start..] {
            let Some(chunk) = self.frame_at(position).and_then(|f| f.as_file_chunk()) else {
                continue;
            };
            if chunk.path() != Some(stored_path) {
                continue;
            }
            chunks.push(chunk);
            if chunk.is_last() {
                break;
            }
        }
        DocumentFile::new(path, chunks, compressed)
    }

    /// Every embedded file once, by its uncompressed path.
    #[must_use]
    pub fn list_files(&self) -> Vec<DocumentFile<'_>> {
        let paths: BTreeSet<&str> = self
            .files_first_position
            .keys()
            .map(|p| p.strip_suffix(".gz").unwrap_or(p))
            .collect();
        paths.into_iter().filter_map(|p| self.lookup_file(p)).collect()
    }

    // ========================================================================
    // Marks & counters
    // ========================================================================

    #[must_use]
    pub fn mark_groups(&self) -> &MarkGroups {
        &self.mark_groups
    }

    /// Duration statistics per group and name, both sorted.
    #[must_use]
    pub fn catalog_marks(&self) -> Vec<Vec<MarkCatalog>> {
        self.mark_groups
            .iter()
            .map(|(group, names)| {
                names
                    .iter()
                    .map(|(name, positions)| {
                        let durations = positions
                            .iter()
                            .filter_map(|p| self.frame_at(p).and_then(|f| f.as_mark()))
                            .map(|m| m.duration())
                            .collect();
                        MarkCatalog::from_durations(group, name, positions.clone(), durations)
                    })
                    .collect()
            })
            .collect()
    }

    #[must_use]
    pub fn find_counter(&self, category: &str, name: &str) -> Option<&Counter> {
        self.counters.iter().find(|c| c.category == category && c.name == name)
    }

    // ========================================================================
    // Processes
    // ========================================================================

    /// Every pid seen in any record.
    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.pids.iter().copied()
    }

    #[must_use]
    pub fn process_info(&self, pid: Pid) -> Option<&ProcessInfo> {
        self.processes.get(&pid)
    }

    pub fn process_infos(&self) -> impl Iterator<Item = &ProcessInfo> {
        self.processes.values()
    }

    /// The first Process record for `pid`.
    #[must_use]
    pub fn lookup_process(&self, pid: Pid) -> Option<ProcessRecord<'_>> {
        self.list_processes().iter().find(|p| p.pid() == pid)
    }

    /// Devices from the embedded `/proc/mounts`.
    #[must_use]
    pub fn mount_namespace(&self) -> &MountNamespace {
        &self.mount_namespace
    }

    /// Display symbol for a process, or the "Unknown Process" sentinel.
    #[must_use]
    pub fn process_symbol(&self, pid: Pid, want_shared: bool) -> Arc<Symbol> {
        let pid = Pid(pid.0.max(0));
        match self.processes.get(&pid) {
            Some(info) => Arc::clone(info.process_symbol(want_shared)),
            None => Arc::clone(&self.missing_process),
        }
    }

    /// Symbol naming a thread, created once per tid.
    #[must_use]
    pub fn thread_symbol(&self, pid: Pid, tid: Tid) -> Arc<Symbol> {
        if let Some(symbol) = self.thread_symbols.read().get(&tid) {
            return Arc::clone(symbol);
        }
        let mut cache = self.thread_symbols.write();
        let symbol = cache.entry(tid).or_insert_with(|| {
            let name = if tid.0 == pid.0 { format!("Thread-{} (Main)", tid.0) } else { format!("Thread-{}", tid.0) };
            Symbol::new(name, SymbolKind::Thread).with_nick(ProcessInfo::nick(pid)).into_shared()
        });
        Arc::clone(symbol)
    }

    // ========================================================================
    // Symbols
    // ========================================================================

    /// The symbol tables currently in use.
    #[must_use]
    pub fn symbols(&self) -> Arc<DocumentSymbols> {
        Arc::clone(&self.symbols.read())
    }

    /// Prepare `symbolizer` and resolve every traceable address with it,
    /// then make the result the document's symbol tables.
    ///
    /// # Errors
    /// [`SymbolizeError::Cancelled`] if `cancel` fires; otherwise whatever
    /// the symbolizer's preparation reports.
    pub async fn symbolize(
        self: &Arc<Self>,
        symbolizer: Arc<dyn Symbolizer>,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<(), SymbolizeError> {
        let document = Arc::clone(self);
        let symbols = tokio::task::spawn_blocking(move || -> Result<DocumentSymbols, SymbolizeError> {
            let _busy = document.busy_guard();
            if !symbolizer.resolves_nothing() {
                symbolizer.prepare(&document, &cancel)?;
            }
            DocumentSymbols::build(&document, symbolizer.as_ref(), &progress, &cancel)
        })
        .await??;
        *self.symbols.write() = Arc::new(symbols);
        Ok(())
    }

    /// Resolve up to `max` frames of a stack, innermost first.
    ///
    /// Adjacent duplicates produced by resolving two addresses to the same
    /// symbol are skipped. Also returns the context in effect after the last
    /// address.
    #[must_use]
    pub fn symbolize_traceable(&self, traceable: &Traceable<'_>, max: usize) -> (Vec<Arc<Symbol>>, AddressContext) {
        let symbols = self.symbols();
        let pid = traceable.pid();
        let mut last_context = AddressContext::None;
        let mut out: Vec<Arc<Symbol>> = Vec::with_capacity(traceable.stack_depth().min(max));

        for address in traceable.addresses(max) {
            if let Some(symbol) = symbols.lookup(pid, last_context, address) {
                if out.last().map_or(true, |prev| !Arc::ptr_eq(prev, &symbol)) {
                    out.push(symbol);
                }
            }
            if let Some(context) = AddressContext::from_marker(address) {
                last_context = context;
            }
        }
        (out, last_context)
    }

    /// Symbols of a stack for display, without a leading context switch.
    #[must_use]
    pub fn list_symbols_in_traceable(&self, traceable: &Traceable<'_>) -> Vec<Arc<Symbol>> {
        let (mut symbols, _) = self.symbolize_traceable(traceable, wire::MAX_STACK_DEPTH);
        if symbols.first().is_some_and(|s| s.is_context_switch()) {
            symbols.remove(0);
        }
        symbols
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("title", &self.title())
            .field("frames", &self.frames.len())
            .field("time_span", &self.time_span)
            .field("processes", &self.processes.len())
            .finish_non_exhaustive()
    }
}
