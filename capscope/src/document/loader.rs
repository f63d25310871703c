//! Building a [`Document`] from capture bytes.
//!
//! Loading runs in three phases: a linear scan that frames records, a stable
//! sort that puts them on one timeline, and an indexing pass followed by the
//! derived-model stages (CPUs, mounts, address layouts, processes, counters).
//! Only a short header is fatal. A damaged record ends the scan early and
//! a missing embedded file skips its stage; both are noted in [`LoadReport`].

#![allow(clippy::cast_precision_loss)]

use capscope_common::{self as wire, frame as hdr};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use super::address_layout::Mapping;
use super::counters::Counter;
use super::cpu_info::parse_cpuinfo;
use super::index::IndexSet;
use super::marks::MarkGroups;
use super::mounts::{Mount, MountDevice, MountNamespace};
use super::options::LoadOptions;
use super::process::ProcessInfo;
use super::Document;
use crate::capture::address::enters_kernel;
use crate::capture::records::{CounterKind, Traceable};
use crate::capture::{ByteWindow, CaptureData, CaptureHeader, Endianness, Frame, FrameKind, FramePointer, Record};
use crate::domain::{CaptureError, Pid, TimeSpan, Timestamp};
use crate::symbolization::{DocumentSymbols, Symbol, SymbolKind};

const INDEXING: &str = "Indexing capture data frames";

/// What loading skipped or cut short. None of it is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records framed by the scan.
    pub records: usize,
    /// Byte offset of the first record that could not be framed.
    pub truncated_at: Option<u64>,
    /// Embedded files an enrichment stage looked for and did not find.
    pub skipped_enrichments: Vec<String>,
}

impl LoadReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.truncated_at.is_none()
    }
}

/// Frame every record after the header until the data ends or a record
/// length is implausible.
fn scan(data: &[u8], endian: Endianness, options: &LoadOptions, report: &mut LoadReport) -> Result<Vec<FramePointer>, CaptureError> {
    let total = data.len();
    let mut frames = Vec::new();
    let mut offset = wire::CAPTURE_HEADER_SIZE;

    while let Some(len_bytes) = data.get(offset..offset + 2) {
        let len = endian.read_u16(len_bytes);
        let size = usize::from(len);

        if size == 0 {
            debug!("Zero-length record at offset {offset}, treating as end of data");
            break;
        }
        if size < wire::FRAME_HEADER_SIZE || size % options.alignment != 0 || offset + size > total {
            warn!("Stopping scan at offset {offset}: record length {size} is invalid ({} bytes remain)", total - offset);
            report.truncated_at = Some(offset as u64);
            break;
        }

        frames.push(FramePointer { offset, len });
        offset += size;

        if frames.len() % 100 == 0 {
            if options.cancel.is_cancelled() {
                return Err(CaptureError::Cancelled);
            }
            options.progress.report(0.1 + offset as f64 / total as f64 * 0.3, INDEXING);
        }
    }

    report.records = frames.len();
    Ok(frames)
}

/// Timeline order: time ascending, longer marks first at equal times.
fn sort_key(data: &[u8], endian: Endianness, pointer: &FramePointer) -> (i64, Reverse<i64>) {
    let window = ByteWindow::new(data.get(pointer.range()).unwrap_or_default(), endian);
    let time = window.i64(hdr::TIME).unwrap_or_default();
    let duration = if window.u8(hdr::TYPE) == Some(wire::FRAME_MARK) {
        window.i64(wire::mark::DURATION).unwrap_or_default()
    } else {
        0
    };
    (time, Reverse(duration))
}

/// Indices built by the single pass over the sorted timeline.
#[derive(Default)]
struct Indices {
    kinds: Vec<IndexSet>,
    traceables: IndexSet,
    samples_with_context_switch: IndexSet,
    pids: BTreeSet<Pid>,
    processes: BTreeMap<Pid, ProcessInfo>,
    files_first_position: BTreeMap<String, u32>,
    mark_groups: MarkGroups,
    guessed_end: i64,
}

impl Indices {
    fn process(&mut self, pid: Pid) -> &mut ProcessInfo {
        self.processes.entry(pid).or_insert_with(|| ProcessInfo::new(pid))
    }

    fn add(&mut self, frame: Frame<'_>, data_bearing: &[bool; FrameKind::ALL.len()]) {
        let position = frame.position();
        let pid = frame.pid();
        let time = frame.time().0;
        self.pids.insert(pid);

        let Some(kind) = frame.kind() else {
            return;
        };
        self.kinds[kind.index()].insert(position);

        let bears_data = data_bearing[kind.index()];
        if bears_data && time > self.guessed_end {
            self.guessed_end = time;
        }

        match frame.traceable() {
            Some(Traceable::Sample(sample)) => {
                self.traceables.insert(position);
                let depth = sample.stack_depth();
                if enters_kernel((0..depth).filter_map(|i| sample.address(i))) {
                    self.samples_with_context_switch.insert(position);
                }
                let tid = sample.thread_id();
                if tid.0 != pid.0 {
                    self.process(pid).thread_ids.insert(tid);
                }
            }
            Some(Traceable::Allocation(allocation)) => {
                self.traceables.insert(position);
                self.process(pid).thread_ids.insert(allocation.thread_id());
            }
            None => {}
        }

        match kind {
            FrameKind::Exit => {
                self.process(pid).exit_time = Some(Timestamp(time));
            }
            FrameKind::Fork => {
                if let Record::Fork(fork) = frame.record() {
                    self.pids.insert(fork.child_pid());
                }
            }
            FrameKind::Mark => {
                if let Some(mark) = frame.as_mark() {
                    if bears_data {
                        self.guessed_end = self.guessed_end.max(mark.end_time().0);
                    }
                    if let (Some(group), Some(name)) = (mark.group(), mark.name()) {
                        self.mark_groups
                            .entry(group.to_string())
                            .or_default()
                            .entry(name.to_string())
                            .or_default()
                            .insert(position);
                    }
                }
            }
            FrameKind::FileChunk => {
                if let Some(path) = frame.as_file_chunk().and_then(|c| c.path()) {
                    self.files_first_position.entry(path.to_string()).or_insert(position);
                }
            }
            _ => {}
        }
    }
}

impl Document {
    /// Index a capture on the calling thread.
    ///
    /// # Errors
    /// [`CaptureError::HeaderTooShort`] if the data cannot hold a header,
    /// [`CaptureError::Cancelled`] if `options.cancel` fires first.
    pub fn build(data: CaptureData, options: &LoadOptions) -> Result<Self, CaptureError> {
        let header = CaptureHeader::parse(&data)?;
        let endian = header.endian;
        let mut report = LoadReport::default();

        options.progress.report(0.1, INDEXING);
        let mut frames = scan(&data, endian, options, &mut report)?;
        frames.sort_by_cached_key(|pointer| sort_key(&data, endian, pointer));

        let mut indices = Indices {
            kinds: vec![IndexSet::new(); FrameKind::ALL.len()],
            ..Indices::default()
        };
        let data_bearing = options.data_bearing_mask();
        for (position, pointer) in frames.iter().enumerate() {
            let (Ok(position), Some(bytes)) = (u32::try_from(position), data.get(pointer.range())) else {
                continue;
            };
            indices.add(Frame::new(position, bytes, endian), &data_bearing);
        }

        let declared = header.time_span();
        let time_span = TimeSpan::new(declared.begin.0, declared.end.0.max(indices.guessed_end));
        info!(
            "Indexed {} records ({endian}), span {time_span}, {} pids",
            frames.len(),
            indices.pids.len()
        );

        // Every observed pid (and the idle process) gets a process info
        // before the enrichment stages fill them in.
        let pids: Vec<Pid> = indices.pids.iter().copied().chain(std::iter::once(Pid(0))).collect();
        for pid in pids {
            indices.process(pid);
        }

        let mut document = Self {
            data,
            header,
            frames,
            kinds: indices.kinds,
            traceables: indices.traceables,
            samples_with_context_switch: indices.samples_with_context_switch,
            pids: indices.pids,
            processes: indices.processes,
            mount_namespace: MountNamespace::new(),
            files_first_position: indices.files_first_position,
            mark_groups: indices.mark_groups,
            counters: Vec::new(),
            cpu_info: Vec::new(),
            time_span,
            report,
            title: RwLock::new(None),
            busy: AtomicUsize::new(0),
            symbols: RwLock::new(Arc::new(DocumentSymbols::empty())),
            thread_symbols: RwLock::new(HashMap::new()),
            missing_process: Symbol::new("Unknown Process", SymbolKind::Unwindable).into_shared(),
        };

        let stages: [(f64, &str, fn(&mut Self)); 7] = [
            (0.55, "Discovering CPU topology", Self::load_cpu_info),
            (0.6, "Discovering file system mounts", Self::load_mounts),
            (0.65, "Discovering process mount namespaces", Self::load_mountinfo),
            (0.7, "Analyzing process address layouts", Self::load_address_layouts),
            (0.75, "Analyzing process command line", Self::load_processes),
            (0.8, "Analyzing file system overlays", Self::load_overlays),
            (0.85, "Processing counters", Self::load_counters),
        ];
        for (fraction, label, stage) in stages {
            if options.cancel.is_cancelled() {
                return Err(CaptureError::Cancelled);
            }
            options.progress.report(fraction, label);
            stage(&mut document);
        }

        document.seal_processes();
        options.progress.report(1.0, "Capture loaded");
        Ok(document)
    }

    /// Contents of an embedded file, noting it in the report when absent.
    fn read_embedded(&mut self, path: &str) -> Option<String> {
        let contents = self.lookup_file(path).map(|f| f.read_to_string());
        match contents {
            Some(Ok(text)) => Some(text),
            Some(Err(err)) => {
                warn!("Embedded file {path} is unreadable: {err}");
                self.report.skipped_enrichments.push(path.to_string());
                None
            }
            None => {
                debug!("Capture has no embedded {path}");
                self.report.skipped_enrichments.push(path.to_string());
                None
            }
        }
    }

    fn load_cpu_info(&mut self) {
        if let Some(text) = self.read_embedded("/proc/cpuinfo") {
            self.cpu_info = parse_cpuinfo(&text);
            debug!("Found {} CPUs", self.cpu_info.len());
        }
    }

    fn load_mounts(&mut self) {
        let Some(text) = self.read_embedded("/proc/mounts") else {
            return;
        };
        let devices: Vec<MountDevice> = text.lines().filter_map(MountDevice::parse_mounts_line).collect();
        debug!("Found {} mount devices", devices.len());
        for info in self.processes.values_mut() {
            for device in &devices {
                info.mount_namespace.add_device(device.clone());
            }
        }
        for device in devices {
            self.mount_namespace.add_device(device);
        }
    }

    fn load_mountinfo(&mut self) {
        let pids: Vec<Pid> = self.processes.keys().copied().collect();
        for pid in pids {
            let path = format!("/proc/{}/mountinfo", pid.0);
            let Some(text) = self.lookup_file(&path).and_then(|f| f.read_to_string().ok()) else {
                continue;
            };
            if let Some(info) = self.processes.get_mut(&pid) {
                for mount in text.lines().filter_map(Mount::parse_mountinfo_line) {
                    info.mount_namespace.add_mount(mount);
                }
            }
        }
    }

    fn load_address_layouts(&mut self) {
        let mappings: Vec<(Pid, Mapping)> =
            self.list_mmaps().iter().map(|map| (map.pid(), Mapping::from_record(&map))).collect();
        for (pid, mapping) in mappings {
            self.processes.entry(pid).or_insert_with(|| ProcessInfo::new(pid)).address_layout.push(mapping);
        }
    }

    /// Name processes from their command lines and keep only the first
    /// Process record per pid in the index.
    fn load_processes(&mut self) {
        let mut seen = BTreeSet::new();
        let mut duplicates = IndexSet::new();
        let mut cmdlines = Vec::new();

        for process in self.list_processes().iter() {
            let pid = process.pid();
            if !seen.insert(pid) {
                duplicates.insert(process.position());
            }
            if let Some(cmdline) = process.cmdline() {
                cmdlines.push((pid, cmdline.to_string()));
            }
        }

        for (pid, cmdline) in cmdlines {
            self.processes.entry(pid).or_insert_with(|| ProcessInfo::new(pid)).set_cmdline(&cmdline);
        }
        if !duplicates.is_empty() {
            debug!("Dropping {} repeated Process records", duplicates.len());
            self.kinds[FrameKind::Process.index()].subtract(&duplicates);
        }
    }

    fn load_overlays(&mut self) {
        let overlays: Vec<(Pid, Mount)> = self
            .list_overlays()
            .iter()
            .filter_map(|o| Some((o.pid(), Mount::overlay(o.destination()?, o.source()?, o.layer()))))
            .collect();
        for (pid, mount) in overlays {
            self.processes.entry(pid).or_insert_with(|| ProcessInfo::new(pid)).mount_namespace.add_mount(mount);
        }
    }

    /// Counter definitions in timeline order, each fed by every CounterSet
    /// value carrying its id, decoded with the definition's kind.
    fn load_counters(&mut self) {
        let endian = self.endian();
        let origin = self.time_span.begin;
        let mut counters = Vec::new();
        let mut by_id: HashMap<u32, (usize, CounterKind)> = HashMap::new();

        let defines = self.list_by_kind(FrameKind::CounterDefine);
        for define in defines.iter().filter_map(|f| match f.record() {
            Record::CounterDefine(d) => Some(d),
            _ => None,
        }) {
            for def in define.counters() {
                by_id.insert(def.id, (counters.len(), def.kind));
                counters.push(Counter::new(def.id, def.kind, def.category, def.name, def.description, origin));
            }
        }

        let sets = self.list_by_kind(FrameKind::CounterSet);
        for set in sets.iter().filter_map(|f| match f.record() {
            Record::CounterSet(s) => Some(s),
            _ => None,
        }) {
            let time = set.time();
            for (id, raw) in set.values() {
                if let Some(&(index, kind)) = by_id.get(&id) {
                    counters[index].push(time, raw.decode(kind, endian));
                }
            }
        }

        for counter in &mut counters {
            counter.finish();
        }
        debug!("Found {} counters", counters.len());
        self.counters = counters;
    }

    fn seal_processes(&mut self) {
        let end = self.time_span.end;
        self.mount_namespace.seal();
        for info in self.processes.values_mut() {
            info.address_layout.seal();
            info.mount_namespace.seal();
            info.exit_time.get_or_insert(end);
        }
    }
}
