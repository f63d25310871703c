//! Builds synthetic capture files for integration tests.

#![allow(dead_code)]

use capscope::capture::{AddressContext, Endianness};
use capscope::document::{Document, LoadOptions};
use capscope::symbolization::{Symbol, SymbolKind, SymbolRequest, Symbolizer};
use capscope_common::{self as wire, allocation, ctrdef, ctrset, file_chunk, frame, header, jitmap, log, map, mark, sample};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const CAPTURE_TIME: &str = "2026-03-14T09:26:53Z";

pub const LEAF: u64 = 0x1010;
pub const MAIN: u64 = 0x2010;
pub const MEMCPY: u64 = 0x3010;
pub const HELPER: u64 = 0x4010;
pub const START: u64 = 0x5010;
pub const KERNEL_ADDR: u64 = 0xffff_ffff_8100_0150;

/// `(begin, end, name, binary path)`; an empty path means none.
type TableEntry = (u64, u64, &'static str, &'static str);

/// Resolves from fixed tables and counts how often it is asked.
#[derive(Default)]
pub struct TableSymbolizer {
    user: Vec<TableEntry>,
    kernel: Vec<TableEntry>,
    calls: AtomicUsize,
}

impl TableSymbolizer {
    pub fn demo() -> Self {
        Self {
            user: vec![
                (0x1000, 0x1100, "leaf", "/usr/bin/app"),
                (0x2000, 0x2100, "main", "/usr/bin/app"),
                (0x3000, 0x3100, "memcpy", "/usr/lib64/libc.so.6"),
                (0x4000, 0x4100, "helper", "/usr/bin/app"),
                (0x5000, 0x5100, "_start", "/usr/bin/app"),
            ],
            kernel: vec![(0xffff_ffff_8100_0100, 0xffff_ffff_8100_0200, "schedule", "")],
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Symbolizer for TableSymbolizer {
    fn name(&self) -> &'static str {
        "table"
    }

    fn symbolize(&self, request: &SymbolRequest<'_>) -> Option<Symbol> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let (table, kind) = if request.context == AddressContext::Kernel {
            (&self.kernel, SymbolKind::Kernel)
        } else {
            (&self.user, SymbolKind::User)
        };
        table
            .iter()
            .find(|(begin, end, _, _)| (*begin..*end).contains(&request.address))
            .map(|&(begin, end, name, path)| Symbol::new(name, kind).with_path(path).with_range(begin, end))
    }
}

/// One record under construction.
pub struct Rec {
    bytes: Vec<u8>,
    endian: Endianness,
}

impl Rec {
    fn new(endian: Endianness, kind: u8, payload_len: usize, cpu: i16, pid: i32, time: i64) -> Self {
        let len = (payload_len + wire::CAPTURE_ALIGN - 1) / wire::CAPTURE_ALIGN * wire::CAPTURE_ALIGN;
        let mut rec = Self { bytes: vec![0; len], endian };
        rec.u16(frame::LEN, u16::try_from(len).expect("record too long"));
        rec.u16(frame::CPU, cpu as u16);
        rec.u32(frame::PID, pid as u32);
        rec.u64(frame::TIME, time as u64);
        rec.bytes[frame::TYPE] = kind;
        rec
    }

    fn u16(&mut self, off: usize, v: u16) -> &mut Self {
        let b = match self.endian {
            Endianness::Little => v.to_le_bytes(),
            Endianness::Big => v.to_be_bytes(),
        };
        self.bytes[off..off + 2].copy_from_slice(&b);
        self
    }

    fn u32(&mut self, off: usize, v: u32) -> &mut Self {
        let b = match self.endian {
            Endianness::Little => v.to_le_bytes(),
            Endianness::Big => v.to_be_bytes(),
        };
        self.bytes[off..off + 4].copy_from_slice(&b);
        self
    }

    fn u64(&mut self, off: usize, v: u64) -> &mut Self {
        let b = match self.endian {
            Endianness::Little => v.to_le_bytes(),
            Endianness::Big => v.to_be_bytes(),
        };
        self.bytes[off..off + 8].copy_from_slice(&b);
        self
    }

    fn raw(&mut self, off: usize, data: &[u8]) -> &mut Self {
        self.bytes[off..off + data.len()].copy_from_slice(data);
        self
    }

    /// Copy `s` into a fixed field, truncated so a terminator always fits.
    fn fixed(&mut self, off: usize, cap: usize, s: &str) -> &mut Self {
        let n = s.len().min(cap - 1);
        self.raw(off, &s.as_bytes()[..n])
    }
}

/// Capture writer producing the on-disk format in either byte order.
pub struct CaptureBuilder {
    endian: Endianness,
    begin: i64,
    end: i64,
    records: Vec<Vec<u8>>,
    trailer: Vec<u8>,
}

impl CaptureBuilder {
    pub fn new(endian: Endianness) -> Self {
        Self { endian, begin: 1_000, end: 0, records: Vec::new(), trailer: Vec::new() }
    }

    pub fn little() -> Self {
        Self::new(Endianness::Little)
    }

    pub fn big() -> Self {
        Self::new(Endianness::Big)
    }

    /// Declared start and end of the recording.
    pub fn span(mut self, begin: i64, end: i64) -> Self {
        self.begin = begin;
        self.end = end;
        self
    }

    fn push(&mut self, rec: Rec) -> &mut Self {
        self.records.push(rec.bytes);
        self
    }

    fn rec(&self, kind: u8, payload_len: usize, pid: i32, time: i64) -> Rec {
        Rec::new(self.endian, kind, payload_len, 0, pid, time)
    }

    /// A stack sample; `addrs` innermost first.
    pub fn sample(&mut self, time: i64, pid: i32, tid: i32, addrs: &[u64]) -> &mut Self {
        self.sample_on_cpu(time, 0, pid, tid, addrs)
    }

    pub fn sample_on_cpu(&mut self, time: i64, cpu: i16, pid: i32, tid: i32, addrs: &[u64]) -> &mut Self {
        let mut rec = Rec::new(self.endian, wire::FRAME_SAMPLE, sample::ADDRS + addrs.len() * 8, cpu, pid, time);
        rec.u16(sample::N_ADDRS, u16::try_from(addrs.len()).expect("stack too deep"));
        rec.u32(sample::TID, tid as u32);
        for (i, &addr) in addrs.iter().enumerate() {
            rec.u64(sample::ADDRS + i * 8, addr);
        }
        self.push(rec)
    }

    /// Heap address handed out by every [`allocation`](Self::allocation).
    pub const ALLOC_ADDR: u64 = 0x7f00_1000;

    /// An allocation of `size` bytes (zero for a free); `addrs` innermost first.
    pub fn allocation(&mut self, time: i64, pid: i32, tid: i32, size: i64, addrs: &[u64]) -> &mut Self {
        let mut rec = self.rec(wire::FRAME_ALLOCATION, allocation::ADDRS + addrs.len() * 8, pid, time);
        rec.u64(allocation::ALLOC_ADDR, Self::ALLOC_ADDR).u64(allocation::ALLOC_SIZE, size as u64);
        rec.u32(allocation::TID, tid as u32);
        rec.u16(allocation::N_ADDRS, u16::try_from(addrs.len()).expect("stack too deep"));
        for (i, &addr) in addrs.iter().enumerate() {
            rec.u64(allocation::ADDRS + i * 8, addr);
        }
        self.push(rec)
    }

    /// A sample declaring more addresses than it carries.
    pub fn sample_overclaiming(&mut self, time: i64, pid: i32, declared: u16, addrs: &[u64]) -> &mut Self {
        let mut rec = self.rec(wire::FRAME_SAMPLE, sample::ADDRS + addrs.len() * 8, pid, time);
        rec.u16(sample::N_ADDRS, declared);
        rec.u32(sample::TID, pid as u32);
        for (i, &addr) in addrs.iter().enumerate() {
            rec.u64(sample::ADDRS + i * 8, addr);
        }
        self.push(rec)
    }

    pub fn map(&mut self, time: i64, pid: i32, start: u64, end: u64, offset: u64, file: &str) -> &mut Self {
        let mut rec = self.rec(wire::FRAME_MAP, map::FILENAME + file.len() + 1, pid, time);
        rec.u64(map::START, start).u64(map::END, end).u64(map::OFFSET, offset).u64(map::INODE, 0);
        rec.raw(map::FILENAME, file.as_bytes());
        self.push(rec)
    }

    pub fn process(&mut self, time: i64, pid: i32, cmdline: &str) -> &mut Self {
        let mut rec = self.rec(wire::FRAME_PROCESS, wire::process::CMDLINE + cmdline.len() + 1, pid, time);
        rec.raw(wire::process::CMDLINE, cmdline.as_bytes());
        self.push(rec)
    }

    pub fn fork(&mut self, time: i64, pid: i32, child: i32) -> &mut Self {
        let mut rec = self.rec(wire::FRAME_FORK, wire::fork::CHILD_PID + 4, pid, time);
        rec.u32(wire::fork::CHILD_PID, child as u32);
        self.push(rec)
    }

    pub fn exit(&mut self, time: i64, pid: i32) -> &mut Self {
        let rec = self.rec(wire::FRAME_EXIT, wire::FRAME_HEADER_SIZE, pid, time);
        self.push(rec)
    }

    pub fn timestamp(&mut self, time: i64) -> &mut Self {
        let rec = self.rec(wire::FRAME_TIMESTAMP, wire::FRAME_HEADER_SIZE, -1, time);
        self.push(rec)
    }

    pub fn mark(&mut self, time: i64, pid: i32, duration: i64, group: &str, name: &str, message: &str) -> &mut Self {
        let mut rec = self.rec(wire::FRAME_MARK, mark::MESSAGE + message.len() + 1, pid, time);
        rec.u64(mark::DURATION, duration as u64);
        rec.fixed(mark::GROUP, mark::GROUP_LEN, group).fixed(mark::NAME, mark::NAME_LEN, name);
        rec.raw(mark::MESSAGE, message.as_bytes());
        self.push(rec)
    }

    pub fn log(&mut self, time: i64, pid: i32, severity: u16, domain: &str, message: &str) -> &mut Self {
        let mut rec = self.rec(wire::FRAME_LOG, log::MESSAGE + message.len() + 1, pid, time);
        rec.u16(log::SEVERITY, severity).fixed(log::DOMAIN, log::DOMAIN_LEN, domain);
        rec.raw(log::MESSAGE, message.as_bytes());
        self.push(rec)
    }

    fn chunk(&mut self, time: i64, path: &str, data: &[u8], is_last: bool) -> &mut Self {
        let mut rec = self.rec(wire::FRAME_FILE_CHUNK, file_chunk::DATA + data.len(), -1, time);
        if is_last {
            rec.bytes[file_chunk::FLAGS] = match self.endian {
                Endianness::Little => 0x01,
                Endianness::Big => 0x80,
            };
        }
        rec.u16(file_chunk::LEN, u16::try_from(data.len()).expect("chunk too long"));
        rec.fixed(file_chunk::PATH, file_chunk::PATH_LEN, path).raw(file_chunk::DATA, data);
        self.push(rec)
    }

    /// Embed a file as chunks of at most `chunk_size` bytes, one nanosecond
    /// apart starting at `time`.
    pub fn file_chunked(&mut self, time: i64, path: &str, data: &[u8], chunk_size: usize) -> &mut Self {
        let chunks: Vec<&[u8]> = if data.is_empty() { vec![&[][..]] } else { data.chunks(chunk_size).collect() };
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            self.chunk(time + i as i64, path, chunk, i == last);
        }
        self
    }

    pub fn file(&mut self, time: i64, path: &str, data: &[u8]) -> &mut Self {
        self.file_chunked(time, path, data, 4096)
    }

    /// Embed `data` gzip-compressed under `path.gz`.
    pub fn gzip_file(&mut self, time: i64, path: &str, data: &[u8]) -> &mut Self {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).expect("gzip");
        let compressed = encoder.finish().expect("gzip");
        self.file(time, &format!("{path}.gz"), &compressed)
    }

    /// Define counters as `(id, is_double, category, name)`.
    pub fn counter_define(&mut self, time: i64, counters: &[(u32, bool, &str, &str)]) -> &mut Self {
        let size = ctrdef::COUNTERS + counters.len() * ctrdef::COUNTER_SIZE;
        let mut rec = self.rec(wire::FRAME_CTRDEF, size, -1, time);
        rec.u16(ctrdef::N_COUNTERS, u16::try_from(counters.len()).expect("too many counters"));
        for (i, &(id, is_double, category, name)) in counters.iter().enumerate() {
            let base = ctrdef::COUNTERS + i * ctrdef::COUNTER_SIZE;
            let tag = u32::from(if is_double { wire::COUNTER_DOUBLE } else { wire::COUNTER_INT64 });
            let packed = match self.endian {
                Endianness::Little => (tag << 24) | (id & 0x00FF_FFFF),
                Endianness::Big => (id << 8) | tag,
            };
            rec.fixed(base + ctrdef::CATEGORY, ctrdef::CATEGORY_LEN, category);
            rec.fixed(base + ctrdef::NAME, ctrdef::NAME_LEN, name);
            rec.u32(base + ctrdef::ID_AND_TYPE, packed);
        }
        self.push(rec)
    }

    /// Integer counter values as `(id, value)`, one group per eight values.
    pub fn counter_set_i64(&mut self, time: i64, values: &[(u32, i64)]) -> &mut Self {
        let endian = self.endian;
        let raw: Vec<(u32, [u8; 8])> = values
            .iter()
            .map(|&(id, v)| {
                let bytes = match endian {
                    Endianness::Little => v.to_le_bytes(),
                    Endianness::Big => v.to_be_bytes(),
                };
                (id, bytes)
            })
            .collect();
        self.counter_set_raw(time, &raw)
    }

    /// Double counter values, stored in host order as writers do.
    pub fn counter_set_f64(&mut self, time: i64, values: &[(u32, f64)]) -> &mut Self {
        let raw: Vec<(u32, [u8; 8])> = values.iter().map(|&(id, v)| (id, v.to_ne_bytes())).collect();
        self.counter_set_raw(time, &raw)
    }

    fn counter_set_raw(&mut self, time: i64, values: &[(u32, [u8; 8])]) -> &mut Self {
        let groups: Vec<&[(u32, [u8; 8])]> = values.chunks(ctrset::VALUES_PER_GROUP).collect();
        let mut rec = self.rec(wire::FRAME_CTRSET, ctrset::GROUPS + groups.len() * ctrset::GROUP_SIZE, -1, time);
        rec.u16(ctrset::N_GROUPS, u16::try_from(groups.len()).expect("too many groups"));
        for (g, group) in groups.iter().enumerate() {
            let base = ctrset::GROUPS + g * ctrset::GROUP_SIZE;
            for (slot, (id, raw)) in group.iter().enumerate() {
                rec.u32(base + slot * 4, *id);
                rec.raw(base + ctrset::VALUES + slot * 8, raw);
            }
        }
        self.push(rec)
    }

    pub fn jitmap(&mut self, time: i64, pid: i32, entries: &[(u64, &str)]) -> &mut Self {
        let data_len: usize = entries.iter().map(|(_, name)| 8 + name.len() + 1).sum();
        // Trailing padding keeps the last entry's terminator inside the record.
        let mut rec = self.rec(wire::FRAME_JITMAP, jitmap::DATA + data_len + 1, pid, time);
        rec.u32(jitmap::N_JITMAPS, u32::try_from(entries.len()).expect("too many entries"));
        let mut pos = jitmap::DATA;
        for (address, name) in entries {
            rec.u64(pos, *address);
            rec.raw(pos + 8, name.as_bytes());
            pos += 8 + name.len() + 1;
        }
        self.push(rec)
    }

    pub fn overlay(&mut self, time: i64, pid: i32, layer: u32, source: &str, destination: &str) -> &mut Self {
        let size = wire::overlay::DATA + source.len() + 1 + destination.len() + 1;
        let mut rec = self.rec(wire::FRAME_OVERLAY, size, pid, time);
        rec.u32(wire::overlay::LAYER, layer);
        rec.u16(wire::overlay::SRC_LEN, u16::try_from(source.len()).expect("source too long"));
        rec.u16(wire::overlay::DST_LEN, u16::try_from(destination.len()).expect("destination too long"));
        rec.raw(wire::overlay::DATA, source.as_bytes());
        rec.raw(wire::overlay::DATA + source.len() + 1, destination.as_bytes());
        self.push(rec)
    }

    /// Bytes appended verbatim after the last record.
    pub fn trailer(&mut self, bytes: &[u8]) -> &mut Self {
        self.trailer.extend_from_slice(bytes);
        self
    }

    /// A frame header declaring `len` bytes, followed by nothing else.
    pub fn bogus_length(&mut self, len: u16) -> &mut Self {
        let mut rec = Rec { bytes: vec![0; wire::FRAME_HEADER_SIZE], endian: self.endian };
        rec.u16(frame::LEN, len);
        rec.bytes[frame::TYPE] = wire::FRAME_SAMPLE;
        self.trailer.extend_from_slice(&rec.bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut head = Rec { bytes: vec![0; wire::CAPTURE_HEADER_SIZE], endian: self.endian };
        head.u32(header::MAGIC, wire::CAPTURE_MAGIC);
        head.bytes[header::VERSION] = 1;
        head.bytes[header::FLAGS] = u8::from(self.endian == Endianness::Little);
        head.fixed(header::CAPTURE_TIME, header::CAPTURE_TIME_LEN, CAPTURE_TIME);
        head.u64(header::TIME, self.begin as u64);
        head.u64(header::END_TIME, self.end as u64);

        let mut out = head.bytes;
        for record in &self.records {
            out.extend_from_slice(record);
        }
        out.extend_from_slice(&self.trailer);
        out
    }

    pub fn write_temp(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(&self.build()).expect("write capture");
        file.flush().expect("flush capture");
        file
    }

    pub async fn load(&self) -> Arc<Document> {
        self.load_with(LoadOptions::new()).await
    }

    pub async fn load_with(&self, options: LoadOptions) -> Arc<Document> {
        Document::load(self.build().into(), options).await.expect("capture loads")
    }
}
