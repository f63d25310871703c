//! # Capture Wire Format (Reader ↔ Writer)
//!
//! Constants describing the on-disk layout of a profiler capture. The reader
//! in `capscope` and any capture writer share these so that both sides agree
//! on offsets without exchanging `#[repr(C)]` structs (captures are read from
//! unaligned, possibly byte-swapped memory, so the reader never casts bytes
//! into structs).
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────┐ 0
//! │ file header (256 bytes)  │
//! ├──────────────────────────┤ 256
//! │ record: len|cpu|pid|time │  24-byte record header
//! │         type|payload…    │  padded to CAPTURE_ALIGN
//! ├──────────────────────────┤
//! │ record …                 │
//! └──────────────────────────┘
//! ```
//!
//! Every multi-byte field is stored in the writer's byte order; the header's
//! little-endian flag tells the reader whether to swap.

#![no_std]

// ============================================================================
// File Header
// ============================================================================

/// Magic number at offset 0 of every capture, in the writer's byte order.
pub const CAPTURE_MAGIC: u32 = 0xFDCA_975E;

/// Size of the fixed file header in bytes.
pub const CAPTURE_HEADER_SIZE: usize = 256;

/// Records are padded to a multiple of this many bytes (one captured address).
pub const CAPTURE_ALIGN: usize = 8;

/// Byte offsets inside the file header.
pub mod header {
    /// `u32` magic.
    pub const MAGIC: usize = 0;
    /// `u8` format version.
    pub const VERSION: usize = 4;
    /// Bit 0 is set when the capture was written little-endian.
    pub const FLAGS: usize = 5;
    /// NUL-padded ISO-8601 wall-clock string.
    pub const CAPTURE_TIME: usize = 8;
    /// Length of the wall-clock string field.
    pub const CAPTURE_TIME_LEN: usize = 64;
    /// `i64` monotonic start of the recording.
    pub const TIME: usize = 72;
    /// `i64` monotonic end of the recording (0 if the writer never set it).
    pub const END_TIME: usize = 80;
}

// ============================================================================
// Record Header
// ============================================================================

/// Size of the common record header; also the smallest valid record.
pub const FRAME_HEADER_SIZE: usize = 24;

/// Byte offsets inside the common record header.
pub mod frame {
    /// `u16` total record length including this header.
    pub const LEN: usize = 0;
    /// `i16` CPU the record was emitted on (-1 when unknown).
    pub const CPU: usize = 2;
    /// `i32` process id.
    pub const PID: usize = 4;
    /// `i64` monotonic timestamp in nanoseconds.
    pub const TIME: usize = 8;
    /// `u8` record kind tag. Single byte, never swapped.
    pub const TYPE: usize = 16;
}

// ============================================================================
// Record Kind Tags
// ============================================================================

pub const FRAME_TIMESTAMP: u8 = 1;
pub const FRAME_SAMPLE: u8 = 2;
pub const FRAME_MAP: u8 = 3;
pub const FRAME_PROCESS: u8 = 4;
pub const FRAME_FORK: u8 = 5;
pub const FRAME_EXIT: u8 = 6;
pub const FRAME_JITMAP: u8 = 7;
pub const FRAME_CTRDEF: u8 = 8;
pub const FRAME_CTRSET: u8 = 9;
pub const FRAME_MARK: u8 = 10;
pub const FRAME_METADATA: u8 = 11;
pub const FRAME_LOG: u8 = 12;
pub const FRAME_FILE_CHUNK: u8 = 13;
pub const FRAME_ALLOCATION: u8 = 14;
pub const FRAME_OVERLAY: u8 = 15;
pub const FRAME_TRACE: u8 = 16;
pub const FRAME_DBUS_MESSAGE: u8 = 17;

// ============================================================================
// Record Payloads
// ============================================================================

/// Sample and Trace records.
pub mod sample {
    /// `u16` number of addresses that follow.
    pub const N_ADDRS: usize = 24;
    /// Trace only: bit 0 (LE) or bit 7 (BE) marks a function entry.
    pub const TRACE_FLAGS: usize = 26;
    /// `i32` thread id.
    pub const TID: usize = 28;
    /// First `u64` address, innermost frame first.
    pub const ADDRS: usize = 32;
}

/// Allocation records.
pub mod allocation {
    pub const ALLOC_ADDR: usize = 24;
    /// `i64`; zero means the record is a free.
    pub const ALLOC_SIZE: usize = 32;
    pub const TID: usize = 40;
    pub const N_ADDRS: usize = 44;
    pub const ADDRS: usize = 48;
}

/// Map (mmap) records.
pub mod map {
    pub const START: usize = 24;
    pub const END: usize = 32;
    pub const OFFSET: usize = 40;
    pub const INODE: usize = 48;
    /// NUL-terminated file name, optionally followed by `@<build-id>\0`.
    pub const FILENAME: usize = 56;
}

/// Process records.
pub mod process {
    pub const CMDLINE: usize = 24;
}

/// Fork records.
pub mod fork {
    pub const CHILD_PID: usize = 24;
}

/// Jitmap records.
pub mod jitmap {
    pub const N_JITMAPS: usize = 24;
    /// Repeated `(u64 address, NUL-terminated name)` pairs.
    pub const DATA: usize = 28;
}

/// Counter definition records.
pub mod ctrdef {
    pub const N_COUNTERS: usize = 24;
    pub const COUNTERS: usize = 32;
    /// Size of one counter definition.
    pub const COUNTER_SIZE: usize = 128;
    pub const CATEGORY: usize = 0;
    pub const CATEGORY_LEN: usize = 32;
    pub const NAME: usize = 32;
    pub const NAME_LEN: usize = 32;
    pub const DESCRIPTION: usize = 64;
    pub const DESCRIPTION_LEN: usize = 52;
    /// `u32` packing a 24-bit id and an 8-bit type.
    pub const ID_AND_TYPE: usize = 116;
    /// Initial value, 8 raw bytes.
    pub const VALUE: usize = 120;
}

/// Counter set records.
pub mod ctrset {
    pub const N_GROUPS: usize = 24;
    pub const GROUPS: usize = 32;
    /// Size of one group of up to eight values.
    pub const GROUP_SIZE: usize = 96;
    /// Fan-out of a single group.
    pub const VALUES_PER_GROUP: usize = 8;
    /// Offset of the value array within a group (after eight `u32` ids).
    pub const VALUES: usize = 32;
}

/// Counter value types.
pub const COUNTER_INT64: u8 = 0;
pub const COUNTER_DOUBLE: u8 = 1;

/// Mark records.
pub mod mark {
    pub const DURATION: usize = 24;
    pub const GROUP: usize = 32;
    pub const GROUP_LEN: usize = 24;
    pub const NAME: usize = 56;
    pub const NAME_LEN: usize = 40;
    pub const MESSAGE: usize = 96;
}

/// Metadata records.
pub mod metadata {
    pub const ID: usize = 24;
    pub const ID_LEN: usize = 40;
    pub const METADATA: usize = 64;
}

/// Log records.
pub mod log {
    pub const SEVERITY: usize = 24;
    pub const DOMAIN: usize = 32;
    pub const DOMAIN_LEN: usize = 32;
    pub const MESSAGE: usize = 64;
}

/// File chunk records.
pub mod file_chunk {
    /// Bit 0 (LE) or bit 7 (BE) marks the final chunk of a file.
    pub const FLAGS: usize = 24;
    pub const LEN: usize = 26;
    pub const PATH: usize = 28;
    pub const PATH_LEN: usize = 256;
    pub const DATA: usize = 284;
}

/// Overlay records.
pub mod overlay {
    pub const LAYER: usize = 24;
    pub const SRC_LEN: usize = 28;
    pub const DST_LEN: usize = 30;
    /// `src\0dst\0`.
    pub const DATA: usize = 32;
}

/// D-Bus message records.
pub mod dbus {
    /// `u16` packing a 2-bit bus type and 14 bits of flags.
    pub const BUS_AND_FLAGS: usize = 24;
    pub const MESSAGE_LEN: usize = 26;
    pub const MESSAGE: usize = 32;
}

// ============================================================================
// Stack Addresses
// ============================================================================

/// Context-switch markers inserted into stacks by the kernel (perf ABI).
pub const PERF_CONTEXT_HV: u64 = -32_i64 as u64;
pub const PERF_CONTEXT_KERNEL: u64 = -128_i64 as u64;
pub const PERF_CONTEXT_USER: u64 = -512_i64 as u64;
pub const PERF_CONTEXT_GUEST: u64 = -2048_i64 as u64;
pub const PERF_CONTEXT_GUEST_KERNEL: u64 = -2176_i64 as u64;
pub const PERF_CONTEXT_GUEST_USER: u64 = -2560_i64 as u64;

/// Upper 32 bits of every address handed out by a JIT map.
pub const JITMAP_ADDRESS_TAG: u64 = 0xE000_0000_0000_0000;
pub const JITMAP_ADDRESS_MASK: u64 = 0xFFFF_FFFF_0000_0000;

/// Deepest stack the analyses will consider.
pub const MAX_STACK_DEPTH: usize = 128;
