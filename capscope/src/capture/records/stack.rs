//! Stack-carrying records: samples, traces and allocations.

use capscope_common::{self as wire, allocation, sample};

use crate::capture::Frame;
use crate::domain::{Pid, Tid, Timestamp};

record_view! {
    /// A periodic stack sample.
    SampleRecord
}

record_view! {
    /// A function entry/exit event with a stack.
    TraceRecord
}

record_view! {
    /// A heap allocation or free with the allocating stack.
    AllocationRecord
}

/// Number of addresses actually present, never more than the window holds.
fn clamped_depth(frame: &Frame<'_>, n_addrs_at: usize, addrs_at: usize) -> usize {
    let declared = usize::from(frame.window().u16(n_addrs_at).unwrap_or_default());
    let room = frame.len().saturating_sub(addrs_at) / 8;
    declared.min(room)
}

fn address_at(frame: &Frame<'_>, addrs_at: usize, depth: usize, nth: usize) -> Option<u64> {
    if nth >= depth {
        return None;
    }
    frame.window().u64(addrs_at + nth * 8)
}

impl SampleRecord<'_> {
    #[must_use]
    pub fn thread_id(&self) -> Tid {
        Tid(self.window().i32(sample::TID).unwrap_or_default())
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        clamped_depth(&self.frame, sample::N_ADDRS, sample::ADDRS)
    }

    /// The `nth` address, innermost frame first.
    #[must_use]
    pub fn address(&self, nth: usize) -> Option<u64> {
        address_at(&self.frame, sample::ADDRS, self.stack_depth(), nth)
    }
}

impl TraceRecord<'_> {
    #[must_use]
    pub fn thread_id(&self) -> Tid {
        Tid(self.window().i32(sample::TID).unwrap_or_default())
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        clamped_depth(&self.frame, sample::N_ADDRS, sample::ADDRS)
    }

    #[must_use]
    pub fn address(&self, nth: usize) -> Option<u64> {
        address_at(&self.frame, sample::ADDRS, self.stack_depth(), nth)
    }

    /// Whether this event marks entry into (rather than exit from) a function.
    #[must_use]
    pub fn entering(&self) -> bool {
        let flags = self.window().u8(sample::TRACE_FLAGS).unwrap_or_default();
        let mask = match self.window().endian() {
            crate::capture::Endianness::Little => 0x01,
            crate::capture::Endianness::Big => 0x80,
        };
        flags & mask != 0
    }
}

impl AllocationRecord<'_> {
    #[must_use]
    pub fn thread_id(&self) -> Tid {
        Tid(self.window().i32(allocation::TID).unwrap_or_default())
    }

    #[must_use]
    pub fn alloc_address(&self) -> u64 {
        self.window().u64(allocation::ALLOC_ADDR).unwrap_or_default()
    }

    /// Bytes allocated; zero for a free.
    #[must_use]
    pub fn size(&self) -> i64 {
        self.window().i64(allocation::ALLOC_SIZE).unwrap_or_default()
    }

    #[must_use]
    pub fn is_free(&self) -> bool {
        self.size() == 0
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        clamped_depth(&self.frame, allocation::N_ADDRS, allocation::ADDRS)
    }

    #[must_use]
    pub fn address(&self, nth: usize) -> Option<u64> {
        address_at(&self.frame, allocation::ADDRS, self.stack_depth(), nth)
    }
}

/// A record carrying a stack trace that can be symbolized and aggregated.
#[derive(Debug, Clone, Copy)]
pub enum Traceable<'a> {
    Sample(SampleRecord<'a>),
    Allocation(AllocationRecord<'a>),
}

impl<'a> Traceable<'a> {
    #[must_use]
    pub fn frame(&self) -> Frame<'a> {
        match self {
            Self::Sample(s) => s.frame(),
            Self::Allocation(a) => a.frame(),
        }
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.frame().position()
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.frame().pid()
    }

    #[must_use]
    pub fn time(&self) -> Timestamp {
        self.frame().time()
    }

    #[must_use]
    pub fn thread_id(&self) -> Tid {
        match self {
            Self::Sample(s) => s.thread_id(),
            Self::Allocation(a) => a.thread_id(),
        }
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        match self {
            Self::Sample(s) => s.stack_depth(),
            Self::Allocation(a) => a.stack_depth(),
        }
    }

    #[must_use]
    pub fn address(&self, nth: usize) -> Option<u64> {
        match self {
            Self::Sample(s) => s.address(nth),
            Self::Allocation(a) => a.address(nth),
        }
    }

    /// Up to `max` addresses, innermost first.
    #[must_use]
    pub fn addresses(&self, max: usize) -> Vec<u64> {
        let depth = self.stack_depth().min(max);
        (0..depth).filter_map(|i| self.address(i)).collect()
    }

    /// Whether the kind tag marks this as one of the traceable kinds.
    #[must_use]
    pub fn is_traceable_kind(tag: u8) -> bool {
        tag == wire::FRAME_SAMPLE || tag == wire::FRAME_ALLOCATION
    }
}
