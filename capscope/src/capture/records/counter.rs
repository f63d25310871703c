//! Counter definitions and counter value sets.
//!
//! A counter's value type is only known from its definition, so value sets
//! hand out [`RawCounterValue`]s that are decoded once the definition has been
//! found. Integer values are stored in the writer's byte order; doubles are
//! stored as host-order IEEE-754 bits and are never swapped.

use capscope_common::{self as wire, ctrdef, ctrset};
use std::fmt;

use crate::capture::{ByteWindow, Endianness};

record_view! {
    /// Declares one or more counters.
    CounterDefineRecord
}

record_view! {
    /// A batch of counter values observed at one instant.
    CounterSetRecord
}

/// Type tag of a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    Int64,
    Double,
}

impl CounterKind {
    /// Unknown tags are treated as integers.
    #[must_use]
    pub fn from_tag(tag: u8) -> Self {
        if tag == wire::COUNTER_DOUBLE {
            Self::Double
        } else {
            Self::Int64
        }
    }
}

/// Eight value bytes exactly as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCounterValue(pub [u8; 8]);

impl RawCounterValue {
    #[must_use]
    pub fn decode(self, kind: CounterKind, endian: Endianness) -> CounterValue {
        match kind {
            CounterKind::Int64 => CounterValue::Int64(endian.read_i64(&self.0)),
            CounterKind::Double => CounterValue::Double(f64::from_ne_bytes(self.0)),
        }
    }
}

/// A decoded counter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CounterValue {
    Int64(i64),
    Double(f64),
}

impl CounterValue {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int64(v) => v as f64,
            Self::Double(v) => v,
        }
    }

    /// Integer view; doubles outside the `i64` range read as 0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Int64(v) => v,
            #[allow(clippy::cast_precision_loss)]
            Self::Double(v) if v.is_finite() && v >= i64::MIN as f64 && v <= i64::MAX as f64 => v as i64,
            Self::Double(_) => 0,
        }
    }
}

impl fmt::Display for CounterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v:.3}"),
        }
    }
}

/// One counter declared by a [`CounterDefineRecord`].
#[derive(Debug, Clone, Copy)]
pub struct CounterDefinition<'a> {
    pub id: u32,
    pub kind: CounterKind,
    pub category: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub initial: RawCounterValue,
}

impl<'a> CounterDefineRecord<'a> {
    /// Declared counter count, clamped to what the record can hold.
    #[must_use]
    pub fn n_counters(&self) -> usize {
        let declared = usize::from(self.window().u16(ctrdef::N_COUNTERS).unwrap_or_default());
        let room = self.window().len().saturating_sub(ctrdef::COUNTERS) / ctrdef::COUNTER_SIZE;
        declared.min(room)
    }

    #[must_use]
    pub fn counter(&self, nth: usize) -> Option<CounterDefinition<'a>> {
        if nth >= self.n_counters() {
            return None;
        }
        let window = self.window();
        let base = ctrdef::COUNTERS + nth * ctrdef::COUNTER_SIZE;
        let packed = window.u32(base + ctrdef::ID_AND_TYPE)?;
        // The bitfield is laid out by the writer's compiler, so its order flips
        // with the byte order.
        let (id, tag) = match window.endian() {
            Endianness::Little => (packed & 0x00FF_FFFF, (packed >> 24) as u8),
            Endianness::Big => (packed >> 8, (packed & 0xFF) as u8),
        };
        Some(CounterDefinition {
            id,
            kind: CounterKind::from_tag(tag),
            category: window.fixed_str(base + ctrdef::CATEGORY, ctrdef::CATEGORY_LEN).unwrap_or_default(),
            name: window.fixed_str(base + ctrdef::NAME, ctrdef::NAME_LEN).unwrap_or_default(),
            description: window
                .fixed_str(base + ctrdef::DESCRIPTION, ctrdef::DESCRIPTION_LEN)
                .unwrap_or_default(),
            initial: RawCounterValue(window.raw8(base + ctrdef::VALUE)?),
        })
    }

    pub fn counters(&self) -> impl Iterator<Item = CounterDefinition<'a>> + '_ {
        (0..self.n_counters()).filter_map(move |i| self.counter(i))
    }
}

impl<'a> CounterSetRecord<'a> {
    #[must_use]
    pub fn n_groups(&self) -> usize {
        let declared = usize::from(self.window().u16(ctrset::N_GROUPS).unwrap_or_default());
        let room = self.window().len().saturating_sub(ctrset::GROUPS) / ctrset::GROUP_SIZE;
        declared.min(room)
    }

    /// Every `(counter id, raw value)` pair. A zero id ends its group.
    #[must_use]
    pub fn values(&self) -> CounterSetValues<'a> {
        CounterSetValues { window: self.window(), n_groups: self.n_groups(), group: 0, slot: 0 }
    }
}

/// Iterator returned by [`CounterSetRecord::values`].
#[derive(Debug, Clone)]
pub struct CounterSetValues<'a> {
    window: ByteWindow<'a>,
    n_groups: usize,
    group: usize,
    slot: usize,
}

impl Iterator for CounterSetValues<'_> {
    type Item = (u32, RawCounterValue);

    fn next(&mut self) -> Option<Self::Item> {
        while self.group < self.n_groups {
            if self.slot >= ctrset::VALUES_PER_GROUP {
                self.group += 1;
                self.slot = 0;
                continue;
            }
            let base = ctrset::GROUPS + self.group * ctrset::GROUP_SIZE;
            let id = self.window.u32(base + self.slot * 4)?;
            if id == 0 {
                self.slot = ctrset::VALUES_PER_GROUP;
                continue;
            }
            let raw = self.window.raw8(base + ctrset::VALUES + self.slot * 8)?;
            self.slot += 1;
            return Some((id, RawCounterValue(raw)));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::RecordBytes;
    use super::*;

    fn define(endian: Endianness, id: u32, kind: u8) -> RecordBytes {
        let mut rec = RecordBytes::new(wire::FRAME_CTRDEF, 32 + ctrdef::COUNTER_SIZE, endian);
        rec.put_u16(ctrdef::N_COUNTERS, 1);
        let base = ctrdef::COUNTERS;
        rec.put_str(base + ctrdef::CATEGORY, "CPU Percent\0")
            .put_str(base + ctrdef::NAME, "Total\0")
            .put_str(base + ctrdef::DESCRIPTION, "Combined CPU usage\0");
        let packed = match endian {
            Endianness::Little => id | (u32::from(kind) << 24),
            Endianness::Big => (id << 8) | u32::from(kind),
        };
        rec.put_u32(base + ctrdef::ID_AND_TYPE, packed);
        rec
    }

    #[test]
    fn test_define_both_orders() {
        for endian in [Endianness::Little, Endianness::Big] {
            let rec = define(endian, 7, wire::COUNTER_DOUBLE);
            let d = CounterDefineRecord::new(rec.frame());
            let counters: Vec<_> = d.counters().collect();
            assert_eq!(counters.len(), 1);
            assert_eq!(counters[0].id, 7);
            assert_eq!(counters[0].kind, CounterKind::Double);
            assert_eq!(counters[0].category, "CPU Percent");
            assert_eq!(counters[0].name, "Total");
            assert_eq!(counters[0].description, "Combined CPU usage");
        }
    }

    #[test]
    fn test_unknown_kind_is_integer() {
        assert_eq!(CounterKind::from_tag(9), CounterKind::Int64);
    }

    #[test]
    fn test_set_values_stop_at_zero_id() {
        let endian = Endianness::Big;
        let mut rec = RecordBytes::new(wire::FRAME_CTRSET, 32 + 2 * ctrset::GROUP_SIZE, endian);
        rec.put_u16(ctrset::N_GROUPS, 2);
        rec.put_u32(ctrset::GROUPS, 3).put_i64(ctrset::GROUPS + ctrset::VALUES, -5);
        // second slot of the first group left at id 0
        let second = ctrset::GROUPS + ctrset::GROUP_SIZE;
        rec.put_u32(second, 4);
        rec.bytes[second + ctrset::VALUES..second + ctrset::VALUES + 8].copy_from_slice(&2.5f64.to_ne_bytes());

        let set = CounterSetRecord::new(rec.frame());
        let values: Vec<_> = set.values().collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].0, 3);
        assert_eq!(values[0].1.decode(CounterKind::Int64, endian), CounterValue::Int64(-5));
        assert_eq!(values[1].0, 4);
        assert_eq!(values[1].1.decode(CounterKind::Double, endian), CounterValue::Double(2.5));
    }

    #[test]
    fn test_declared_groups_clamped() {
        let mut rec = RecordBytes::new(wire::FRAME_CTRSET, 32, Endianness::Little);
        rec.put_u16(ctrset::N_GROUPS, 40);
        let set = CounterSetRecord::new(rec.frame());
        assert_eq!(set.n_groups(), 0);
        assert_eq!(set.values().count(), 0);
    }

    #[test]
    fn test_value_views() {
        assert!((CounterValue::Int64(3).as_f64() - 3.0).abs() < f64::EPSILON);
        assert_eq!(CounterValue::Double(2.9).as_i64(), 2);
        assert_eq!(CounterValue::Double(f64::MAX).as_i64(), 0);
    }
}
