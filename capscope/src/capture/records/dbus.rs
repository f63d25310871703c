//! Captured D-Bus traffic.

use capscope_common::dbus;
use std::fmt;

use crate::capture::Endianness;

record_view! {
    DBusMessageRecord
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    Session,
    System,
    Unknown,
}

impl fmt::Display for BusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session => f.write_str("session"),
            Self::System => f.write_str("system"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

impl<'a> DBusMessageRecord<'a> {
    /// `(bus, flags)` unpacked from the 2 + 14 bit field.
    fn packed(&self) -> (u16, u16) {
        let v = self.window().u16(dbus::BUS_AND_FLAGS).unwrap_or_default();
        match self.window().endian() {
            Endianness::Little => (v & 0x3, v >> 2),
            Endianness::Big => (v >> 14, v & 0x3FFF),
        }
    }

    #[must_use]
    pub fn bus_type(&self) -> BusType {
        match self.packed().0 {
            1 => BusType::Session,
            2 => BusType::System,
            _ => BusType::Unknown,
        }
    }

    #[must_use]
    pub fn flags(&self) -> u16 {
        self.packed().1
    }

    /// The serialized message; empty when its length overruns the record.
    #[must_use]
    pub fn message(&self) -> &'a [u8] {
        let len = usize::from(self.window().u16(dbus::MESSAGE_LEN).unwrap_or_default());
        self.window().slice(dbus::MESSAGE, len).unwrap_or_default()
    }
}
