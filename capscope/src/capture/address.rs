//! Context-switch markers embedded in stacks.
//!
//! Kernel-assisted unwinding interleaves reserved addresses into a stack to
//! say which privilege level the following frames belong to. Walking a stack
//! from innermost to outermost and tracking the last marker seen yields the
//! context of every real address.

use capscope_common as wire;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AddressContext {
    /// No marker seen yet.
    #[default]
    None,
    Hypervisor,
    Kernel,
    User,
    Guest,
    GuestKernel,
    GuestUser,
}

impl AddressContext {
    /// The context a marker address switches to, or `None` for ordinary
    /// addresses.
    #[must_use]
    pub fn from_marker(address: u64) -> Option<Self> {
        Some(match address {
            wire::PERF_CONTEXT_HV => Self::Hypervisor,
            wire::PERF_CONTEXT_KERNEL => Self::Kernel,
            wire::PERF_CONTEXT_USER => Self::User,
            wire::PERF_CONTEXT_GUEST => Self::Guest,
            wire::PERF_CONTEXT_GUEST_KERNEL => Self::GuestKernel,
            wire::PERF_CONTEXT_GUEST_USER => Self::GuestUser,
            _ => return None,
        })
    }

    #[must_use]
    pub fn is_context_switch(address: u64) -> bool {
        Self::from_marker(address).is_some()
    }

    /// Dense index, used for per-context symbol tables.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Hypervisor => "Hypervisor",
            Self::Kernel => "Kernel",
            Self::User => "User",
            Self::Guest => "Guest",
            Self::GuestKernel => "Guest Kernel",
            Self::GuestUser => "Guest User",
        }
    }
}

impl fmt::Display for AddressContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether walking `addresses` ever switches into kernel context.
pub fn enters_kernel(addresses: impl IntoIterator<Item = u64>) -> bool {
    addresses.into_iter().any(|a| AddressContext::from_marker(a) == Some(AddressContext::Kernel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers() {
        assert_eq!(AddressContext::from_marker(wire::PERF_CONTEXT_KERNEL), Some(AddressContext::Kernel));
        assert_eq!(AddressContext::from_marker(wire::PERF_CONTEXT_GUEST_USER), Some(AddressContext::GuestUser));
        assert_eq!(AddressContext::from_marker(0x4000_1000), None);
        assert!(!AddressContext::is_context_switch(u64::MAX));
    }

    #[test]
    fn test_enters_kernel() {
        assert!(enters_kernel([wire::PERF_CONTEXT_KERNEL, 0xffff_ffff_8100_0000, wire::PERF_CONTEXT_USER, 0x4000]));
        assert!(!enters_kernel([wire::PERF_CONTEXT_USER, 0x4000]));
        assert!(!enters_kernel(std::iter::empty()));
    }
}
