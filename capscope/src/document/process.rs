//! Per-process state derived while loading.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::address_layout::AddressLayout;
use super::mounts::MountNamespace;
use crate::domain::{Pid, Tid, Timestamp};
use crate::symbolization::{Symbol, SymbolKind};

/// Everything the document knows about one process.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub address_layout: AddressLayout,
    pub mount_namespace: MountNamespace,
    /// Thread ids observed in samples and allocations.
    pub thread_ids: BTreeSet<Tid>,
    /// Full command line, from the latest Process record.
    pub cmdline: Option<String>,
    /// Display symbol: the full command line.
    pub symbol: Option<Arc<Symbol>>,
    /// Command name only, used to merge processes running the same program.
    pub shared_symbol: Option<Arc<Symbol>>,
    /// Used until a Process record names the process.
    pub fallback_symbol: Arc<Symbol>,
    /// Set from the Exit record, else the end of the recording.
    pub exit_time: Option<Timestamp>,
}

impl ProcessInfo {
    #[must_use]
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            address_layout: AddressLayout::new(),
            mount_namespace: MountNamespace::new(),
            thread_ids: BTreeSet::new(),
            cmdline: None,
            symbol: None,
            shared_symbol: None,
            fallback_symbol: Symbol::new(format!("Process {}", pid.0), SymbolKind::Process)
                .with_nick(Self::nick(pid))
                .into_shared(),
            exit_time: None,
        }
    }

    /// Short label shown next to process and thread names.
    #[must_use]
    pub fn nick(pid: Pid) -> String {
        format!("({})", pid.0)
    }

    /// Record a command line. The latest one names the process.
    pub fn set_cmdline(&mut self, cmdline: &str) {
        let shared_name = cmdline.split(' ').next().filter(|s| !s.is_empty()).unwrap_or(cmdline);
        self.symbol = Some(Symbol::new(cmdline, SymbolKind::Process).with_nick(Self::nick(self.pid)).into_shared());
        self.shared_symbol = Some(Symbol::new(shared_name, SymbolKind::Process).into_shared());
        self.cmdline = Some(cmdline.to_string());
    }

    /// The process symbol, optionally the shared (merge-similar) variant.
    #[must_use]
    pub fn process_symbol(&self, want_shared: bool) -> &Arc<Symbol> {
        if want_shared {
            if let Some(shared) = &self.shared_symbol {
                return shared;
            }
        }
        self.symbol.as_ref().unwrap_or(&self.fallback_symbol)
    }

    #[must_use]
    pub fn is_kernel_process(&self) -> bool {
        self.process_symbol(false).is_kernel_process()
    }
}
