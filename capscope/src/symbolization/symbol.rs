//! Resolved symbols.
//!
//! A [`Symbol`] is immutable once built and is shared as `Arc<Symbol>` across
//! every stack that resolves to it. Two symbols compare equal when their name,
//! nick and binary file name match; the directory of the binary is ignored so
//! that the same library seen through different mount namespaces or
//! containers aggregates together.

use rustc_demangle::demangle;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// What a symbol stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    /// The synthetic root of a callgraph.
    Root,
    Process,
    Thread,
    /// A context-switch marker (user/kernel boundary).
    ContextSwitch,
    /// Code in a user-space binary.
    User,
    /// Code in the kernel.
    Kernel,
    /// A stack that could not be unwound, or an unknown process.
    Unwindable,
}

impl SymbolKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Process => "process",
            Self::Thread => "thread",
            Self::ContextSwitch => "context-switch",
            Self::User => "user",
            Self::Kernel => "kernel",
            Self::Unwindable => "unwindable",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Command names of kernel worker threads, which have no user-space stack.
const KERNEL_PROCESS_PREFIXES: &[&str] =
    &["kworker/", "migration/", "dmcrypt_write/", "hwrng", "irq/", "ksoftirqd/"];

fn looks_like_kernel_process(name: &str) -> bool {
    name == "rcu_preempt" || KERNEL_PROCESS_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Demangle a Rust symbol name (legacy `_ZN` or v0 `_R`). Other names,
/// including C++ ones, come back unchanged.
#[must_use]
pub fn demangle_symbol(name: &str) -> String {
    format!("{:#}", demangle(name))
}

#[derive(Debug, Clone)]
pub struct Symbol {
    name: String,
    binary_path: Option<String>,
    binary_nick: Option<String>,
    begin: u64,
    end: u64,
    kind: SymbolKind,
    is_fallback: bool,
    is_kernel_process: bool,
}

impl Symbol {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        let name = name.into();
        let is_kernel_process = kind == SymbolKind::Process && looks_like_kernel_process(&name);
        Self {
            name,
            binary_path: None,
            binary_nick: None,
            begin: 0,
            end: 0,
            kind,
            is_fallback: false,
            is_kernel_process,
        }
    }

    /// Path of the binary containing the symbol. Empty paths are dropped.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.binary_path = (!path.is_empty()).then_some(path);
        self
    }

    /// Short label shown next to the name. Empty nicks are dropped.
    #[must_use]
    pub fn with_nick(mut self, nick: impl Into<String>) -> Self {
        let nick = nick.into();
        self.binary_nick = (!nick.is_empty()).then_some(nick);
        self
    }

    /// Address range `[begin, end)` the symbol covers.
    #[must_use]
    pub fn with_range(mut self, begin: u64, end: u64) -> Self {
        self.begin = begin;
        self.end = end;
        self
    }

    /// Marks a placeholder produced when no symbolizer knew the address.
    #[must_use]
    pub fn fallback(mut self) -> Self {
        self.is_fallback = true;
        self
    }

    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn binary_path(&self) -> Option<&str> {
        self.binary_path.as_deref()
    }

    #[must_use]
    pub fn binary_nick(&self) -> Option<&str> {
        self.binary_nick.as_deref()
    }

    /// File name component of [`binary_path`](Self::binary_path).
    #[must_use]
    pub fn binary_file_name(&self) -> Option<&str> {
        self.binary_path.as_deref().map(|p| p.rsplit('/').next().unwrap_or(p))
    }

    #[must_use]
    pub fn begin_address(&self) -> u64 {
        self.begin
    }

    #[must_use]
    pub fn end_address(&self) -> u64 {
        self.end
    }

    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        address >= self.begin && address < self.end
    }

    #[must_use]
    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    /// Process symbols whose name matches a kernel worker thread.
    #[must_use]
    pub fn is_kernel_process(&self) -> bool {
        self.is_kernel_process
    }

    /// Code in a binary under `/usr/lib*` or `/lib*`.
    #[must_use]
    pub fn is_system_library(&self) -> bool {
        self.binary_path.as_deref().is_some_and(|p| p.starts_with("/usr/lib") || p.starts_with("/lib"))
    }

    #[must_use]
    pub fn is_context_switch(&self) -> bool {
        self.kind == SymbolKind::ContextSwitch
    }

    /// Text suitable for a tooltip: name, then binary and range if known.
    #[must_use]
    pub fn tooltip(&self) -> String {
        match (&self.binary_path, &self.binary_nick) {
            (Some(path), _) => format!("{} [{path}+0x{:x}]", self.name, self.begin),
            (None, Some(nick)) => format!("{} [{nick}]", self.name),
            (None, None) => self.name.clone(),
        }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.binary_nick == other.binary_nick
            && self.binary_file_name() == other.binary_file_name()
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.binary_nick.hash(state);
        self.binary_file_name().hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binary_nick {
            Some(nick) => write!(f, "{} {nick}", self.name),
            None => f.write_str(&self.name),
        }
    }
}
