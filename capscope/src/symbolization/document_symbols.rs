//! Symbol tables for a whole capture.

use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::symbol::{Symbol, SymbolKind};
use super::symbol_cache::SymbolCache;
use super::symbolizer::{SymbolRequest, Symbolizer};
use crate::capture::AddressContext;
use crate::document::{Document, ProcessInfo, ProgressSink};
use crate::domain::{Pid, SymbolizeError};

const CONTEXT_SWITCH_NICK: &str = "Context Switch";

fn context_switch_name(context: AddressContext) -> Option<&'static str> {
    Some(match context {
        AddressContext::None => return None,
        AddressContext::Hypervisor => "- - Hypervisor - -",
        AddressContext::Kernel => "- - Kernel - -",
        AddressContext::User => "- - User - -",
        AddressContext::Guest => "- - Guest - -",
        AddressContext::GuestKernel => "- - Guest Kernel - -",
        AddressContext::GuestUser => "- - Guest User - -",
    })
}

/// Resolved symbols for every stack address in a document.
///
/// Kernel addresses share one table; user addresses get a table per
/// process. Built once by [`Document::symbolize`] and read-only afterwards.
#[derive(Debug, Clone)]
pub struct DocumentSymbols {
    context_switches: Vec<Option<Arc<Symbol>>>,
    kernel: SymbolCache,
    processes: HashMap<Pid, SymbolCache>,
}

impl DocumentSymbols {
    /// Tables that only know the context-switch markers.
    #[must_use]
    pub fn empty() -> Self {
        let context_switches = [
            AddressContext::None,
            AddressContext::Hypervisor,
            AddressContext::Kernel,
            AddressContext::User,
            AddressContext::Guest,
            AddressContext::GuestKernel,
            AddressContext::GuestUser,
        ]
        .into_iter()
        .map(|context| {
            context_switch_name(context).map(|name| {
                Symbol::new(name, SymbolKind::ContextSwitch)
                    .with_nick(CONTEXT_SWITCH_NICK)
                    .with_range(0, 0)
                    .into_shared()
            })
        })
        .collect();

        Self { context_switches, kernel: SymbolCache::new(), processes: HashMap::new() }
    }

    /// Resolve every address of every traceable in `document`.
    ///
    /// Addresses already covered by a previously resolved range are not
    /// sent to the symbolizer again. Misses inside a mapped file resolve to
    /// an `In File …` placeholder; other misses stay unresolved.
    pub(crate) fn build(
        document: &Document,
        symbolizer: &dyn Symbolizer,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Self, SymbolizeError> {
        let mut symbols = Self::empty();
        if symbolizer.resolves_nothing() {
            debug!("Symbolizer {} resolves nothing, skipping", symbolizer.name());
            return Ok(symbols);
        }

        let traceables = document.list_traceables();
        let total = traceables.len();
        let mut resolved = 0usize;

        for (count, traceable) in traceables.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(SymbolizeError::Cancelled);
            }
            if count % 100 == 0 {
                #[allow(clippy::cast_precision_loss)]
                progress.report(count as f64 / total.max(1) as f64, "Symbolizing stack traces");
            }

            let pid = traceable.pid();
            let process = document.process_info(pid);
            let mut last_context = AddressContext::None;

            for address in traceable.addresses(traceable.stack_depth()) {
                if let Some(context) = AddressContext::from_marker(address) {
                    last_context = context;
                    continue;
                }
                let cache = if last_context == AddressContext::Kernel {
                    &mut symbols.kernel
                } else {
                    symbols.processes.entry(pid).or_default()
                };
                if cache.lookup(address).is_some() {
                    continue;
                }
                let request = SymbolRequest { process, context: last_context, address };
                if let Some(symbol) = resolve(symbolizer, &request) {
                    cache.insert(symbol.into_shared());
                    resolved += 1;
                }
            }
        }

        info!(
            "Symbolized {total} stacks: {resolved} symbols, {} kernel, {} processes",
            symbols.kernel.len(),
            symbols.processes.len()
        );
        Ok(symbols)
    }

    /// The marker symbol for switching into `context`.
    #[must_use]
    pub fn context_switch(&self, context: AddressContext) -> Option<&Arc<Symbol>> {
        self.context_switches.get(context.index()).and_then(Option::as_ref)
    }

    /// The symbol for `address` in process `pid`, where `context` is the
    /// context in effect when the address was reached.
    #[must_use]
    pub fn lookup(&self, pid: Pid, context: AddressContext, address: u64) -> Option<Arc<Symbol>> {
        if let Some(new_context) = AddressContext::from_marker(address) {
            return self.context_switch(new_context).cloned();
        }
        let cache = if context == AddressContext::Kernel { Some(&self.kernel) } else { self.processes.get(&pid) };
        cache.and_then(|cache| cache.lookup(address)).cloned()
    }

    #[must_use]
    pub fn kernel_symbols(&self) -> &SymbolCache {
        &self.kernel
    }

    /// User-space symbols resolved for `pid`.
    #[must_use]
    pub fn process_symbols(&self, pid: Pid) -> Option<&SymbolCache> {
        self.processes.get(&pid)
    }

    /// Total number of resolved (non-marker) symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kernel.len() + self.processes.values().map(SymbolCache::len).sum::<usize>()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DocumentSymbols {
    fn default() -> Self {
        Self::empty()
    }
}

/// Ask the symbolizer, falling back to a file-relative placeholder.
fn resolve(symbolizer: &dyn Symbolizer, request: &SymbolRequest<'_>) -> Option<Symbol> {
    symbolizer.symbolize(request).or_else(|| file_fallback(request.process?, request.address))
}

fn file_fallback(process: &ProcessInfo, address: u64) -> Option<Symbol> {
    let mapping = process.address_layout.lookup(address)?;
    let relative = mapping.file_relative(address);
    Some(
        Symbol::new(format!("In File {}+0x{relative:x}", mapping.file), SymbolKind::User)
            .with_path(mapping.file.as_str())
            .with_range(address, address + 1)
            .fallback(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Mapping, MemoryRange};
    use capscope_common as wire;

    #[test]
    fn test_context_switch_symbols() {
        let symbols = DocumentSymbols::empty();
        assert!(symbols.context_switch(AddressContext::None).is_none());
        let kernel = symbols.context_switch(AddressContext::Kernel).unwrap();
        assert_eq!(kernel.name(), "- - Kernel - -");
        assert_eq!(kernel.binary_nick(), Some("Context Switch"));
        assert!(kernel.is_context_switch());

        // A marker resolves to the context it switches into.
        let hit = symbols.lookup(Pid(5), AddressContext::User, wire::PERF_CONTEXT_KERNEL).unwrap();
        assert!(Arc::ptr_eq(&hit, kernel));
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_lookup_routes_by_context() {
        let mut symbols = DocumentSymbols::empty();
        symbols
            .kernel
            .insert(Symbol::new("schedule", SymbolKind::Kernel).with_range(0x100, 0x200).into_shared());
        symbols
            .processes
            .entry(Pid(7))
            .or_default()
            .insert(Symbol::new("main", SymbolKind::User).with_range(0x100, 0x200).into_shared());

        assert_eq!(symbols.lookup(Pid(7), AddressContext::Kernel, 0x150).unwrap().name(), "schedule");
        assert_eq!(symbols.lookup(Pid(7), AddressContext::User, 0x150).unwrap().name(), "main");
        assert_eq!(symbols.lookup(Pid(7), AddressContext::None, 0x150).unwrap().name(), "main");
        assert!(symbols.lookup(Pid(8), AddressContext::User, 0x150).is_none());
        assert_eq!(symbols.len(), 2);
    }

    #[test]
    fn test_file_fallback() {
        let mut process = ProcessInfo::new(Pid(3));
        process.address_layout.push(Mapping {
            range: MemoryRange { start: 0x4000, end: 0x8000 },
            file_offset: 0x1000,
            inode: 0,
            file: "/usr/bin/app".to_string(),
            build_id: None,
        });
        process.address_layout.seal();

        let symbol = file_fallback(&process, 0x4780).unwrap();
        assert_eq!(symbol.name(), "In File /usr/bin/app+0x1780");
        assert_eq!(symbol.binary_path(), Some("/usr/bin/app"));
        assert_eq!((symbol.begin_address(), symbol.end_address()), (0x4780, 0x4781));
        assert!(symbol.is_fallback());
        assert!(file_fallback(&process, 0x9000).is_none());
    }
}
