//! Kernel symbols from a `/proc/kallsyms` listing.

use log::debug;
use parking_lot::RwLock;
use std::io::{self, Read};
use tokio_util::sync::CancellationToken;

use super::symbol::{demangle_symbol, Symbol, SymbolKind};
use super::symbolizer::{SymbolRequest, Symbolizer};
use crate::capture::AddressContext;
use crate::document::Document;
use crate::domain::SymbolizeError;

const KALLSYMS_PATH: &str = "/proc/kallsyms";

/// Assumed length of the last symbol, which has no successor to bound it.
const LAST_SYMBOL_LEN: u64 = 0xffff;

const NICK: &str = "Linux";

#[derive(Debug, Clone)]
struct KernelSymbol {
    address: u64,
    name: String,
}

#[derive(Debug, Default)]
struct KernelTable {
    symbols: Vec<KernelSymbol>,
    low: u64,
    high: u64,
}

impl KernelTable {
    fn parse(text: &str, cancel: &CancellationToken) -> Result<Self, SymbolizeError> {
        let mut symbols = Vec::new();

        for (n, line) in text.lines().enumerate() {
            if n % 4096 == 0 && cancel.is_cancelled() {
                return Err(SymbolizeError::Cancelled);
            }
            let Some((address, name)) = parse_line(line) else {
                continue;
            };
            let name = if name.starts_with("_R") { demangle_symbol(name) } else { name.to_string() };
            symbols.push(KernelSymbol { address, name });
        }

        // Aliases share an address; the first one listed wins.
        symbols.sort_by_key(|s| s.address);
        symbols.dedup_by_key(|s| s.address);
        let low = symbols.first().map_or(0, |s| s.address);
        let high = symbols.last().map_or(0, |s| s.address.saturating_add(LAST_SYMBOL_LEN));
        Ok(Self { symbols, low, high })
    }

    fn lookup(&self, address: u64) -> Option<Symbol> {
        if address < self.low || address >= self.high {
            return None;
        }
        let index = self.symbols.partition_point(|s| s.address <= address).checked_sub(1)?;
        let symbol = &self.symbols[index];
        let end = self
            .symbols
            .get(index + 1)
            .map_or(symbol.address.saturating_add(LAST_SYMBOL_LEN), |next| next.address);
        Some(
            Symbol::new(symbol.name.as_str(), SymbolKind::Kernel)
                .with_nick(NICK)
                .with_range(symbol.address, end),
        )
    }
}

/// `ffffffff81000000 T _stext [module]` → address and name.
fn parse_line(line: &str) -> Option<(u64, &str)> {
    let mut fields = line.split_whitespace();
    let address = u64::from_str_radix(fields.next()?, 16).ok()?;
    let _kind = fields.next()?;
    let name = fields.next()?;
    Some((address, name))
}

/// Resolves kernel addresses.
///
/// Reads the capture's embedded `/proc/kallsyms` unless a listing was
/// supplied up front. Addresses outside every known symbol still resolve, to
/// an `In Kernel+0x…` placeholder.
#[derive(Debug, Default)]
pub struct KallsymsSymbolizer {
    supplied: Option<String>,
    table: RwLock<KernelTable>,
}

impl KallsymsSymbolizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a listing read from `reader` instead of the capture's.
    ///
    /// # Errors
    /// Fails if `reader` fails or does not yield UTF-8.
    pub fn from_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(Self { supplied: Some(text), table: RwLock::default() })
    }

    /// Number of kernel symbols loaded by `prepare`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Symbolizer for KallsymsSymbolizer {
    fn name(&self) -> &'static str {
        "kallsyms"
    }

    fn prepare(&self, document: &Document, cancel: &CancellationToken) -> Result<(), SymbolizeError> {
        let table = match &self.supplied {
            Some(text) => KernelTable::parse(text, cancel)?,
            None => {
                let file = document
                    .lookup_file(KALLSYMS_PATH)
                    .ok_or_else(|| SymbolizeError::MissingInput(KALLSYMS_PATH.to_string()))?;
                KernelTable::parse(&file.read_to_string()?, cancel)?
            }
        };
        // Restricted listings (kptr_restrict) print every address as zero.
        if table.symbols.last().map_or(true, |s| s.address == 0) {
            return Err(SymbolizeError::PrepareFailed {
                symbolizer: self.name(),
                reason: "listing has no symbol addresses".to_string(),
            });
        }
        debug!("Loaded {} kernel symbols", table.symbols.len());
        *self.table.write() = table;
        Ok(())
    }

    fn symbolize(&self, request: &SymbolRequest<'_>) -> Option<Symbol> {
        if request.context != AddressContext::Kernel {
            return None;
        }
        let address = request.address;
        let resolved = self.table.read().lookup(address);
        Some(resolved.unwrap_or_else(|| {
            Symbol::new(format!("In Kernel+0x{address:x}"), SymbolKind::Kernel)
                .with_nick(NICK)
                .with_range(address, address.saturating_add(1))
                .fallback()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
ffffffff81000100 T schedule
ffffffff81000000 T _stext
ffffffff81000000 T _text
ffffffff81000200 t do_idle [kernel]
garbage line
";

    fn prepared() -> KallsymsSymbolizer {
        let symbolizer = KallsymsSymbolizer::from_reader(LISTING.as_bytes()).unwrap();
        let table = KernelTable::parse(LISTING, &CancellationToken::new()).unwrap();
        *symbolizer.table.write() = table;
        symbolizer
    }

    fn kernel(address: u64) -> SymbolRequest<'static> {
        SymbolRequest { process: None, context: AddressContext::Kernel, address }
    }

    #[test]
    fn test_parse_sorts_and_drops_aliases() {
        let table = KernelTable::parse(LISTING, &CancellationToken::new()).unwrap();
        let names: Vec<&str> = table.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["_stext", "schedule", "do_idle"]);
        assert_eq!(table.low, 0xffff_ffff_8100_0000);
        assert_eq!(table.high, 0xffff_ffff_8100_0200 + LAST_SYMBOL_LEN);
    }

    #[test]
    fn test_symbolize_ranges() {
        let symbolizer = prepared();
        assert_eq!(symbolizer.len(), 3);

        let s = symbolizer.symbolize(&kernel(0xffff_ffff_8100_0150)).unwrap();
        assert_eq!(s.name(), "schedule");
        assert_eq!(s.binary_nick(), Some("Linux"));
        assert_eq!(s.begin_address(), 0xffff_ffff_8100_0100);
        assert_eq!(s.end_address(), 0xffff_ffff_8100_0200);
        assert_eq!(s.kind(), SymbolKind::Kernel);

        let last = symbolizer.symbolize(&kernel(0xffff_ffff_8100_0300)).unwrap();
        assert_eq!(last.name(), "do_idle");
        assert_eq!(last.end_address(), 0xffff_ffff_8100_0200 + LAST_SYMBOL_LEN);
    }

    #[test]
    fn test_out_of_range_falls_back() {
        let symbolizer = prepared();
        let s = symbolizer.symbolize(&kernel(0x1234)).unwrap();
        assert_eq!(s.name(), "In Kernel+0x1234");
        assert!(s.is_fallback());
    }

    #[test]
    fn test_user_context_ignored() {
        let symbolizer = prepared();
        let request = SymbolRequest { process: None, context: AddressContext::User, address: 0xffff_ffff_8100_0150 };
        assert!(symbolizer.symbolize(&request).is_none());
    }

    #[test]
    fn test_cancelled_parse() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(KernelTable::parse(LISTING, &cancel), Err(SymbolizeError::Cancelled)));
    }
}
