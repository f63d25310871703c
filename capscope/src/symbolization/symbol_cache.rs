//! Address-range keyed symbol storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::symbol::Symbol;

/// Symbols keyed by the address range they cover.
///
/// Ranges are half-open `[begin, end)`. Only the first symbol starting at a
/// given address is kept.
#[derive(Debug, Clone, Default)]
pub struct SymbolCache {
    by_begin: BTreeMap<u64, Arc<Symbol>>,
    /// Widest range inserted; bounds the backwards scan in `lookup`.
    widest: u64,
}

impl SymbolCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a symbol. Symbols without a usable range are dropped.
    pub fn insert(&mut self, symbol: Arc<Symbol>) {
        let (begin, end) = (symbol.begin_address(), symbol.end_address());
        if begin == 0 || end <= begin {
            return;
        }
        if let std::collections::btree_map::Entry::Vacant(slot) = self.by_begin.entry(begin) {
            self.widest = self.widest.max(end - begin);
            slot.insert(symbol);
        }
    }

    /// The symbol whose range covers `address`.
    #[must_use]
    pub fn lookup(&self, address: u64) -> Option<&Arc<Symbol>> {
        if address == 0 {
            return None;
        }
        let floor = address.saturating_sub(self.widest);
        self.by_begin
            .range(floor..=address)
            .rev()
            .map(|(_, symbol)| symbol)
            .find(|symbol| symbol.contains(address))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_begin.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_begin.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Symbol>> {
        self.by_begin.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolization::SymbolKind;

    fn sym(name: &str, begin: u64, end: u64) -> Arc<Symbol> {
        Symbol::new(name, SymbolKind::User).with_range(begin, end).into_shared()
    }

    #[test]
    fn test_lookup_by_range() {
        let mut cache = SymbolCache::new();
        cache.insert(sym("a", 0x1000, 0x1100));
        cache.insert(sym("b", 0x1100, 0x1200));
        assert_eq!(cache.lookup(0x1000).map(|s| s.name()), Some("a"));
        assert_eq!(cache.lookup(0x10ff).map(|s| s.name()), Some("a"));
        assert_eq!(cache.lookup(0x1100).map(|s| s.name()), Some("b"));
        assert!(cache.lookup(0x1200).is_none());
        assert!(cache.lookup(0x0fff).is_none());
    }

    #[test]
    fn test_nested_ranges() {
        let mut cache = SymbolCache::new();
        cache.insert(sym("outer", 0x1000, 0x2000));
        cache.insert(sym("inner", 0x1100, 0x1110));
        assert_eq!(cache.lookup(0x1105).map(|s| s.name()), Some("inner"));
        assert_eq!(cache.lookup(0x1800).map(|s| s.name()), Some("outer"));
    }

    #[test]
    fn test_rejects_unusable_and_duplicate() {
        let mut cache = SymbolCache::new();
        cache.insert(sym("zero", 0, 10));
        cache.insert(sym("empty", 5, 5));
        cache.insert(sym("first", 0x10, 0x20));
        cache.insert(sym("second", 0x10, 0x30));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(0x15).map(|s| s.name()), Some("first"));
        assert!(cache.lookup(0).is_none());
    }
}
