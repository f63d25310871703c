use super::symbol::Symbol;
use super::symbolizer::{SymbolRequest, Symbolizer};

/// Resolves nothing. Stacks show only context switches and process names.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbolizer;

impl Symbolizer for NoSymbolizer {
    fn name(&self) -> &'static str {
        "none"
    }

    fn symbolize(&self, _request: &SymbolRequest<'_>) -> Option<Symbol> {
        None
    }

    fn resolves_nothing(&self) -> bool {
        true
    }
}
