//! Chaining symbolizers.

use log::warn;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::symbol::Symbol;
use super::symbolizer::{SymbolRequest, Symbolizer};
use crate::document::Document;
use crate::domain::SymbolizeError;

/// Tries each symbolizer in order and returns the first hit.
#[derive(Default, Clone)]
pub struct MultiSymbolizer {
    symbolizers: Vec<Arc<dyn Symbolizer>>,
}

impl MultiSymbolizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a symbolizer; earlier ones take precedence.
    #[must_use]
    pub fn with(mut self, symbolizer: impl Symbolizer + 'static) -> Self {
        self.symbolizers.push(Arc::new(symbolizer));
        self
    }

    pub fn push(&mut self, symbolizer: Arc<dyn Symbolizer>) {
        self.symbolizers.push(symbolizer);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbolizers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbolizers.is_empty()
    }
}

impl Symbolizer for MultiSymbolizer {
    fn name(&self) -> &'static str {
        "multi"
    }

    /// Prepares every member. A member that fails to prepare is logged and
    /// still consulted; only cancellation aborts.
    fn prepare(&self, document: &Document, cancel: &CancellationToken) -> Result<(), SymbolizeError> {
        for symbolizer in &self.symbolizers {
            if cancel.is_cancelled() {
                return Err(SymbolizeError::Cancelled);
            }
            match symbolizer.prepare(document, cancel) {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => warn!("Failed to initialize symbolizer: {err}"),
            }
        }
        Ok(())
    }

    fn symbolize(&self, request: &SymbolRequest<'_>) -> Option<Symbol> {
        self.symbolizers.iter().find_map(|s| s.symbolize(request))
    }

    fn resolves_nothing(&self) -> bool {
        self.symbolizers.iter().all(|s| s.resolves_nothing())
    }
}

impl std::fmt::Debug for MultiSymbolizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.symbolizers.iter().map(|s| s.name())).finish()
    }
}
