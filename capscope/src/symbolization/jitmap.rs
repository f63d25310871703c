//! Names for JIT-compiled code, from the capture's Jitmap records.

use capscope_common as wire;
use log::debug;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use super::symbol::{Symbol, SymbolKind};
use super::symbolizer::{SymbolRequest, Symbolizer};
use crate::document::Document;
use crate::domain::SymbolizeError;

/// Resolves the tagged addresses a JIT hands out in place of real ones.
#[derive(Debug, Default)]
pub struct JitmapSymbolizer {
    /// `(address, name)`, sorted by address.
    mappings: RwLock<Vec<(u64, String)>>,
}

impl JitmapSymbolizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(mappings: &[(u64, String)], address: u64) -> Option<&(u64, String)> {
        // Addresses are usually handed out densely from 1, so the low bits
        // are a good first guess at the index.
        let guess = usize::try_from(address & 0xFFFF).ok()?.checked_sub(1);
        if let Some(hit) = guess.and_then(|i| mappings.get(i)).filter(|(a, _)| *a == address) {
            return Some(hit);
        }
        mappings.binary_search_by_key(&address, |(a, _)| *a).ok().map(|i| &mappings[i])
    }
}

impl Symbolizer for JitmapSymbolizer {
    fn name(&self) -> &'static str {
        "jitmap"
    }

    fn prepare(&self, document: &Document, cancel: &CancellationToken) -> Result<(), SymbolizeError> {
        let mut mappings = Vec::new();
        for jitmap in document.list_jitmaps().iter() {
            if cancel.is_cancelled() {
                return Err(SymbolizeError::Cancelled);
            }
            mappings.extend(jitmap.mappings().map(|(address, name)| (address, name.to_string())));
        }
        mappings.sort_by_key(|(address, _)| *address);
        debug!("Loaded {} JIT mappings", mappings.len());
        *self.mappings.write() = mappings;
        Ok(())
    }

    fn symbolize(&self, request: &SymbolRequest<'_>) -> Option<Symbol> {
        let address = request.address;
        if !request.is_user() || address & wire::JITMAP_ADDRESS_MASK != wire::JITMAP_ADDRESS_TAG {
            return None;
        }
        let mappings = self.mappings.read();
        let (address, name) = Self::find(&mappings, address)?;
        Some(Symbol::new(name.as_str(), SymbolKind::User).with_range(*address, address + 1))
    }
}
