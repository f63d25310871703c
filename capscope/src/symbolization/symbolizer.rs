//! The symbolizer strategy trait.

use tokio_util::sync::CancellationToken;

use super::symbol::Symbol;
use crate::capture::AddressContext;
use crate::document::{Document, ProcessInfo};
use crate::domain::SymbolizeError;

/// One address to resolve, with everything known about where it came from.
#[derive(Debug, Clone, Copy)]
pub struct SymbolRequest<'a> {
    /// The process the stack was captured in, if the document knows it.
    pub process: Option<&'a ProcessInfo>,
    /// Context established by the markers earlier in the same stack.
    pub context: AddressContext,
    pub address: u64,
}

impl SymbolRequest<'_> {
    /// Whether the address was captured in user space (or before any
    /// context marker).
    #[must_use]
    pub fn is_user(&self) -> bool {
        matches!(self.context, AddressContext::None | AddressContext::User)
    }
}

/// A source of symbols.
///
/// `prepare` runs once on a blocking worker before any lookup; afterwards
/// `symbolize` is called from that same worker for every distinct address.
/// Implementations keep prepared state behind their own locks.
pub trait Symbolizer: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Index whatever this strategy needs from the document.
    ///
    /// # Errors
    /// [`SymbolizeError::Cancelled`] when `cancel` fires, or a strategy
    /// specific failure.
    fn prepare(&self, _document: &Document, _cancel: &CancellationToken) -> Result<(), SymbolizeError> {
        Ok(())
    }

    /// Resolve one address, or `None` to let the next strategy try.
    fn symbolize(&self, request: &SymbolRequest<'_>) -> Option<Symbol>;

    /// Strategies that never resolve anything let the document skip the
    /// symbolization pass entirely.
    fn resolves_nothing(&self) -> bool {
        false
    }
}
