//! Lazily decoded views over an index set.

use std::borrow::Cow;
use std::fmt;

use super::index::IndexSet;
use super::Document;
use crate::capture::Frame;

/// Ordered, read-only list of records of one kind (or a derived combination).
///
/// Holds positions only; each element is decoded from the capture bytes when
/// it is accessed.
pub struct FrameList<'d, T> {
    document: &'d Document,
    positions: Cow<'d, IndexSet>,
    decode: fn(Frame<'d>) -> T,
}

impl<'d, T> FrameList<'d, T> {
    pub(crate) fn new(document: &'d Document, positions: Cow<'d, IndexSet>, decode: fn(Frame<'d>) -> T) -> Self {
        Self { document, positions, decode }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The `nth` element of the list.
    #[must_use]
    pub fn get(&self, nth: usize) -> Option<T> {
        let position = self.positions.nth(nth)?;
        self.document.frame_at(position).map(self.decode)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = T> + use<'_, 'd, T> {
        let document = self.document;
        let decode = self.decode;
        self.positions.iter().filter_map(move |p| document.frame_at(p).map(decode))
    }

    /// Timeline positions backing this list.
    #[must_use]
    pub fn positions(&self) -> &IndexSet {
        &self.positions
    }

    #[must_use]
    pub fn into_positions(self) -> IndexSet {
        self.positions.into_owned()
    }
}

impl<T> fmt::Debug for FrameList<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameList").field("len", &self.len()).finish()
    }
}
