//! Sets of timeline positions.
//!
//! Every per-kind index is an [`IndexSet`]: a sorted, duplicate-free list of
//! positions into the document's time-sorted record table. Keeping them
//! sorted means iteration always follows the global timeline and set algebra
//! is a linear merge.

use std::cmp::Ordering;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    positions: Vec<u32>,
}

impl IndexSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a position. Positions are expected in ascending order, which is how
    /// the loader produces them; out-of-order inserts fall back to a search.
    pub fn insert(&mut self, position: u32) {
        match self.positions.last() {
            None => self.positions.push(position),
            Some(&last) if last < position => self.positions.push(position),
            Some(_) => {
                if let Err(at) = self.positions.binary_search(&position) {
                    self.positions.insert(at, position);
                }
            }
        }
    }

    #[must_use]
    pub fn contains(&self, position: u32) -> bool {
        self.positions.binary_search(&position).is_ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The `nth` position in timeline order.
    #[must_use]
    pub fn nth(&self, nth: usize) -> Option<u32> {
        self.positions.get(nth).copied()
    }

    #[must_use]
    pub fn first(&self) -> Option<u32> {
        self.positions.first().copied()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = u32> + ExactSizeIterator + '_ {
        self.positions.iter().copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.positions
    }

    /// Positions in either set.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let (a, b) = (&self.positions, &other.positions);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    out.push(b[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        Self { positions: out }
    }

    /// Positions in `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut out = Vec::with_capacity(self.positions.len());
        let mut j = 0;
        let b = &other.positions;
        for &p in &self.positions {
            while j < b.len() && b[j] < p {
                j += 1;
            }
            if j >= b.len() || b[j] != p {
                out.push(p);
            }
        }
        Self { positions: out }
    }

    /// Positions in both sets.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self { positions: self.positions.iter().copied().filter(|&p| other.contains(p)).collect() }
    }

    /// Remove every position found in `other`.
    pub fn subtract(&mut self, other: &Self) {
        *self = self.difference(other);
    }
}

impl FromIterator<u32> for IndexSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut positions: Vec<u32> = iter.into_iter().collect();
        positions.sort_unstable();
        positions.dedup();
        Self { positions }
    }
}

impl<'a> IntoIterator for &'a IndexSet {
    type Item = u32;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, u32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.positions.iter().copied()
    }
}
