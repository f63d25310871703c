//! Mark statistics grouped by category and name.

use std::collections::BTreeMap;

use super::index::IndexSet;

/// Summary of every mark sharing a group and name.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkCatalog {
    pub group: String,
    pub name: String,
    pub count: usize,
    pub min: i64,
    pub max: i64,
    pub mean: i64,
    pub median: i64,
    /// Timeline positions of the marks.
    pub positions: IndexSet,
}

impl MarkCatalog {
    /// Build a catalog entry from the durations of its marks.
    #[must_use]
    pub fn from_durations(group: &str, name: &str, positions: IndexSet, mut durations: Vec<i64>) -> Self {
        durations.sort_unstable();
        let count = durations.len();
        let total: i128 = durations.iter().map(|&d| i128::from(d)).sum();
        let mean = if count == 0 {
            0
        } else {
            i64::try_from(total / i128::try_from(count).unwrap_or(i128::MAX)).unwrap_or_default()
        };
        Self {
            group: group.to_string(),
            name: name.to_string(),
            count,
            min: durations.first().copied().unwrap_or_default(),
            max: durations.last().copied().unwrap_or_default(),
            mean,
            median: durations.get(count / 2).copied().unwrap_or_default(),
            positions,
        }
    }
}

/// group → name → positions, as collected by the loader.
pub type MarkGroups = BTreeMap<String, BTreeMap<String, IndexSet>>;
