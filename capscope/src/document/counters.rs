//! Counter time series assembled from definition and value records.

use std::fmt;

use crate::capture::records::{CounterKind, CounterValue};
use crate::domain::Timestamp;

/// One observation of a counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterPoint {
    pub time: Timestamp,
    pub value: CounterValue,
}

/// A counter and every value recorded for it, in time order.
#[derive(Debug, Clone)]
pub struct Counter {
    pub id: u32,
    pub kind: CounterKind,
    pub category: String,
    pub name: String,
    pub description: String,
    values: Vec<CounterPoint>,
    min: f64,
    max: f64,
    mean: f64,
    median: f64,
    origin: Timestamp,
}

impl Counter {
    pub(crate) fn new(
        id: u32,
        kind: CounterKind,
        category: &str,
        name: &str,
        description: &str,
        origin: Timestamp,
    ) -> Self {
        Self {
            id,
            kind,
            category: category.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            values: Vec::new(),
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            median: 0.0,
            origin,
        }
    }

    pub(crate) fn push(&mut self, time: Timestamp, value: CounterValue) {
        self.values.push(CounterPoint { time, value: sanitize(value) });
    }

    /// Sort by time and compute range, mean and median. Called once after loading.
    pub(crate) fn finish(&mut self) {
        self.values.sort_by_key(|p| p.time);
        let mut sorted: Vec<f64> = self.values.iter().map(|p| p.value.as_f64()).collect();
        if sorted.is_empty() {
            return;
        }
        sorted.sort_by(f64::total_cmp);
        self.min = sorted[0];
        self.max = sorted[sorted.len() - 1];
        self.mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        self.median = sorted[sorted.len() / 2];
    }

    #[must_use]
    pub fn values(&self) -> &[CounterPoint] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn min_value(&self) -> f64 {
        self.min
    }

    #[must_use]
    pub fn max_value(&self) -> f64 {
        self.max
    }

    #[must_use]
    pub fn mean_value(&self) -> f64 {
        self.mean
    }

    /// The upper median for an even number of values.
    #[must_use]
    pub fn median_value(&self) -> f64 {
        self.median
    }

    /// Nanoseconds from the start of the recording to the `nth` value.
    #[must_use]
    pub fn time_offset(&self, nth: usize) -> Option<i64> {
        self.values.get(nth).map(|p| p.time.0 - self.origin.0)
    }

    /// `category/name`, unique per counter in practice.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} ({} values)", self.category, self.name, self.values.len())
    }
}

/// Writers occasionally emit garbage doubles; values beyond the `i64` range
/// are read as zero.
#[allow(clippy::cast_precision_loss)]
fn sanitize(value: CounterValue) -> CounterValue {
    match value {
        CounterValue::Double(v) if v > i64::MAX as f64 => CounterValue::Double(0.0),
        other => other,
    }
}
