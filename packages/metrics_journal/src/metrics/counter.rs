use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Metric, MetricNames};

/// A monotonic counter of occurrences, incremented by producers from any thread.
///
/// Rendered as a plain integer. Evaluating the counter does nothing; resetting it sets it
/// back to zero.
///
/// # Example
///
/// ```
/// use metrics_journal::{Counter, Metric};
///
/// let requests = Counter::new("requests");
///
/// requests.increment();
/// requests.add(2);
///
/// assert_eq!(requests.value(), 3);
/// assert_eq!(requests.value_as_string(), "3");
/// ```
#[derive(Debug)]
pub struct Counter {
    name: String,
    value: AtomicU64,
}

impl Counter {
    /// Creates a counter that starts from zero.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_start(name, 0)
    }

    /// Creates a counter that starts from `start`.
    ///
    /// The start value only applies until the first reset, after which the counter
    /// counts from zero.
    #[must_use]
    pub fn with_start(name: impl Into<String>, start: u64) -> Self {
        Self {
            name: name.into(),
            value: AtomicU64::new(start),
        }
    }

    /// Creates a counter named `"IncrementMetric <n>"`, with `n` drawn from `names`.
    #[must_use]
    pub fn with_generated_name(names: &MetricNames) -> Self {
        Self::new(names.next_counter())
    }

    /// Records one occurrence.
    #[inline]
    pub fn increment(&self) {
        self.add(1);
    }

    /// Records `count` occurrences at once.
    #[inline]
    pub fn add(&self, count: u64) {
        // The total is the only state, no other memory is published alongside it.
        self.value.fetch_add(count, Ordering::Relaxed);
    }

    /// The number of occurrences recorded since construction or the last reset.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Metric for Counter {
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn name(&self) -> &str {
        &self.name
    }

    fn value_as_string(&self) -> String {
        self.value().to_string()
    }

    fn evaluate(&self) {}

    fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}
