use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out numbered names: `"{prefix}1{suffix}"`, `"{prefix}2{suffix}"` and so on.
///
/// Numbering starts at 1 and every call to [`next_name()`][Self::next_name] returns a number that
/// no other call on the same sequence has returned, regardless of how many threads are
/// drawing names concurrently.
#[derive(Debug)]
pub struct NameSequence {
    prefix: &'static str,
    suffix: &'static str,
    last: AtomicU64,
}

impl NameSequence {
    /// Creates a sequence that has not yet handed out any names.
    #[must_use]
    pub const fn new(prefix: &'static str, suffix: &'static str) -> Self {
        Self {
            prefix,
            suffix,
            last: AtomicU64::new(0),
        }
    }

    /// Returns the next name in the sequence.
    #[must_use]
    pub fn next_name(&self) -> String {
        // Only uniqueness matters here, there is no data published alongside the number.
        let number = self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1);

        format!("{}{number}{}", self.prefix, self.suffix)
    }
}

/// Process-wide sequence used to name log files when the caller does not supply a path.
///
/// Initialized on first use; the first generated file is `metrics1.log`.
pub(crate) static LOG_FILE_NAMES: LazyLock<NameSequence> =
    LazyLock::new(|| NameSequence::new("metrics", ".log"));

/// Generates default display names for metrics that were not given one.
///
/// Each metric family has its own numbering. A registry owns one instance and hands it
/// to constructors via [`MetricsRegistry::names()`][crate::MetricsRegistry::names];
/// you can also create a standalone instance or share one between registries by
/// injecting it with [`RegistryBuilder::names()`][crate::RegistryBuilder::names].
///
/// # Example
///
/// ```
/// use metrics_journal::{Counter, Metric, MetricNames};
///
/// let names = MetricNames::new();
///
/// let first = Counter::with_generated_name(&names);
/// let second = Counter::with_generated_name(&names);
///
/// assert_eq!(first.name(), "\"IncrementMetric 1\"");
/// assert_eq!(second.name(), "\"IncrementMetric 2\"");
/// ```
#[derive(Debug)]
pub struct MetricNames {
    counters: NameSequence,
    code_timers: NameSequence,
}

impl MetricNames {
    /// Creates a name service whose sequences all start from 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counters: NameSequence::new("\"IncrementMetric ", "\""),
            code_timers: NameSequence::new("\"Algorithm ", "\""),
        }
    }

    pub(crate) fn next_counter(&self) -> String {
        self.counters.next_name()
    }

    pub(crate) fn next_code_timer(&self) -> String {
        self.code_timers.next_name()
    }
}

impl Default for MetricNames {
    fn default() -> Self {
        Self::new()
    }
}
