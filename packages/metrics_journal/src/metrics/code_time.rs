use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::{Capabilities, Capability, Metric, MetricNames};

/// A stopwatch that reports how long the most recently timed section of code took.
///
/// Call [`start()`][Self::start] before and [`stop()`][Self::stop] after the code to
/// measure, or wrap it in [`measure()`][Self::measure]. The value is the last completed
/// span; while the stopwatch is running, the previous span keeps being reported.
///
/// The span is rendered with a unit that fits its magnitude: `ns` below one
/// microsecond, then `μs`, `ms` and `s` with two decimals.
///
/// Carries the [`Capability::Algo`] capability.
///
/// # Example
///
/// ```
/// use metrics_journal::{CodeTime, Metric};
///
/// let sort_time = CodeTime::new("\"Sort\"");
///
/// let mut data = vec![5, 3, 1, 4, 2];
/// sort_time.measure(|| data.sort_unstable());
///
/// assert_eq!(data, [1, 2, 3, 4, 5]);
/// assert!(!sort_time.value_as_string().is_empty());
/// ```
#[derive(Debug)]
pub struct CodeTime {
    name: String,
    stopwatch: Mutex<Stopwatch>,
}

#[derive(Debug, Default)]
struct Stopwatch {
    // Set while a measurement is in progress.
    started_at: Option<Instant>,
    last_span: Duration,
}

impl CodeTime {
    /// Creates a stopwatch that has not measured anything yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stopwatch: Mutex::new(Stopwatch::default()),
        }
    }

    /// Creates a stopwatch named `"Algorithm <n>"`, with `n` drawn from `names`.
    #[must_use]
    pub fn with_generated_name(names: &MetricNames) -> Self {
        Self::new(names.next_code_timer())
    }

    /// Starts a measurement, abandoning any measurement already in progress.
    pub fn start(&self) {
        self.stopwatch.lock().started_at = Some(Instant::now());
    }

    /// Completes the measurement in progress and publishes its span.
    ///
    /// Does nothing if no measurement is in progress.
    pub fn stop(&self) {
        let finished_at = Instant::now();

        let mut stopwatch = self.stopwatch.lock();

        if let Some(started_at) = stopwatch.started_at.take() {
            stopwatch.last_span = finished_at.saturating_duration_since(started_at);
        }
    }

    /// Whether a measurement is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.stopwatch.lock().started_at.is_some()
    }

    /// The span of the most recently completed measurement.
    #[must_use]
    pub fn last_span(&self) -> Duration {
        self.stopwatch.lock().last_span
    }

    /// Times one call of `f`.
    pub fn measure<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.start();

        let result = f();

        self.stop();

        result
    }
}

impl Metric for CodeTime {
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn name(&self) -> &str {
        &self.name
    }

    fn value_as_string(&self) -> String {
        format_span(self.last_span())
    }

    fn evaluate(&self) {}

    fn reset(&self) {
        *self.stopwatch.lock() = Stopwatch::default();
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::with(Capability::Algo)
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "two decimals of a span never need more than 52 bits of precision"
)]
fn format_span(span: Duration) -> String {
    let nanos = span.as_nanos();

    // Upper bounds sit where rounding to two decimals would carry into the next unit.
    match nanos {
        0..1_000 => format!("{nanos} ns"),
        1_000..999_995 => format!("{:.2} μs", nanos as f64 / 1_000.0),
        999_995..999_995_000 => format!("{:.2} ms", nanos as f64 / 1_000_000.0),
        _ => format!("{:.2} s", span.as_secs_f64()),
    }
}
