use std::fmt::{self, Display};
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use parking_lot::Mutex;

use crate::{Capabilities, Capability, Error, Metric, Result};

/// By default we track latencies of up to one hour with nanosecond resolution.
const DEFAULT_MAX_TRACKABLE: Duration = Duration::from_secs(60 * 60);

/// Three significant digits keeps the quantization error of any reported percentile
/// under 0.1% of its value.
const DEFAULT_SIGNIFICANT_DIGITS: u8 = 3;

/// Records operation latencies and reports their tail percentiles.
///
/// Samples are stored in an HDR histogram: recording a sample is constant time and the
/// memory footprint depends only on the configured range and precision, not on the
/// number of samples. The rendered value lists P90, P95, P99 and P99.9 in nanoseconds;
/// these are always non-decreasing in that order.
///
/// Samples longer than the configured maximum are recorded as the maximum.
///
/// Carries the [`Capability::Computer`] capability.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
///
/// use metrics_journal::{Metric, PercentileLatency};
///
/// let latency = PercentileLatency::new();
///
/// for micros in 1..=100 {
///     latency.observe(Duration::from_micros(micros));
/// }
///
/// let percentiles = latency.percentiles();
/// assert!(percentiles.p90 <= percentiles.p99);
/// assert!(latency.value_as_string().starts_with("P90: "));
/// ```
#[derive(Debug)]
pub struct PercentileLatency {
    histogram: Mutex<Histogram<u64>>,
}

impl PercentileLatency {
    const NAME: &'static str = "\"Percentile Latency\"";

    /// Creates a latency metric with the default configuration.
    ///
    /// # Panics
    ///
    /// The default configuration is always accepted by the histogram backend, so this
    /// does not panic in practice. Use [`builder()`][Self::builder] to supply a custom
    /// configuration and receive an error instead.
    #[must_use]
    pub fn new() -> Self {
        Self::builder()
            .build()
            .expect("the default histogram configuration is always valid")
    }

    /// Creates a builder for a latency metric with a custom histogram configuration.
    #[must_use]
    pub fn builder() -> PercentileLatencyBuilder {
        PercentileLatencyBuilder::new()
    }

    /// Records one latency sample.
    pub fn observe(&self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);

        self.histogram.lock().saturating_record(nanos);
    }

    /// Measures the duration of `f` and records it as one sample.
    pub fn observe_duration<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();

        let result = f();

        self.observe(start.elapsed());

        result
    }

    /// The number of samples recorded since construction or the last reset.
    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.histogram.lock().len()
    }

    /// The reported percentiles of all samples recorded so far.
    ///
    /// All percentiles are zero if no samples have been recorded.
    #[must_use]
    pub fn percentiles(&self) -> LatencyPercentiles {
        let histogram = self.histogram.lock();

        LatencyPercentiles {
            p90: Duration::from_nanos(histogram.value_at_percentile(90.0)),
            p95: Duration::from_nanos(histogram.value_at_percentile(95.0)),
            p99: Duration::from_nanos(histogram.value_at_percentile(99.0)),
            p999: Duration::from_nanos(histogram.value_at_percentile(99.9)),
        }
    }
}

impl Default for PercentileLatency {
    fn default() -> Self {
        Self::new()
    }
}

impl Metric for PercentileLatency {
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn name(&self) -> &str {
        Self::NAME
    }

    fn value_as_string(&self) -> String {
        self.percentiles().to_string()
    }

    fn evaluate(&self) {}

    fn reset(&self) {
        self.histogram.lock().reset();
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::with(Capability::Computer)
    }
}

/// Tail percentiles of the samples recorded by a [`PercentileLatency`].
///
/// Displayed as `P90: <n>ns, P95: <n>ns, P99: <n>ns, P999: <n>ns`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct LatencyPercentiles {
    /// The 90th percentile.
    pub p90: Duration,

    /// The 95th percentile.
    pub p95: Duration,

    /// The 99th percentile.
    pub p99: Duration,

    /// The 99.9th percentile.
    pub p999: Duration,
}

impl Display for LatencyPercentiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P90: {}ns, P95: {}ns, P99: {}ns, P999: {}ns",
            self.p90.as_nanos(),
            self.p95.as_nanos(),
            self.p99.as_nanos(),
            self.p999.as_nanos()
        )
    }
}

/// Builder for a [`PercentileLatency`] with a custom histogram configuration.
#[derive(Debug)]
#[must_use]
pub struct PercentileLatencyBuilder {
    max_trackable: Duration,
    significant_digits: u8,
}

impl PercentileLatencyBuilder {
    fn new() -> Self {
        Self {
            max_trackable: DEFAULT_MAX_TRACKABLE,
            significant_digits: DEFAULT_SIGNIFICANT_DIGITS,
        }
    }

    /// Sets the longest latency the histogram can tell apart from longer ones.
    ///
    /// Default is one hour.
    pub fn max_trackable(mut self, max_trackable: Duration) -> Self {
        self.max_trackable = max_trackable;
        self
    }

    /// Sets the number of significant decimal digits kept for every sample (0 to 5).
    ///
    /// Default is 3.
    pub fn significant_digits(mut self, significant_digits: u8) -> Self {
        self.significant_digits = significant_digits;
        self
    }

    /// Creates the metric.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HistogramCreation`] if the histogram backend rejects the
    /// configuration, e.g. because the maximum is shorter than 2 nanoseconds or the
    /// requested precision is out of range.
    pub fn build(self) -> Result<PercentileLatency> {
        let max_nanos = u64::try_from(self.max_trackable.as_nanos()).unwrap_or(u64::MAX);

        let histogram = Histogram::new_with_bounds(1, max_nanos, self.significant_digits)
            .map_err(|e| Error::HistogramCreation {
                reason: format!("{e:?}"),
            })?;

        Ok(PercentileLatency {
            histogram: Mutex::new(histogram),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(PercentileLatency: Send, Sync);

    fn assert_ordered(percentiles: LatencyPercentiles) {
        assert!(percentiles.p90 <= percentiles.p95, "{percentiles}");
        assert!(percentiles.p95 <= percentiles.p99, "{percentiles}");
        assert!(percentiles.p99 <= percentiles.p999, "{percentiles}");
    }

    #[test]
    fn has_fixed_name() {
        assert_eq!(PercentileLatency::new().name(), "\"Percentile Latency\"");
    }

    #[test]
    fn empty_reports_zeros() {
        let latency = PercentileLatency::new();

        assert_eq!(
            latency.value_as_string(),
            "P90: 0ns, P95: 0ns, P99: 0ns, P999: 0ns"
        );
    }

    #[test]
    fn value_lists_all_percentiles() {
        let latency = PercentileLatency::new();
        latency.observe(Duration::from_millis(1));
        latency.observe(Duration::from_millis(2));

        let value = latency.value_as_string();

        assert!(value.contains("P90: "));
        assert!(value.contains("P95: "));
        assert!(value.contains("P99: "));
        assert!(value.contains("P999: "));
        assert!(value.ends_with("ns"));
    }

    #[test]
    fn single_sample_is_every_percentile() {
        let latency = PercentileLatency::new();
        latency.observe(Duration::from_nanos(1000));

        let percentiles = latency.percentiles();

        // 3 significant digits make 1000 exactly representable.
        assert_eq!(percentiles.p90, Duration::from_nanos(1000));
        assert_eq!(percentiles.p999, Duration::from_nanos(1000));
    }

    #[test]
    fn percentiles_are_ordered_for_skewed_data() {
        let latency = PercentileLatency::new();

        for i in 0..10_000_u64 {
            // Mostly fast, with a long tail.
            let nanos = if i % 100 == 0 { 5_000_000 + i } else { 1_000 + i % 37 };
            latency.observe(Duration::from_nanos(nanos));
        }

        assert_ordered(latency.percentiles());
        assert_eq!(latency.sample_count(), 10_000);
    }

    #[test]
    fn percentiles_are_ordered_for_uniform_data() {
        let latency = PercentileLatency::new();

        for nanos in 1..=1000 {
            latency.observe(Duration::from_nanos(nanos));
        }

        let percentiles = latency.percentiles();
        assert_ordered(percentiles);

        // Within the 0.1% quantization error of the backend.
        let p90 = percentiles.p90.as_nanos();
        assert!((899..=901).contains(&p90), "p90 was {p90}");
    }

    #[test]
    fn oversized_sample_is_clamped_not_dropped() {
        let latency = PercentileLatency::builder()
            .max_trackable(Duration::from_millis(1))
            .build()
            .unwrap();

        latency.observe(Duration::from_secs(10));

        assert_eq!(latency.sample_count(), 1);
        assert!(latency.percentiles().p999 <= Duration::from_micros(1001));
    }

    #[test]
    fn reset_discards_samples() {
        let latency = PercentileLatency::new();
        latency.observe(Duration::from_millis(3));

        latency.reset();
        latency.reset();

        assert_eq!(latency.sample_count(), 0);
        assert_eq!(
            latency.value_as_string(),
            PercentileLatency::new().value_as_string()
        );
    }

    #[test]
    fn invalid_configuration_is_an_error() {
        let result = PercentileLatency::builder().significant_digits(9).build();

        assert!(matches!(result, Err(Error::HistogramCreation { .. })));
    }

    #[test]
    fn observe_duration_records_one_sample() {
        let latency = PercentileLatency::new();

        let value = latency.observe_duration(|| 42);

        assert_eq!(value, 42);
        assert_eq!(latency.sample_count(), 1);
    }

    #[test]
    fn carries_computer_capability() {
        let capabilities = PercentileLatency::new().capabilities();

        assert!(capabilities.carries(Capability::Computer));
        assert!(!capabilities.carries(Capability::Server));
    }

    #[cfg_attr(miri, ignore)] // Too slow under Miri.
    #[test]
    fn concurrent_observations_are_all_recorded() {
        const THREADS: u64 = 8;
        const SAMPLES_PER_THREAD: u64 = 1_000;

        let latency = Arc::new(PercentileLatency::new());

        let handles = (0..THREADS)
            .map(|t| {
                let latency = Arc::clone(&latency);
                thread::spawn(move || {
                    for i in 0..SAMPLES_PER_THREAD {
                        latency.observe(Duration::from_nanos(1 + t * 1000 + i));
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(latency.sample_count(), THREADS * SAMPLES_PER_THREAD);
        assert_ordered(latency.percentiles());
    }
}
