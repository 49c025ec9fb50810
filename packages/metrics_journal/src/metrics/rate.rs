use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::{Capabilities, Capability, Metric};

/// Counts requests and reports how many arrived between two consecutive evaluations.
///
/// Producers call [`increment()`][Self::increment] for every request. Each
/// [`evaluate()`][Metric::evaluate] takes the number of increments observed since the
/// previous evaluation and publishes it as the current rate, which is what gets rendered.
/// Reading the value never moves the baseline, only evaluating does.
///
/// Carries the [`Capability::Server`] capability.
///
/// # Example
///
/// ```
/// use metrics_journal::{Metric, RateCounter};
///
/// let rps = RateCounter::new();
///
/// rps.increment();
/// rps.increment();
/// rps.evaluate();
/// assert_eq!(rps.value_as_string(), "2.00");
///
/// // Nothing happened since the previous evaluation.
/// rps.evaluate();
/// assert_eq!(rps.value_as_string(), "0.00");
/// ```
#[derive(Debug)]
pub struct RateCounter {
    total: AtomicU64,

    // Guards the baseline and the published rate together so that two concurrent
    // evaluations cannot both claim the same interval.
    interval: Mutex<Interval>,
}

#[derive(Debug, Default)]
struct Interval {
    baseline: u64,
    rate: u64,
}

impl RateCounter {
    const NAME: &'static str = "\"HTTPS requests RPS\"";

    /// Creates a rate counter with no requests recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::with_start(0)
    }

    /// Creates a rate counter whose running total starts at `start`.
    ///
    /// The baseline also starts at `start`, so the first interval only reports requests
    /// recorded after construction.
    #[must_use]
    pub fn with_start(start: u64) -> Self {
        Self {
            total: AtomicU64::new(start),
            interval: Mutex::new(Interval {
                baseline: start,
                rate: 0,
            }),
        }
    }

    /// Records one request.
    #[inline]
    pub fn increment(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// The number of requests observed in the most recently evaluated interval.
    #[must_use]
    pub fn rate(&self) -> u64 {
        self.interval.lock().rate
    }

    /// The running total of requests since construction or the last reset.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for RateCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Metric for RateCounter {
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn name(&self) -> &str {
        Self::NAME
    }

    fn value_as_string(&self) -> String {
        #[expect(
            clippy::cast_precision_loss,
            reason = "rates beyond 2^52 per interval are not a realistic concern"
        )]
        let rate = self.rate() as f64;

        format!("{rate:.2}")
    }

    fn evaluate(&self) {
        let mut interval = self.interval.lock();

        let total = self.total.load(Ordering::Relaxed);

        // A concurrent reset may have moved the total below the baseline, in which case
        // the interval is considered empty rather than negative.
        interval.rate = total.saturating_sub(interval.baseline);
        interval.baseline = total;
    }

    fn reset(&self) {
        let mut interval = self.interval.lock();

        self.total.store(0, Ordering::Relaxed);
        *interval = Interval::default();
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::with(Capability::Server)
    }
}
