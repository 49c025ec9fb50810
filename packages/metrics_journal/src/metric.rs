use std::fmt::Debug;

use crate::Capabilities;

/// A named, stateful observable quantity that a [`MetricsRegistry`][crate::MetricsRegistry]
/// can evaluate, render and reset.
///
/// Producer code mutates a metric through the methods of its concrete type (e.g.
/// [`Counter::increment()`][crate::Counter::increment]). The registry only ever uses the
/// methods of this trait, in the order `evaluate()` → `value_as_string()` → `reset()`
/// during a logging pass.
///
/// # Thread safety
///
/// Every method takes `&self` and must be safe to call concurrently with producer-side
/// mutation and with the other methods of this trait. Each implementation picks its own
/// internal synchronization (a mutex, or atomics where the invariants permit).
///
/// # Implementing
///
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// use metrics_journal::{Capabilities, Capability, Metric};
///
/// #[derive(Debug, Default)]
/// struct QueueDepth {
///     depth: AtomicU64,
/// }
///
/// impl Metric for QueueDepth {
///     fn name(&self) -> &str {
///         "queue_depth"
///     }
///
///     fn value_as_string(&self) -> String {
///         self.depth.load(Ordering::Relaxed).to_string()
///     }
///
///     fn evaluate(&self) {}
///
///     fn reset(&self) {
///         self.depth.store(0, Ordering::Relaxed);
///     }
///
///     fn capabilities(&self) -> Capabilities {
///         Capabilities::with(Capability::Server)
///     }
/// }
/// ```
pub trait Metric: Debug + Send + Sync + 'static {
    /// The display name of the metric, written in front of its value in the log.
    ///
    /// Stable for the lifetime of the metric.
    fn name(&self) -> &str;

    /// Renders the current value of the metric.
    ///
    /// Counts are rendered as integers, ratios and percentages with two decimal places
    /// and durations with a unit suffix. Callable at any time, with no precondition.
    fn value_as_string(&self) -> String;

    /// Recomputes any value that depends on the state of the world as of now, such as
    /// turning an accumulated delta into a rate or taking a fresh processor time sample.
    ///
    /// Metrics that have nothing to recompute implement this as a no-op.
    fn evaluate(&self);

    /// Returns the metric to the state of a freshly constructed instance.
    fn reset(&self);

    /// The capabilities this metric carries, used to select metrics for bulk logging.
    ///
    /// The default implementation carries only the root capability.
    #[cfg_attr(test, mutants::skip)] // Every metric carries the root either way.
    fn capabilities(&self) -> Capabilities {
        Capabilities::DEFAULT
    }
}
