use parking_lot::Mutex;
use tracing::debug;

use crate::pal::{Platform, PlatformFacade};
use crate::{Capabilities, Capability, CpuTimes, Metric};

/// Turns successive processor time snapshots into a busy fraction.
///
/// The baseline is the snapshot taken at construction, at the previous evaluation or at
/// the last reset, whichever is most recent. The busy fraction is always in `0.0..=1.0`:
/// counters that regress or wrap between two snapshots yield zero rather than a negative
/// or oversized value.
#[derive(Debug)]
struct CpuSampler {
    platform: PlatformFacade,
    state: Mutex<SamplerState>,
}

#[derive(Debug)]
struct SamplerState {
    // `None` if the counters were unavailable when we last tried to take a baseline.
    baseline: Option<CpuTimes>,
    busy_fraction: f64,
}

impl CpuSampler {
    fn new(platform: PlatformFacade) -> Self {
        let baseline = platform.cpu_times();

        Self {
            platform,
            state: Mutex::new(SamplerState {
                baseline,
                busy_fraction: 0.0,
            }),
        }
    }

    fn busy_fraction(&self) -> f64 {
        self.state.lock().busy_fraction
    }

    fn evaluate(&self) {
        let mut state = self.state.lock();

        let Some(current) = self.platform.cpu_times() else {
            // Keep the old baseline, we will try again on the next evaluation.
            debug!("processor time counters unavailable, reporting zero");
            state.busy_fraction = 0.0;
            return;
        };

        state.busy_fraction = match state.baseline {
            Some(previous) => busy_fraction_between(&previous, &current),
            // There is no interval to measure yet; this sample becomes the baseline.
            None => 0.0,
        };
        state.baseline = Some(current);
    }

    fn reset(&self) {
        let baseline = self.platform.cpu_times();

        let mut state = self.state.lock();
        state.baseline = baseline;
        state.busy_fraction = 0.0;
    }

    fn processor_count(&self) -> usize {
        self.platform.processor_count()
    }
}

fn busy_fraction_between(previous: &CpuTimes, current: &CpuTimes) -> f64 {
    let total_delta = current.total().saturating_sub(previous.total());
    let idle_delta = current.idle_total().saturating_sub(previous.idle_total());

    if total_delta == 0 {
        return 0.0;
    }

    let busy_delta = total_delta.saturating_sub(idle_delta);

    #[expect(
        clippy::cast_precision_loss,
        reason = "tick deltas between two samples are far below 2^52"
    )]
    let fraction = busy_delta as f64 / total_delta as f64;

    fraction.clamp(0.0, 1.0)
}

/// Processor utilization of the whole machine as a percentage, sampled at each evaluation.
///
/// Each [`evaluate()`][Metric::evaluate] reports the share of processor time spent doing
/// work since the previous evaluation (or since construction or reset), rendered as a
/// percentage with two decimals and a `%` suffix, always within `0.00%..=100.00%`.
///
/// If the operating system counters cannot be read, the value is `0.00%` and the metric
/// tries again on the next evaluation. On platforms without a counter source the value
/// is always `0.00%`.
///
/// Carries the [`Capability::Computer`] capability.
#[derive(Debug)]
pub struct CpuUsage {
    sampler: CpuSampler,
}

impl CpuUsage {
    const NAME: &'static str = "\"CPU Usage\"";

    /// Creates the metric and takes the first counter snapshot as the baseline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_platform(PlatformFacade::real())
    }

    pub(crate) fn with_platform(platform: PlatformFacade) -> Self {
        Self {
            sampler: CpuSampler::new(platform),
        }
    }

    /// The utilization percentage computed by the most recent evaluation.
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.sampler.busy_fraction() * 100.0
    }
}

impl Default for CpuUsage {
    fn default() -> Self {
        Self::new()
    }
}

impl Metric for CpuUsage {
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn name(&self) -> &str {
        Self::NAME
    }

    fn value_as_string(&self) -> String {
        format!("{:.2}%", self.percent())
    }

    fn evaluate(&self) {
        self.sampler.evaluate();
    }

    fn reset(&self) {
        self.sampler.reset();
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::with(Capability::Computer)
    }
}

/// Processor load of the whole machine, expressed in busy processors.
///
/// Works like [`CpuUsage`] but scales the busy fraction by the number of processors
/// available to the process, so a machine with 8 processors that is half busy reports
/// `4.00`. The value is always within `0.00..=<processor count>`.
///
/// Carries the [`Capability::Computer`] capability.
#[derive(Debug)]
pub struct CpuLoad {
    sampler: CpuSampler,
}

impl CpuLoad {
    const NAME: &'static str = "\"CPU\"";

    /// Creates the metric and takes the first counter snapshot as the baseline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_platform(PlatformFacade::real())
    }

    pub(crate) fn with_platform(platform: PlatformFacade) -> Self {
        Self {
            sampler: CpuSampler::new(platform),
        }
    }

    /// The number of busy processors computed by the most recent evaluation.
    #[must_use]
    pub fn busy_processors(&self) -> f64 {
        #[expect(
            clippy::cast_precision_loss,
            reason = "processor counts are far below 2^52"
        )]
        let processor_count = self.sampler.processor_count() as f64;

        self.sampler.busy_fraction() * processor_count
    }
}

impl Default for CpuLoad {
    fn default() -> Self {
        Self::new()
    }
}

impl Metric for CpuLoad {
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn name(&self) -> &str {
        Self::NAME
    }

    fn value_as_string(&self) -> String {
        format!("{:.2}", self.busy_processors())
    }

    fn evaluate(&self) {
        self.sampler.evaluate();
    }

    fn reset(&self) {
        self.sampler.reset();
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::with(Capability::Computer)
    }
}
