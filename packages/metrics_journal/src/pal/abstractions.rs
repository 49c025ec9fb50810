use std::fmt::Debug;

use crate::CpuTimes;

/// Provides the raw processor time counters of the machine.
///
/// This trait abstracts the operating system interface, allowing for both the real
/// implementation and a mock implementation in tests.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Takes a snapshot of the cumulative processor time counters, summed over all
    /// processors, or `None` if the counters are currently unavailable.
    fn cpu_times(&self) -> Option<CpuTimes>;

    /// The number of processors available to the process. Always at least 1.
    fn processor_count(&self) -> usize;
}
