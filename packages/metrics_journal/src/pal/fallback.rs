use std::num::NonZero;
use std::thread;

use crate::CpuTimes;
use crate::pal::Platform;

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

/// Platform used on operating systems without a supported counter source.
///
/// Processor time counters are always reported as unavailable, which processor metrics
/// render as zero.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform;

impl Platform for BuildTargetPlatform {
    #[cfg_attr(test, mutants::skip)] // Nothing to mutate.
    fn cpu_times(&self) -> Option<CpuTimes> {
        None
    }

    fn processor_count(&self) -> usize {
        thread::available_parallelism().map_or(1, NonZero::get)
    }
}
