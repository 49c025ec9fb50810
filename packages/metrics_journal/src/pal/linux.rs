use std::fs;
use std::num::NonZero;
use std::thread;

use tracing::debug;

use crate::CpuTimes;
use crate::pal::Platform;

const PROC_STAT_PATH: &str = "/proc/stat";

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

/// Reads processor time counters from the `/proc/stat` virtual file.
///
/// All I/O is synchronous and blocking because the data is served by the kernel and
/// never touches a real storage device.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform;

impl Platform for BuildTargetPlatform {
    fn cpu_times(&self) -> Option<CpuTimes> {
        let contents = match fs::read_to_string(PROC_STAT_PATH) {
            Ok(contents) => contents,
            Err(error) => {
                debug!(path = PROC_STAT_PATH, %error, "processor time counters unavailable");
                return None;
            }
        };

        // The first line is the aggregate over all processors.
        let times = contents.lines().next().and_then(CpuTimes::parse_proc_stat_line);

        if times.is_none() {
            debug!(path = PROC_STAT_PATH, "failed to parse processor time counters");
        }

        times
    }

    fn processor_count(&self) -> usize {
        thread::available_parallelism().map_or(1, NonZero::get)
    }
}
