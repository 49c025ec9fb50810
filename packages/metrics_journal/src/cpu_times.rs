/// A snapshot of cumulative processor time counters, in the platform's native tick unit.
///
/// The counters only ever grow while the machine is running. Metrics derive utilization
/// from the difference between two snapshots, never from a single one.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct CpuTimes {
    /// Time spent in user mode.
    pub user: u64,

    /// Time spent in user mode with low priority.
    pub nice: u64,

    /// Time spent in kernel mode.
    pub system: u64,

    /// Time spent idle.
    pub idle: u64,

    /// Time spent idle while waiting for I/O to complete.
    pub iowait: u64,

    /// Time spent servicing hardware interrupts.
    pub irq: u64,

    /// Time spent servicing software interrupts.
    pub softirq: u64,

    /// Time stolen by the hypervisor for other virtual machines.
    pub steal: u64,

    /// Time spent running guest virtual machines. Already included in `user`.
    pub guest: u64,

    /// Time spent running low priority guest virtual machines. Already included in `nice`.
    pub guest_nice: u64,
}

impl CpuTimes {
    /// All time accounted for by the counters.
    ///
    /// Guest time is not added separately because the kernel already counts it as user time.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.user
            .wrapping_add(self.nice)
            .wrapping_add(self.system)
            .wrapping_add(self.idle)
            .wrapping_add(self.iowait)
            .wrapping_add(self.irq)
            .wrapping_add(self.softirq)
            .wrapping_add(self.steal)
    }

    /// Time during which the processors were not doing any work.
    #[must_use]
    pub fn idle_total(&self) -> u64 {
        self.idle.wrapping_add(self.iowait)
    }

    /// Parses the aggregate `cpu` line of `/proc/stat`.
    ///
    /// The line looks like `cpu  4705 356 584 3699 23 23 0 0 0 0`. Older kernels report
    /// fewer columns, in which case the missing counters are zero. At least the first four
    /// counters must be present.
    ///
    /// Returns `None` if the line is not a `cpu` line or a counter is not a number.
    #[must_use]
    pub fn parse_proc_stat_line(line: &str) -> Option<Self> {
        let mut fields = line.split_ascii_whitespace();

        if fields.next()? != "cpu" {
            return None;
        }

        let mut counters = [0_u64; 10];
        let mut parsed = 0_usize;

        for (slot, field) in counters.iter_mut().zip(fields) {
            *slot = field.parse().ok()?;
            parsed = parsed.wrapping_add(1);
        }

        if parsed < 4 {
            return None;
        }

        let [
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
            guest,
            guest_nice,
        ] = counters;

        Some(Self {
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
            guest,
            guest_nice,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_line() {
        let times = CpuTimes::parse_proc_stat_line("cpu  4705 356 584 3699 23 23 0 0 7 1").unwrap();

        assert_eq!(times.user, 4705);
        assert_eq!(times.nice, 356);
        assert_eq!(times.system, 584);
        assert_eq!(times.idle, 3699);
        assert_eq!(times.iowait, 23);
        assert_eq!(times.irq, 23);
        assert_eq!(times.softirq, 0);
        assert_eq!(times.steal, 0);
        assert_eq!(times.guest, 7);
        assert_eq!(times.guest_nice, 1);
    }

    #[test]
    fn parses_short_line_with_zero_fill() {
        let times = CpuTimes::parse_proc_stat_line("cpu 10 20 30 40").unwrap();

        assert_eq!(times.idle, 40);
        assert_eq!(times.iowait, 0);
        assert_eq!(times.total(), 100);
    }

    #[test]
    fn rejects_per_processor_line() {
        assert!(CpuTimes::parse_proc_stat_line("cpu0 1 2 3 4 5 6 7 8 9 10").is_none());
    }

    #[test]
    fn rejects_garbage() {
        assert!(CpuTimes::parse_proc_stat_line("").is_none());
        assert!(CpuTimes::parse_proc_stat_line("cpu 1 2 x 4").is_none());
        assert!(CpuTimes::parse_proc_stat_line("cpu 1 2 3").is_none());
        assert!(CpuTimes::parse_proc_stat_line("intr 1 2 3 4").is_none());
    }

    #[test]
    fn total_excludes_guest_time() {
        let times = CpuTimes {
            user: 10,
            nice: 1,
            system: 5,
            idle: 80,
            iowait: 4,
            guest: 3,
            guest_nice: 1,
            ..CpuTimes::default()
        };

        assert_eq!(times.total(), 100);
        assert_eq!(times.idle_total(), 84);
    }
}
