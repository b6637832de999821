//! Per-run observations and their running sums.
//!
//! Time fields are 100 ns ticks, memory peaks are bytes.

use crate::error::{CollectionError, Metric};

/// Ticks per second for every time field in this module.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Timestamps and CPU durations of one process lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub creation: u64,
    pub exit: u64,
    pub kernel: u64,
    pub user: u64,
}

impl CpuTimes {
    /// Wall-clock lifetime of the process.
    pub fn real(&self) -> u64 {
        self.exit.saturating_sub(self.creation)
    }
}

/// Memory usage over a process lifetime. Peaks, not final values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounters {
    pub page_faults: u64,
    pub peak_pagefile: u64,
    pub peak_working_set: u64,
    pub peak_paged_pool: u64,
    pub peak_non_paged_pool: u64,
}

impl MemoryCounters {
    fn add(&mut self, other: &MemoryCounters) {
        self.page_faults = self.page_faults.saturating_add(other.page_faults);
        self.peak_pagefile = self.peak_pagefile.saturating_add(other.peak_pagefile);
        self.peak_working_set = self.peak_working_set.saturating_add(other.peak_working_set);
        self.peak_paged_pool = self.peak_paged_pool.saturating_add(other.peak_paged_pool);
        self.peak_non_paged_pool = self
            .peak_non_paged_pool
            .saturating_add(other.peak_non_paged_pool);
    }
}

/// Raw observations of one measured iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSample {
    pub exit_code: i64,
    pub real: u64,
    pub kernel: u64,
    pub user: u64,
    pub cycles: u64,
    pub memory: MemoryCounters,
}

/// First collection failure plus how many steps have failed so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradation {
    pub metric: Option<Metric>,
    pub message: String,
    pub failed_steps: usize,
}

/// Running sums over all measured iterations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulator {
    /// Samples folded so far.
    pub samples: usize,
    pub real: u64,
    pub kernel: u64,
    pub user: u64,
    pub cycles: u64,
    pub memory: MemoryCounters,
    /// Exit code of the most recently folded sample.
    pub last_exit_code: Option<i64>,
    /// Folded samples whose process exited non-zero.
    pub failed_exits: usize,
    degradation: Option<Degradation>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one complete sample to the sums.
    pub fn fold(&mut self, sample: &RunSample) {
        self.samples += 1;
        self.real = self.real.saturating_add(sample.real);
        self.kernel = self.kernel.saturating_add(sample.kernel);
        self.user = self.user.saturating_add(sample.user);
        self.cycles = self.cycles.saturating_add(sample.cycles);
        self.memory.add(&sample.memory);
        self.last_exit_code = Some(sample.exit_code);
        if sample.exit_code != 0 {
            self.failed_exits += 1;
        }
    }

    /// Remember a failed collection step. The flag is never cleared.
    pub fn record_failure(&mut self, err: &CollectionError) {
        if !err.is_degrading() {
            return;
        }
        match &mut self.degradation {
            Some(d) => d.failed_steps += 1,
            None => {
                let metric = match err {
                    CollectionError::Os { metric, .. } => Some(*metric),
                    _ => None,
                };
                self.degradation = Some(Degradation {
                    metric,
                    message: err.to_string(),
                    failed_steps: 1,
                });
            }
        }
    }

    /// Set once any collection step has failed.
    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }

    pub fn degradation(&self) -> Option<&Degradation> {
        self.degradation.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn sample(real: u64, kernel: u64, user: u64) -> RunSample {
        RunSample {
            real,
            kernel,
            user,
            ..Default::default()
        }
    }

    #[test]
    fn should_compute_real_time_from_timestamps() {
        let times = CpuTimes {
            creation: 1_000,
            exit: 1_250,
            kernel: 40,
            user: 60,
        };
        assert_eq!(times.real(), 250);
    }

    #[test]
    fn should_clamp_real_time_when_clock_runs_backwards() {
        let times = CpuTimes {
            creation: 500,
            exit: 100,
            ..Default::default()
        };
        assert_eq!(times.real(), 0);
    }

    #[test]
    fn should_sum_every_field_when_folding() {
        let mut acc = Accumulator::new();
        let mut s = sample(100, 20, 30);
        s.cycles = 7;
        s.memory.page_faults = 3;
        s.memory.peak_working_set = 4096;
        acc.fold(&s);
        acc.fold(&s);

        assert_eq!(acc.samples, 2);
        assert_eq!(acc.real, 200);
        assert_eq!(acc.kernel, 40);
        assert_eq!(acc.user, 60);
        assert_eq!(acc.cycles, 14);
        assert_eq!(acc.memory.page_faults, 6);
        assert_eq!(acc.memory.peak_working_set, 8192);
        assert!(!acc.is_degraded());
    }

    #[test]
    fn should_track_non_zero_exits() {
        let mut acc = Accumulator::new();
        acc.fold(&RunSample {
            exit_code: 3,
            ..Default::default()
        });
        acc.fold(&RunSample::default());

        assert_eq!(acc.failed_exits, 1);
        assert_eq!(acc.last_exit_code, Some(0));
    }

    #[test]
    fn should_keep_first_failure_when_degraded_repeatedly() {
        let mut acc = Accumulator::new();
        acc.record_failure(&CollectionError::os(
            Metric::CycleCount,
            io::Error::from(io::ErrorKind::PermissionDenied),
        ));
        acc.record_failure(&CollectionError::NotTerminated);

        let d = acc.degradation().unwrap();
        assert_eq!(d.metric, Some(Metric::CycleCount));
        assert_eq!(d.failed_steps, 2);
        assert!(d.message.contains("cycle count"));
    }

    #[test]
    fn should_ignore_unsupported_metrics() {
        let mut acc = Accumulator::new();
        acc.record_failure(&CollectionError::Unsupported {
            metric: Metric::CycleCount,
        });
        assert!(!acc.is_degraded());
    }
}
