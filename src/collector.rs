//! Metric collection from a terminated process.
//!
//! The exit code gates the sample: without it nothing is folded. The other
//! steps degrade individually, so a failed cycle query costs the cycle
//! count of that sample and nothing else.

use crate::error::CollectionError;
use crate::launcher::ProcessProbe;
use crate::sample::RunSample;

/// A sample plus the optional steps that failed while building it.
#[derive(Debug)]
pub struct Collected {
    pub sample: RunSample,
    pub failures: Vec<CollectionError>,
}

/// Read every metric of a terminated process.
pub fn collect<P: ProcessProbe + ?Sized>(process: &P) -> Result<Collected, CollectionError> {
    let exit_code = process.exit_code()?;

    let mut sample = RunSample {
        exit_code,
        ..Default::default()
    };
    let mut failures = Vec::new();

    match process.cpu_times() {
        Ok(times) => {
            sample.real = times.real();
            sample.kernel = times.kernel;
            sample.user = times.user;
        }
        Err(e) => failures.push(e),
    }

    match process.cycle_count() {
        Ok(cycles) => sample.cycles = cycles,
        Err(e) => failures.push(e),
    }

    match process.memory() {
        Ok(memory) => sample.memory = memory,
        Err(e) => failures.push(e),
    }

    Ok(Collected { sample, failures })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Metric, WaitError};
    use crate::sample::{CpuTimes, MemoryCounters};
    use std::io;

    #[derive(Default)]
    struct Probe {
        no_exit_code: bool,
        no_times: bool,
        no_cycles: bool,
        unsupported_memory: bool,
    }

    fn denied(metric: Metric) -> CollectionError {
        CollectionError::os(metric, io::Error::from(io::ErrorKind::PermissionDenied))
    }

    impl ProcessProbe for Probe {
        fn wait(&mut self) -> Result<(), WaitError> {
            Ok(())
        }

        fn exit_code(&self) -> Result<i64, CollectionError> {
            if self.no_exit_code {
                Err(denied(Metric::ExitCode))
            } else {
                Ok(0)
            }
        }

        fn cpu_times(&self) -> Result<CpuTimes, CollectionError> {
            if self.no_times {
                return Err(denied(Metric::CpuTimes));
            }
            Ok(CpuTimes {
                creation: 1_000,
                exit: 1_100,
                kernel: 20,
                user: 30,
            })
        }

        fn cycle_count(&self) -> Result<u64, CollectionError> {
            if self.no_cycles {
                Err(denied(Metric::CycleCount))
            } else {
                Ok(5_000)
            }
        }

        fn memory(&self) -> Result<MemoryCounters, CollectionError> {
            if self.unsupported_memory {
                return Err(CollectionError::Unsupported {
                    metric: Metric::Memory,
                });
            }
            Ok(MemoryCounters {
                page_faults: 12,
                peak_working_set: 4096,
                ..Default::default()
            })
        }
    }

    #[test]
    fn should_collect_all_metrics_when_every_step_succeeds() {
        let collected = collect(&Probe::default()).unwrap();

        assert!(collected.failures.is_empty());
        assert_eq!(collected.sample.real, 100);
        assert_eq!(collected.sample.kernel, 20);
        assert_eq!(collected.sample.user, 30);
        assert_eq!(collected.sample.cycles, 5_000);
        assert_eq!(collected.sample.memory.page_faults, 12);
    }

    #[test]
    fn should_fail_whole_sample_when_exit_code_unreadable() {
        let probe = Probe {
            no_exit_code: true,
            ..Default::default()
        };
        assert!(collect(&probe).is_err());
    }

    #[test]
    fn should_zero_only_failed_metric_when_optional_step_fails() {
        let probe = Probe {
            no_cycles: true,
            ..Default::default()
        };
        let collected = collect(&probe).unwrap();

        assert_eq!(collected.failures.len(), 1);
        assert_eq!(collected.sample.cycles, 0);
        assert_eq!(collected.sample.real, 100);
        assert_eq!(collected.sample.memory.peak_working_set, 4096);
    }

    #[test]
    fn should_report_each_failed_step_separately() {
        let probe = Probe {
            no_times: true,
            no_cycles: true,
            unsupported_memory: true,
            ..Default::default()
        };
        let collected = collect(&probe).unwrap();

        assert_eq!(collected.failures.len(), 3);
        assert_eq!(collected.sample, RunSample::default());
    }
}
