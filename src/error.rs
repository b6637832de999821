//! Error taxonomy for the harness.
//!
//! Fatal errors ([`BenchError`]) stop the benchmark and produce no report.
//! [`CollectionError`] is never fatal: the affected metric reads as zero for
//! that sample and the accumulator remembers that the report is incomplete.

use std::fmt;
use std::io;

/// One independently queryable metric of a terminated process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    ExitCode,
    CpuTimes,
    CycleCount,
    Memory,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::ExitCode => "exit code",
            Metric::CpuTimes => "CPU times",
            Metric::CycleCount => "cycle count",
            Metric::Memory => "memory counters",
        };
        f.write_str(name)
    }
}

/// Malformed, duplicate or missing argument.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UsageError {
    pub message: String,
}

impl UsageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The child process could not be created.
#[derive(thiserror::Error, Debug)]
#[error("Failed to create the process `{command}`: {source}")]
pub struct LaunchError {
    pub command: String,
    #[source]
    pub source: io::Error,
}

/// Waiting for the child process to terminate failed.
#[derive(thiserror::Error, Debug)]
#[error("Failed to wait for the process: {source}")]
pub struct WaitError {
    #[source]
    pub source: io::Error,
}

/// A single metric could not be read from a terminated process.
#[derive(thiserror::Error, Debug)]
pub enum CollectionError {
    #[error("failed to read {metric}: {source}")]
    Os {
        metric: Metric,
        #[source]
        source: io::Error,
    },

    #[error("the process has not terminated")]
    NotTerminated,

    #[error("{metric} is not available on this platform")]
    Unsupported { metric: Metric },
}

impl CollectionError {
    pub fn os(metric: Metric, source: impl Into<io::Error>) -> Self {
        CollectionError::Os {
            metric,
            source: source.into(),
        }
    }

    /// Unsupported counters read as zero without marking the run degraded.
    pub fn is_degrading(&self) -> bool {
        !matches!(self, CollectionError::Unsupported { .. })
    }
}

/// Failures that abort the whole benchmark.
#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Wait(#[from] WaitError),
}

impl BenchError {
    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            BenchError::Usage(_) => 1,
            BenchError::Launch(_) => 2,
            BenchError::Wait(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_fatal_errors_to_distinct_exit_codes() {
        let usage = BenchError::from(UsageError::new("bad flag"));
        let launch = BenchError::from(LaunchError {
            command: "missing".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        let wait = BenchError::from(WaitError {
            source: io::Error::from(io::ErrorKind::Other),
        });

        assert_eq!(usage.exit_code(), 1);
        assert_eq!(launch.exit_code(), 2);
        assert_eq!(wait.exit_code(), 3);
    }

    #[test]
    fn should_not_degrade_when_metric_is_unsupported() {
        let unsupported = CollectionError::Unsupported {
            metric: Metric::CycleCount,
        };
        let failed = CollectionError::os(Metric::Memory, io::Error::from(io::ErrorKind::Other));

        assert!(!unsupported.is_degrading());
        assert!(failed.is_degrading());
        assert!(CollectionError::NotTerminated.is_degrading());
    }

    #[test]
    fn should_name_metric_in_message() {
        let err = CollectionError::Unsupported {
            metric: Metric::CycleCount,
        };
        assert_eq!(err.to_string(), "cycle count is not available on this platform");
    }
}
