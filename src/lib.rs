//! # proctime
//!
//! A process-level benchmark harness.
//!
//! Launches a command one or more times, one child at a time, and reports the
//! average wall-clock, kernel and user time, CPU cycles and memory peaks of
//! the child. Warmup runs prime caches and are discarded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use proctime::{reporter_for, BenchRunner, BenchmarkConfig, CommandLine, Report};
//!
//! let config = BenchmarkConfig::from_env()
//!     .runs(10)
//!     .warmup(2)
//!     .command(CommandLine::new(["cargo", "--version"]));
//!
//! let mut runner = BenchRunner::new(config);
//! let acc = runner.execute()?;
//!
//! let report = Report::summarize(&acc, runner.config().runs);
//! reporter_for(runner.config().portable).emit(&report, &mut std::io::stdout())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Failure model
//!
//! Spawn and wait failures abort the benchmark ([`BenchError`]). A metric
//! that cannot be read is counted as zero and marks the result degraded
//! ([`Accumulator::is_degraded`]); the report is still produced.

mod collector;
mod config;
mod error;
mod launcher;
mod platform;
mod report;
mod runner;
mod sample;

pub use collector::{collect, Collected};
pub use config::{BenchmarkConfig, CommandLine};
pub use error::{BenchError, CollectionError, LaunchError, Metric, UsageError, WaitError};
pub use launcher::{Launcher, ProcessGuard, ProcessProbe, TimerGuard, TimerResolution};
pub use platform::{SystemLauncher, SystemProcess, SystemTimer};
pub use report::{reporter_for, ConsoleReporter, MemoryAverages, PortableReporter, Report, Reporter};
pub use runner::BenchRunner;
pub use sample::{
    Accumulator, CpuTimes, Degradation, MemoryCounters, RunSample, TICKS_PER_SECOND,
};
