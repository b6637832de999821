//! The benchmark run loop.

use crate::collector::collect;
use crate::config::BenchmarkConfig;
use crate::error::BenchError;
use crate::launcher::{Launcher, ProcessGuard, ProcessProbe, TimerGuard, TimerResolution};
use crate::platform::{SystemLauncher, SystemTimer};
use crate::sample::Accumulator;

/// Runs a command `warmup + runs` times, one child at a time.
///
/// # Example
///
/// ```rust,no_run
/// use proctime::{BenchRunner, BenchmarkConfig, CommandLine, Report};
///
/// let config = BenchmarkConfig::new()
///     .runs(5)
///     .warmup(1)
///     .command(CommandLine::new(["git", "status"]));
///
/// let mut runner = BenchRunner::new(config);
/// let acc = runner.execute()?;
/// let report = Report::summarize(&acc, runner.config().runs);
/// println!("{:.3}s", report.real);
/// # Ok::<(), proctime::BenchError>(())
/// ```
pub struct BenchRunner<L = SystemLauncher, T = SystemTimer> {
    config: BenchmarkConfig,
    launcher: L,
    timer: T,
}

impl BenchRunner {
    /// Create a runner that launches real processes.
    pub fn new(config: BenchmarkConfig) -> Self {
        Self::with_parts(config, SystemLauncher::new(), SystemTimer::new())
    }
}

impl<L: Launcher, T: TimerResolution> BenchRunner<L, T> {
    /// Create a runner over explicit OS collaborators.
    pub fn with_parts(config: BenchmarkConfig, launcher: L, timer: T) -> Self {
        Self {
            config,
            launcher,
            timer,
        }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Run warmup then measured iterations and return the summed samples.
    ///
    /// A spawn or wait failure in either phase aborts the whole benchmark;
    /// samples gathered before the failure are dropped with it. Collection
    /// failures only degrade the result.
    pub fn execute(&mut self) -> Result<Accumulator, BenchError> {
        self.config.validate()?;

        let Self {
            config,
            launcher,
            timer,
        } = self;
        let _resolution = TimerGuard::acquire(timer);

        warm_up(launcher, config)?;
        measure(launcher, config)
    }
}

fn warm_up<L: Launcher>(launcher: &mut L, config: &BenchmarkConfig) -> Result<(), BenchError> {
    if config.warmup_runs > 0 {
        log::info!("warming up: {} run(s)", config.warmup_runs);
    }
    for i in 0..config.warmup_runs {
        log::debug!("warmup {i}");
        spawn_and_wait(launcher, config, false)?;
    }
    Ok(())
}

fn measure<L: Launcher>(
    launcher: &mut L,
    config: &BenchmarkConfig,
) -> Result<Accumulator, BenchError> {
    log::info!("measuring: {} run(s)", config.runs);

    let mut acc = Accumulator::new();
    for i in 0..config.runs {
        // Only the first measured run may write to the console.
        let echo = i == 0 && config.echo;
        log::debug!("run {i} (echo: {echo})");

        let process = spawn_and_wait(launcher, config, echo)?;
        match collect(&*process) {
            Ok(collected) => {
                for failure in &collected.failures {
                    if failure.is_degrading() && !acc.is_degraded() {
                        log::warn!("run {i}: {failure}; counting it as zero");
                    }
                    acc.record_failure(failure);
                }
                if collected.sample.exit_code != 0 {
                    log::debug!("run {i}: exit code {}", collected.sample.exit_code);
                }
                acc.fold(&collected.sample);
            }
            Err(e) => {
                log::warn!("run {i}: {e}; sample discarded");
                acc.record_failure(&e);
            }
        }
    }

    Ok(acc)
}

fn spawn_and_wait<L: Launcher>(
    launcher: &mut L,
    config: &BenchmarkConfig,
    echo: bool,
) -> Result<ProcessGuard<L::Process>, BenchError> {
    let mut process = ProcessGuard::new(launcher.spawn(&config.command, echo)?);
    process.wait()?;
    Ok(process)
}
