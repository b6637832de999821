//! Unix: children are reaped with `wait4` to get their own `rusage`.
//!
//! Unix has no per-process cycle counter, pagefile or pool figures; those
//! report `Unsupported`. The scheduler timer is not adjustable.

use crate::config::CommandLine;
use crate::error::{CollectionError, LaunchError, Metric, WaitError};
use crate::launcher::{Launcher, ProcessProbe, TimerResolution};
use crate::sample::{CpuTimes, MemoryCounters, TICKS_PER_SECOND};
use std::io;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// `ru_maxrss` unit in bytes.
#[cfg(target_os = "macos")]
const MAXRSS_UNIT: u64 = 1;
#[cfg(not(target_os = "macos"))]
const MAXRSS_UNIT: u64 = 1024;

/// Spawns children with `std::process::Command`.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    epoch: Instant,
}

impl SystemLauncher {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for SystemLauncher {
    type Process = SystemProcess;

    fn spawn(&mut self, command: &CommandLine, echo: bool) -> Result<SystemProcess, LaunchError> {
        let program = command.program().ok_or_else(|| LaunchError {
            command: String::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command line"),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(command.args());
        if !echo {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }

        let created = Instant::now();
        let child = cmd.spawn().map_err(|source| LaunchError {
            command: command.to_string(),
            source,
        })?;

        Ok(SystemProcess {
            child,
            epoch: self.epoch,
            created,
            reaped: None,
        })
    }
}

struct Reaped {
    status: libc::c_int,
    usage: libc::rusage,
    exited: Instant,
}

/// A child process plus its `wait4` results once reaped.
pub struct SystemProcess {
    child: Child,
    epoch: Instant,
    created: Instant,
    reaped: Option<Reaped>,
}

impl SystemProcess {
    fn reaped(&self) -> Result<&Reaped, CollectionError> {
        self.reaped.as_ref().ok_or(CollectionError::NotTerminated)
    }

    fn since_epoch(&self, at: Instant) -> u64 {
        duration_ticks(at.duration_since(self.epoch))
    }
}

impl ProcessProbe for SystemProcess {
    fn wait(&mut self) -> Result<(), WaitError> {
        if self.reaped.is_some() {
            return Ok(());
        }

        let pid = libc::pid_t::try_from(self.child.id()).map_err(|e| WaitError {
            source: io::Error::new(io::ErrorKind::InvalidInput, e),
        })?;
        let mut status: libc::c_int = 0;
        // SAFETY: rusage is plain old data; all-zero is a valid value.
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };

        loop {
            // SAFETY: pid is our own un-reaped child and both out-pointers
            // refer to live locals.
            let rc = unsafe { libc::wait4(pid, &mut status, 0, &mut usage) };
            if rc == pid {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(WaitError { source: err });
            }
        }

        self.reaped = Some(Reaped {
            status,
            usage,
            exited: Instant::now(),
        });
        Ok(())
    }

    fn exit_code(&self) -> Result<i64, CollectionError> {
        let status = self.reaped()?.status;
        if libc::WIFEXITED(status) {
            Ok(i64::from(libc::WEXITSTATUS(status)))
        } else if libc::WIFSIGNALED(status) {
            Ok(128 + i64::from(libc::WTERMSIG(status)))
        } else {
            Err(CollectionError::os(
                Metric::ExitCode,
                io::Error::other(format!("unexpected wait status {status:#x}")),
            ))
        }
    }

    fn cpu_times(&self) -> Result<CpuTimes, CollectionError> {
        let reaped = self.reaped()?;
        Ok(CpuTimes {
            creation: self.since_epoch(self.created),
            exit: self.since_epoch(reaped.exited),
            kernel: timeval_ticks(&reaped.usage.ru_stime),
            user: timeval_ticks(&reaped.usage.ru_utime),
        })
    }

    fn cycle_count(&self) -> Result<u64, CollectionError> {
        Err(CollectionError::Unsupported {
            metric: Metric::CycleCount,
        })
    }

    fn memory(&self) -> Result<MemoryCounters, CollectionError> {
        let usage = &self.reaped()?.usage;
        let count = |v: libc::c_long| u64::try_from(v).unwrap_or(0);
        Ok(MemoryCounters {
            page_faults: count(usage.ru_minflt).saturating_add(count(usage.ru_majflt)),
            peak_working_set: count(usage.ru_maxrss).saturating_mul(MAXRSS_UNIT),
            ..Default::default()
        })
    }

    fn release(&mut self) {
        if self.reaped.is_none() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn duration_ticks(d: Duration) -> u64 {
    u64::try_from(d.as_nanos() / 100).unwrap_or(u64::MAX)
}

fn timeval_ticks(tv: &libc::timeval) -> u64 {
    let secs = u64::try_from(tv.tv_sec).unwrap_or(0);
    let micros = u64::try_from(tv.tv_usec).unwrap_or(0);
    secs.saturating_mul(TICKS_PER_SECOND)
        .saturating_add(micros.saturating_mul(10))
}

/// Unix schedulers expose no global timer period.
#[derive(Debug, Clone, Default)]
pub struct SystemTimer;

impl SystemTimer {
    pub fn new() -> Self {
        Self
    }
}

impl TimerResolution for SystemTimer {
    fn raise(&mut self) {
        log::trace!("timer resolution is fixed on this platform");
    }

    fn restore(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_shell(script: &str) -> SystemProcess {
        SystemLauncher::new()
            .spawn(&CommandLine::new(["sh", "-c", script]), false)
            .unwrap()
    }

    #[test]
    fn should_read_exit_code_after_wait() {
        let mut p = spawn_shell("exit 3");
        p.wait().unwrap();
        assert_eq!(p.exit_code().unwrap(), 3);
    }

    #[test]
    fn should_report_signal_as_128_plus_signal() {
        let mut p = spawn_shell("kill -9 $$");
        p.wait().unwrap();
        assert_eq!(p.exit_code().unwrap(), 128 + 9);
    }

    #[test]
    fn should_refuse_queries_before_wait() {
        let mut p = spawn_shell("exit 0");
        assert!(matches!(p.exit_code(), Err(CollectionError::NotTerminated)));
        p.release();
    }

    #[test]
    fn should_measure_real_time_of_child() {
        let mut p = spawn_shell("sleep 0.05");
        p.wait().unwrap();
        let times = p.cpu_times().unwrap();
        assert!(times.real() >= TICKS_PER_SECOND / 20);
        assert!(p.memory().unwrap().peak_working_set > 0);
    }

    #[test]
    fn should_mark_cycle_count_unsupported() {
        let mut p = spawn_shell("exit 0");
        p.wait().unwrap();
        let err = p.cycle_count().unwrap_err();
        assert!(!err.is_degrading());
    }

    #[test]
    fn should_fail_to_spawn_missing_program() {
        let err = SystemLauncher::new()
            .spawn(&CommandLine::new(["/nonexistent/proctime-target"]), false)
            .err()
            .unwrap();
        assert_eq!(err.source.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn should_convert_timeval_to_ticks() {
        // SAFETY: timeval is plain old data.
        let mut tv: libc::timeval = unsafe { std::mem::zeroed() };
        tv.tv_sec = 2;
        tv.tv_usec = 500_000;
        assert_eq!(timeval_ticks(&tv), 25_000_000);
    }
}
