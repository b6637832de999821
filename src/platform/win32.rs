//! Windows: every metric is read from the child's process handle, which stays
//! valid after exit until the handle is closed.

use crate::config::CommandLine;
use crate::error::{CollectionError, LaunchError, Metric, WaitError};
use crate::launcher::{Launcher, ProcessProbe, TimerResolution};
use crate::sample::{CpuTimes, MemoryCounters};
use ::windows::Win32::Foundation::{FILETIME, HANDLE};
use ::windows::Win32::Media::{
    timeBeginPeriod, timeEndPeriod, timeGetDevCaps, TIMECAPS, TIMERR_NOERROR,
};
use ::windows::Win32::System::ProcessStatus::{GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS};
use ::windows::Win32::System::Threading::{
    GetExitCodeProcess, GetProcessTimes, QueryProcessCycleTime,
};
use std::io;
use std::os::windows::io::AsRawHandle;
use std::process::{Child, Command, Stdio};

/// Spawns children with `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct SystemLauncher;

impl SystemLauncher {
    pub fn new() -> Self {
        Self
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

        let child = cmd.spawn().map_err(|source| LaunchError {
            command: command.to_string(),
            source,
        })?;

        Ok(SystemProcess {
            child,
            waited: false,
        })
    }
}

/// A child process. The handle closes when this value drops.
pub struct SystemProcess {
    child: Child,
    waited: bool,
}

impl SystemProcess {
    fn handle(&self) -> Result<HANDLE, CollectionError> {
        if !self.waited {
            return Err(CollectionError::NotTerminated);
        }
        Ok(HANDLE(self.child.as_raw_handle()))
    }
}

impl ProcessProbe for SystemProcess {
    fn wait(&mut self) -> Result<(), WaitError> {
        self.child.wait().map_err(|source| WaitError { source })?;
        self.waited = true;
        Ok(())
    }

    fn exit_code(&self) -> Result<i64, CollectionError> {
        let handle = self.handle()?;
        let mut code = 0u32;
        // SAFETY: handle belongs to our live child; code is a valid out-pointer.
        unsafe { GetExitCodeProcess(handle, &mut code) }
            .map_err(|e| CollectionError::os(Metric::ExitCode, e))?;
        Ok(i64::from(code))
    }

    fn cpu_times(&self) -> Result<CpuTimes, CollectionError> {
        let handle = self.handle()?;
        let mut creation = FILETIME::default();
        let mut exit = FILETIME::default();
        let mut kernel = FILETIME::default();
        let mut user = FILETIME::default();
        // SAFETY: all four out-pointers refer to live locals.
        unsafe { GetProcessTimes(handle, &mut creation, &mut exit, &mut kernel, &mut user) }
            .map_err(|e| CollectionError::os(Metric::CpuTimes, e))?;

        Ok(CpuTimes {
            creation: filetime_ticks(&creation),
            exit: filetime_ticks(&exit),
            kernel: filetime_ticks(&kernel),
            user: filetime_ticks(&user),
        })
    }

    fn cycle_count(&self) -> Result<u64, CollectionError> {
        let handle = self.handle()?;
        let mut cycles = 0u64;
        // SAFETY: cycles is a valid out-pointer.
        unsafe { QueryProcessCycleTime(handle, &mut cycles) }
            .map_err(|e| CollectionError::os(Metric::CycleCount, e))?;
        Ok(cycles)
    }

    fn memory(&self) -> Result<MemoryCounters, CollectionError> {
        let handle = self.handle()?;
        let mut counters = PROCESS_MEMORY_COUNTERS::default();
        // SAFETY: counters is a live local and cb is its exact size.
        unsafe {
            GetProcessMemoryInfo(
                handle,
                &mut counters,
                std::mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32,
            )
        }
        .map_err(|e| CollectionError::os(Metric::Memory, e))?;

        Ok(MemoryCounters {
            page_faults: u64::from(counters.PageFaultCount),
            peak_pagefile: counters.PeakPagefileUsage as u64,
            peak_working_set: counters.PeakWorkingSetSize as u64,
            peak_paged_pool: counters.QuotaPeakPagedPoolUsage as u64,
            peak_non_paged_pool: counters.QuotaPeakNonPagedPoolUsage as u64,
        })
    }

    fn release(&mut self) {
        if !self.waited {
            let _ = self.child.kill();
        }
    }
}

/// FILETIME is already in 100 ns ticks.
fn filetime_ticks(ft: &FILETIME) -> u64 {
    (u64::from(ft.dwHighDateTime) << 32) | u64::from(ft.dwLowDateTime)
}

/// Raises the multimedia timer to its minimum period while held.
#[derive(Debug, Default)]
pub struct SystemTimer {
    period: Option<u32>,
}

impl SystemTimer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimerResolution for SystemTimer {
    fn raise(&mut self) {
        let mut caps = TIMECAPS::default();
        // SAFETY: caps is a live local and cbtc is its exact size.
        let rc = unsafe { timeGetDevCaps(&mut caps, std::mem::size_of::<TIMECAPS>() as u32) };
        let period = if rc == TIMERR_NOERROR {
            caps.wPeriodMin.max(1)
        } else {
            1
        };

        // SAFETY: plain call with a period reported by the driver.
        if unsafe { timeBeginPeriod(period) } == TIMERR_NOERROR {
            log::debug!("timer period raised to {period} ms");
            self.period = Some(period);
        } else {
            log::warn!("could not raise timer resolution to {period} ms");
        }
    }

    fn restore(&mut self) {
        if let Some(period) = self.period.take() {
            // SAFETY: matches the successful timeBeginPeriod above.
            unsafe { timeEndPeriod(period) };
        }
    }
}
