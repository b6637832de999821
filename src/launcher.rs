//! Seams to the operating system.
//!
//! The run loop only talks to a [`Launcher`] (spawn), a [`ProcessProbe`]
//! (wait and query one child) and a [`TimerResolution`]. Both guards in this
//! module release their resource on drop, so early returns cannot leak a
//! process handle or leave the scheduler timer raised.

use crate::config::CommandLine;
use crate::error::{CollectionError, LaunchError, WaitError};
use crate::sample::{CpuTimes, MemoryCounters};
use std::ops::{Deref, DerefMut};

/// Creates child processes.
pub trait Launcher {
    type Process: ProcessProbe;

    /// Start `command`. With `echo == false` the child gets no inherited
    /// standard handles.
    fn spawn(&mut self, command: &CommandLine, echo: bool) -> Result<Self::Process, LaunchError>;
}

/// A spawned child process.
///
/// Queries are only meaningful after a successful [`wait`](Self::wait); each
/// one fails on its own without affecting the others.
pub trait ProcessProbe {
    /// Block until the process terminates. No timeout.
    fn wait(&mut self) -> Result<(), WaitError>;

    fn exit_code(&self) -> Result<i64, CollectionError>;

    fn cpu_times(&self) -> Result<CpuTimes, CollectionError>;

    fn cycle_count(&self) -> Result<u64, CollectionError>;

    fn memory(&self) -> Result<MemoryCounters, CollectionError>;

    /// Free OS resources held for this process. Called exactly once.
    fn release(&mut self) {}
}

/// Owns a spawned process and releases it when dropped.
pub struct ProcessGuard<P: ProcessProbe> {
    process: P,
}

impl<P: ProcessProbe> ProcessGuard<P> {
    pub fn new(process: P) -> Self {
        Self { process }
    }
}

impl<P: ProcessProbe> Deref for ProcessGuard<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.process
    }
}

impl<P: ProcessProbe> DerefMut for ProcessGuard<P> {
    fn deref_mut(&mut self) -> &mut P {
        &mut self.process
    }
}

impl<P: ProcessProbe> Drop for ProcessGuard<P> {
    fn drop(&mut self) {
        self.process.release();
    }
}

/// Process-wide scheduler timer resolution.
pub trait TimerResolution {
    /// Switch to the finest granularity the host supports.
    fn raise(&mut self);

    /// Undo [`raise`](Self::raise).
    fn restore(&mut self);
}

/// Holds the raised timer resolution for its lifetime.
pub struct TimerGuard<'a, T: TimerResolution + ?Sized> {
    timer: &'a mut T,
}

impl<'a, T: TimerResolution + ?Sized> TimerGuard<'a, T> {
    pub fn acquire(timer: &'a mut T) -> Self {
        timer.raise();
        Self { timer }
    }
}

impl<T: TimerResolution + ?Sized> Drop for TimerGuard<'_, T> {
    fn drop(&mut self) {
        self.timer.restore();
    }
}
