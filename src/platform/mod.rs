//! Process launcher and timer resolution for the host OS.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::{SystemLauncher, SystemProcess, SystemTimer};

#[cfg(windows)]
mod win32;
#[cfg(windows)]
pub use win32::{SystemLauncher, SystemProcess, SystemTimer};
