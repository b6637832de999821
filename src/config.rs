//! Configuration for a benchmark.

use crate::error::UsageError;
use std::ffi::{OsStr, OsString};
use std::fmt;

/// The target program and its arguments, exactly as received.
///
/// Arguments are handed to the launcher as-is; nothing here re-tokenizes or
/// re-escapes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    args: Vec<OsString>,
}

impl CommandLine {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> Option<&OsStr> {
        self.args.first().map(OsString::as_os_str)
    }

    pub fn args(&self) -> &[OsString] {
        self.args.get(1..).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Configuration for a benchmark.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of measured runs.
    pub runs: usize,
    /// Warmup runs (discarded).
    pub warmup_runs: usize,
    /// Show the child's output during the first measured run.
    pub echo: bool,
    /// Terse machine-parsable report.
    pub portable: bool,
    /// Command to benchmark.
    pub command: CommandLine,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            runs: 1,
            warmup_runs: 0,
            echo: true,
            portable: false,
            command: CommandLine::default(),
        }
    }
}

impl BenchmarkConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config from environment variables.
    ///
    /// Supported variables:
    /// - `PROCTIME_RUNS`: measured runs (default: 1)
    /// - `PROCTIME_WARMUP`: warmup runs (default: 0)
    /// - `PROCTIME_ECHO`: echo the first measured run (default: true)
    /// - `PROCTIME_PORTABLE`: portable report (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup("PROCTIME_RUNS") {
            match v.parse() {
                Ok(n) => cfg.runs = n,
                Err(_) => log::warn!("ignoring PROCTIME_RUNS={v:?}: not a count"),
            }
        }
        if let Some(v) = lookup("PROCTIME_WARMUP") {
            match v.parse() {
                Ok(n) => cfg.warmup_runs = n,
                Err(_) => log::warn!("ignoring PROCTIME_WARMUP={v:?}: not a count"),
            }
        }
        if let Some(v) = lookup("PROCTIME_ECHO") {
            cfg.echo = parse_flag(&v);
        }
        if let Some(v) = lookup("PROCTIME_PORTABLE") {
            cfg.portable = parse_flag(&v);
        }

        cfg
    }

    /// Set the number of measured runs.
    pub fn runs(mut self, n: usize) -> Self {
        self.runs = n;
        self
    }

    /// Set the number of warmup runs.
    pub fn warmup(mut self, n: usize) -> Self {
        self.warmup_runs = n;
        self
    }

    /// Set whether the first measured run's output is shown.
    pub fn echo(mut self, v: bool) -> Self {
        self.echo = v;
        self
    }

    /// Select the portable report.
    pub fn portable(mut self, v: bool) -> Self {
        self.portable = v;
        self
    }

    /// Set the command to benchmark.
    pub fn command(mut self, command: CommandLine) -> Self {
        self.command = command;
        self
    }

    /// Check the invariants the run loop relies on.
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.runs == 0 {
            return Err(UsageError::new("The run count must be greater than 0."));
        }
        if self.command.is_empty() {
            return Err(UsageError::new("A program to time must be present."));
        }
        Ok(())
    }
}

fn parse_flag(v: &str) -> bool {
    v != "0" && !v.eq_ignore_ascii_case("false")
}
