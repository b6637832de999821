//! Aggregation of summed samples and the two report layouts.
//!
//! Reporters are deterministic: the same [`Report`] always renders to the
//! same bytes. The portable layout is consumed by scripts and must not change.

use crate::sample::{Accumulator, Degradation, TICKS_PER_SECOND};
use std::io::{self, Write};

/// Width of the label column in the verbose layout.
const LABEL_WIDTH: usize = 20;

/// Per-run memory averages. Peaks in bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryAverages {
    pub page_faults: f64,
    pub peak_pagefile: f64,
    pub peak_paged_pool: f64,
    pub peak_non_paged_pool: f64,
    pub peak_working_set: f64,
}

/// Per-run averages derived from an [`Accumulator`]. Times in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub runs: usize,
    pub real: f64,
    pub kernel: f64,
    pub user: f64,
    /// Real time not spent in kernel or user mode, never negative.
    pub unaccounted: f64,
    pub kernel_percent: f64,
    pub user_percent: f64,
    pub unaccounted_percent: f64,
    pub cycles: f64,
    pub memory: MemoryAverages,
    /// Decimal places for memory figures.
    pub memory_precision: usize,
    pub degradation: Option<Degradation>,
}

impl Report {
    /// Average the sums over `runs` configured runs.
    ///
    /// Divides by the configured count, not by the number of folded samples,
    /// so a run whose sample was lost still occupies its slot.
    pub fn summarize(acc: &Accumulator, runs: usize) -> Self {
        let runs = runs.max(1);
        let n = runs as f64;
        let time_factor = 1.0 / TICKS_PER_SECOND as f64 / n;

        let unaccounted = acc.real.saturating_sub(acc.user).saturating_sub(acc.kernel);
        let percent = |part: u64| {
            if acc.real == 0 {
                0.0
            } else {
                100.0 * part as f64 / acc.real as f64
            }
        };

        Self {
            runs,
            real: acc.real as f64 * time_factor,
            kernel: acc.kernel as f64 * time_factor,
            user: acc.user as f64 * time_factor,
            unaccounted: unaccounted as f64 * time_factor,
            kernel_percent: percent(acc.kernel),
            user_percent: percent(acc.user),
            unaccounted_percent: percent(unaccounted),
            cycles: acc.cycles as f64 / n,
            memory: MemoryAverages {
                page_faults: acc.memory.page_faults as f64 / n,
                peak_pagefile: acc.memory.peak_pagefile as f64 / n,
                peak_paged_pool: acc.memory.peak_paged_pool as f64 / n,
                peak_non_paged_pool: acc.memory.peak_non_paged_pool as f64 / n,
                peak_working_set: acc.memory.peak_working_set as f64 / n,
            },
            memory_precision: if runs == 1 { 0 } else { 2 },
            degradation: acc.degradation().cloned(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }
}

/// Turns a [`Report`] into text.
pub trait Reporter {
    fn render(&self, report: &Report) -> String;

    /// Write the complete rendering in one call.
    fn emit(&self, report: &Report, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(self.render(report).as_bytes())?;
        out.flush()
    }
}

/// Three fixed lines: `real`, `user`, `sys`, in seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableReporter;

impl Reporter for PortableReporter {
    fn render(&self, report: &Report) -> String {
        format!(
            "real {:.3}\nuser {:.3}\nsys {:.3}\n",
            report.real, report.user, report.kernel
        )
    }
}

/// Human-readable layout with percentages, cycles and memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    fn line(out: &mut String, label: &str, value: &str) {
        out.push_str(&format!("{:<width$}{}\n", label, value, width = LABEL_WIDTH));
    }

    fn timed(seconds: f64, percent: f64) -> String {
        format!("{:.6}s ({:.1}%)", seconds, percent)
    }

    fn kib(bytes: f64, precision: usize) -> String {
        format!("{:.prec$} KiB", bytes / 1024.0, prec = precision)
    }
}

impl Reporter for ConsoleReporter {
    fn render(&self, report: &Report) -> String {
        let p = report.memory_precision;
        let m = &report.memory;
        let mut out = String::new();

        Self::line(&mut out, "Real time:", &format!("{:.6}s", report.real));
        Self::line(&mut out, "Kernel time:", &Self::timed(report.kernel, report.kernel_percent));
        Self::line(&mut out, "User time:", &Self::timed(report.user, report.user_percent));
        Self::line(
            &mut out,
            "Unaccounted time:",
            &Self::timed(report.unaccounted, report.unaccounted_percent),
        );
        Self::line(&mut out, "CPU cycles:", &format!("{:.0}", report.cycles));
        Self::line(&mut out, "Page faults:", &format!("{:.prec$}", m.page_faults, prec = p));
        Self::line(&mut out, "Peak pagefile:", &Self::kib(m.peak_pagefile, p));
        Self::line(&mut out, "Peak paged pool:", &Self::kib(m.peak_paged_pool, p));
        Self::line(&mut out, "Peak nonpaged pool:", &Self::kib(m.peak_non_paged_pool, p));
        Self::line(&mut out, "Peak working set:", &Self::kib(m.peak_working_set, p));

        if let Some(d) = &report.degradation {
            out.push_str(&format!(
                "Warning: {} metric collection step(s) failed, report is incomplete (first: {})\n",
                d.failed_steps, d.message
            ));
        }

        out
    }
}

/// Pick the layout for a run.
pub fn reporter_for(portable: bool) -> Box<dyn Reporter> {
    if portable {
        Box::new(PortableReporter)
    } else {
        Box::new(ConsoleReporter)
    }
}
