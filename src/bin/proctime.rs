//! proctime: run a command repeatedly and report its average resource usage.
//!
//! Exit codes: 0 success, 1 usage error, 2 the command could not be started,
//! 3 waiting for the command failed.

use anyhow::{anyhow, Result};
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use proctime::{reporter_for, BenchError, BenchRunner, BenchmarkConfig, CommandLine, Report};
use std::ffi::OsString;
use std::process::ExitCode;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "proctime",
    version,
    about = "Time a command: wall, kernel and user time, cycles and memory peaks",
    long_about = "
proctime launches a command, waits for it and reports where its time went.
With -r the command runs several times and every figure is averaged; -w adds
warmup runs that are executed silently and discarded.

Only the first measured run may print to the console. Everything after the
first non-flag argument is the command and is passed through untouched.

Example:
    proctime cargo build                # Single run, verbose report
    proctime -r 10 -w 2 ./server --check  # Average of 10 runs after 2 warmups
    proctime -p -n make                 # Portable real/user/sys output
"
)]
struct Cli {
    /// Number of measured runs
    #[arg(short = 'r', value_name = "N", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    runs: Option<usize>,

    /// Number of warmup runs (discarded, output always hidden)
    #[arg(short = 'w', value_name = "N")]
    warmup: Option<usize>,

    /// Show the output of the first measured run (default)
    #[arg(short = 'e', conflicts_with = "no_echo")]
    echo: bool,

    /// Hide the output of every run
    #[arg(short = 'n')]
    no_echo: bool,

    /// Print the portable three-line real/user/sys report
    #[arg(short = 'p')]
    portable: bool,

    /// Command to benchmark, followed by its arguments
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true
    )]
    command: Vec<OsString>,
}

impl Cli {
    /// Flags override the environment defaults.
    fn into_config(self) -> BenchmarkConfig {
        let mut cfg = BenchmarkConfig::from_env();
        if let Some(r) = self.runs {
            cfg.runs = r;
        }
        if let Some(w) = self.warmup {
            cfg.warmup_runs = w;
        }
        if self.echo {
            cfg.echo = true;
        }
        if self.no_echo {
            cfg.echo = false;
        }
        if self.portable {
            cfg.portable = true;
        }
        cfg.command(CommandLine::new(self.command))
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are not errors.
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            let code = err
                .downcast_ref::<BenchError>()
                .map_or(1, BenchError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config();
    log::debug!(
        "runs: {}, warmup: {}, command: {}",
        config.runs,
        config.warmup_runs,
        config.command
    );

    let mut runner = BenchRunner::new(config);
    let acc = runner.execute()?;

    if acc.failed_exits > 0 {
        log::warn!(
            "{} of {} measured run(s) exited with a non-zero code (last: {})",
            acc.failed_exits,
            runner.config().runs,
            acc.last_exit_code.unwrap_or_default()
        );
    }

    let portable = runner.config().portable;
    let report = Report::summarize(&acc, runner.config().runs);
    if portable {
        if let Some(d) = &report.degradation {
            log::warn!(
                "{} metric collection step(s) failed, report is incomplete (first: {})",
                d.failed_steps,
                d.message
            );
        }
    }

    reporter_for(portable)
        .emit(&report, &mut std::io::stdout().lock())
        .map_err(|e| anyhow!("Failed to write the report: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn should_parse_flags_before_command() {
        let cli = Cli::try_parse_from(["proctime", "-r", "5", "-w", "2", "-n", "-p", "ls", "-la"]).unwrap();
        assert_eq!(cli.runs, Some(5));
        assert_eq!(cli.warmup, Some(2));
        assert!(cli.no_echo);
        assert!(cli.portable);
        assert_eq!(cli.command, vec![OsString::from("ls"), OsString::from("-la")]);
    }

    #[test]
    fn should_pass_flags_after_command_to_target() {
        let cli = Cli::try_parse_from(["proctime", "make", "-r", "3", "-p"]).unwrap();
        assert_eq!(cli.runs, None);
        assert!(!cli.portable);
        assert_eq!(cli.command.len(), 4);
    }

    #[test]
    fn should_reject_duplicate_flag() {
        let err = Cli::try_parse_from(["proctime", "-r", "5", "-r", "10", "ls"]).unwrap_err();
        assert!(err.use_stderr());
        assert!(err.to_string().contains("cannot be used multiple times"));
    }

    #[test]
    fn should_reject_zero_runs() {
        let err = Cli::try_parse_from(["proctime", "-r", "0", "ls"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn should_reject_missing_command() {
        assert!(Cli::try_parse_from(["proctime", "-r", "2"]).is_err());
    }

    #[test]
    fn should_reject_unknown_flag() {
        assert!(Cli::try_parse_from(["proctime", "-x", "ls"]).is_err());
    }

    #[test]
    fn should_reject_echo_and_no_echo_together() {
        assert!(Cli::try_parse_from(["proctime", "-e", "-n", "ls"]).is_err());
    }

    #[test]
    fn should_disable_echo_when_no_echo_given() {
        let cli = Cli::try_parse_from(["proctime", "-n", "ls"]).unwrap();
        let cfg = cli.into_config();
        assert!(!cfg.echo);
        assert_eq!(cfg.command.to_string(), "ls");
    }
}
