//! Uniform command line for every benchmark program.

use tracing::{error, info, warn};

use crate::config::RunConfig;
use crate::errors::BenchError;
use crate::logging::init_logging;
use crate::report::WrittenReport;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLineConfig {
    pub run: RunConfig,
    pub help: bool,
    /// Arguments that were not understood, in order.
    pub ignored: Vec<String>,
}

impl CommandLineConfig {
    /// `args[0]` is the program name. Unknown arguments and flags missing
    /// their value are collected in `ignored`; a value that is not a
    /// non-negative integer is an error.
    pub fn from_args(args: &[&str]) -> Result<Self, BenchError> {
        let mut run = RunConfig::default();
        let mut help = false;
        let mut ignored = Vec::new();
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            let target = match *arg {
                "--num-entries" => &mut run.num_entries,
                "--num-warmup" => &mut run.num_warmup,
                "--num-repitions" => &mut run.num_repetitions,
                "--help" | "-h" => {
                    help = true;
                    continue;
                }
                other => {
                    ignored.push(other.to_string());
                    continue;
                }
            };
            match iter.next() {
                Some(value) => *target = parse_count(arg, value)?,
                None => ignored.push(arg.to_string()),
            }
        }
        Ok(Self { run, help, ignored })
    }

    pub fn help(program: &str) -> String {
        format!(
            "Usage: {program} [--num-entries N] [--num-warmup N] [--num-repitions N]\n"
        )
    }
}

fn parse_count(flag: &str, value: &str) -> Result<u64, BenchError> {
    value.parse::<u64>().map_err(|_| {
        BenchError::invalid_input(format!("{flag} expects a non-negative integer, got {value:?}"))
    })
}

/// Parses `args`, runs `body` and prints one JSON line per report row.
/// Returns the process exit code: `0` on success, `-1` on any failure.
pub fn run_program<F>(program: &str, args: &[String], body: F) -> i32
where
    F: FnOnce(&RunConfig) -> Result<Vec<WrittenReport>, BenchError>,
{
    init_logging();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let cli = match CommandLineConfig::from_args(&args) {
        Ok(cli) => cli,
        Err(err) => {
            error!(program, error = %err, "invalid arguments");
            eprint!("{}", CommandLineConfig::help(program));
            return -1;
        }
    };
    if cli.help {
        print!("{}", CommandLineConfig::help(program));
        return 0;
    }
    for arg in &cli.ignored {
        warn!(program, argument = %arg, "unknown argument ignored");
    }

    info!(
        program,
        num_entries = cli.run.num_entries,
        num_warmup = cli.run.num_warmup,
        num_repetitions = cli.run.num_repetitions,
        "starting benchmark"
    );
    match body(&cli.run) {
        Ok(reports) => {
            for report in &reports {
                println!("{}", report.summary_json());
            }
            info!(program, reports = reports.len(), "benchmark finished");
            0
        }
        Err(err) => {
            error!(program, error = %err, "benchmark failed");
            -1
        }
    }
}
