//! SQLite micro-benchmarks: engine directives, index layouts and parallel
//! lookups, each reported as latency percentiles under `reports/`.
//! Run the programs with `cargo run --release --bin <program>`; Criterion
//! benches for the harness itself live under `benches/`.

pub mod cli;
pub mod config;
pub mod engine;
pub mod entries;
pub mod errors;
pub mod logging;
pub mod report;
pub mod runner;
pub mod schema;
pub mod stats;
pub mod workloads;

pub use crate::cli::{CommandLineConfig, run_program};
pub use crate::config::{ConnectionTuning, PragmaSet, RunConfig};
pub use crate::engine::{BeginMode, DEFAULT_DB_PATH, Finish, TxnScope};
pub use crate::errors::{BenchError, ResultExt};
pub use crate::report::{REPORT_HEADER, ReportRow, Reporter, WrittenReport};
pub use crate::runner::{Measurement, Phase, run_timed};
pub use crate::stats::LatencySummary;
