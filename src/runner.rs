//! Timed operation runner shared by every benchmark.
//!
//! A benchmark is an input selector plus an operation. The runner calls the
//! operation `warmup` times inside one transaction scope that is always rolled
//! back, then `repetitions` times inside a fresh scope, timing each call with
//! a monotonic clock. The first failing call aborts the whole run.

use std::time::Instant;

use rusqlite::Connection;
use tracing::debug;

use crate::config::RunConfig;
use crate::engine::{BeginMode, Finish, TxnScope};
use crate::errors::BenchError;

/// Which regime a call belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Warmup,
    Measured,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Warmup => "Warmup",
            Phase::Measured => "Measured",
        }
    }
}

/// Shape of one timed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Measurement {
    pub warmup: u64,
    pub repetitions: u64,
    pub begin: BeginMode,
    /// How the measured scope ends; the warmup scope always rolls back.
    pub finish: Finish,
    /// Divide each duration by the rows the call touched.
    pub per_row: bool,
    /// Keep calling until the touched rows reach `repetitions` rather than
    /// making exactly `repetitions` calls.
    pub until_rows: bool,
}

impl Measurement {
    /// Warmup and repetitions from `config`, rolled back afterwards.
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            warmup: config.num_warmup,
            repetitions: config.num_repetitions,
            begin: BeginMode::Default,
            finish: Finish::Rollback,
            per_row: false,
            until_rows: false,
        }
    }

    pub fn commit_after_measurement(mut self, commit: bool) -> Self {
        self.finish = if commit { Finish::Commit } else { Finish::Rollback };
        self
    }

    pub fn per_row(mut self) -> Self {
        self.per_row = true;
        self
    }

    /// Row budget instead of a call budget; implies [`Measurement::per_row`].
    pub fn until_rows(mut self) -> Self {
        self.per_row = true;
        self.until_rows = true;
        self
    }

    pub fn begin_with(mut self, begin: BeginMode) -> Self {
        self.begin = begin;
        self
    }
}

/// Runs `op` under `measurement` and returns one duration (ns) per measured
/// call, in call order.
///
/// `input` is invoked before the clock starts, so entry synthesis, random
/// picks and any bookkeeping writes are not part of the sample. `op` returns
/// the number of rows it touched; that count only matters for
/// [`Measurement::per_row`] and [`Measurement::until_rows`]. Under a row
/// budget a call that touches no rows is an error, since the budget could
/// never be spent.
pub fn run_timed<I, S, F>(
    conn: &Connection,
    measurement: &Measurement,
    mut input: S,
    mut op: F,
) -> Result<Vec<u64>, BenchError>
where
    S: FnMut(Phase, u64) -> Result<I, BenchError>,
    F: FnMut(&I, Phase, u64) -> Result<u64, BenchError>,
{
    let scope = TxnScope::begin(conn, measurement.begin)?;
    for i in 0..measurement.warmup {
        let item = input(Phase::Warmup, i)?;
        op(&item, Phase::Warmup, i)?;
    }
    scope.finish(Finish::Rollback)?;
    debug!(calls = measurement.warmup, "warmup finished");

    let scope = TxnScope::begin(conn, measurement.begin)?;
    let mut times = Vec::with_capacity(measurement.repetitions as usize);
    let mut total_rows = 0u64;
    let mut i = 0u64;
    loop {
        let spent = if measurement.until_rows { total_rows } else { i };
        if spent >= measurement.repetitions {
            break;
        }
        let item = input(Phase::Measured, i)?;
        let begin = Instant::now();
        let rows = op(&item, Phase::Measured, i)?;
        let elapsed = begin.elapsed().as_nanos() as u64;
        if measurement.until_rows && rows == 0 {
            return Err(BenchError::invalid_input(format!(
                "call {i} touched no rows under a row budget"
            )));
        }
        times.push(if measurement.per_row {
            elapsed / rows.max(1)
        } else {
            elapsed
        });
        total_rows += rows;
        i += 1;
    }
    scope.finish(measurement.finish)?;
    debug!(calls = i, rows = total_rows, finish = ?measurement.finish, "measurement finished");
    Ok(times)
}
