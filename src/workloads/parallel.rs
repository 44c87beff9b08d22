//! Concurrent point lookups against one shared database file.
//!
//! The blockset table is filled and the record list shuffled before any
//! worker starts. Workers then only read the shared records: each gets a
//! disjoint slice, opens its own connection and runs its own deferred
//! transaction. Contention is left to SQLite.

use std::ops::Range;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};

use crate::config::{ConnectionTuning, RunConfig};
use crate::engine::{BeginMode, Finish, TxnScope, apply_pragmas, expect_value, open_database, optimize};
use crate::entries::{BlocksetRecord, PARALLEL_SEED, seeded_rng};
use crate::errors::{BenchError, ResultExt};
use crate::report::{Reporter, WrittenReport};
use crate::runner::{Measurement, run_timed};
use crate::schema::{
    CREATE_HASHED_BLOCKSET_INDEX, CREATE_HASHED_BLOCKSET_TABLE, INSERT_HASHED_BLOCKSET,
    SELECT_HASHED_BLOCKSET_ID,
};
use crate::stats::kops;

/// Splits `0..len` into `parts` contiguous ranges of `len / parts`; the last
/// range takes the remainder.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }
    let per_part = len / parts;
    (0..parts)
        .map(|i| {
            let start = i * per_part;
            let end = if i == parts - 1 { len } else { start + per_part };
            start..end
        })
        .collect()
}

/// Builds the blockset table at `db_path` from [`PARALLEL_SEED`] and returns
/// the records in shuffled order.
pub fn prepare_parallel(db_path: &Path, num_entries: u64) -> Result<Vec<BlocksetRecord>, BenchError> {
    let conn = open_database(db_path, &[])?;
    apply_pragmas(&conn, &["PRAGMA journal_mode = WAL;"])?;
    for ddl in [CREATE_HASHED_BLOCKSET_TABLE, CREATE_HASHED_BLOCKSET_INDEX] {
        conn.execute_batch(ddl)
            .with_context(|| format!("executing query: {ddl}"))?;
    }

    let started = Instant::now();
    let mut rng = seeded_rng(PARALLEL_SEED);
    let scope = TxnScope::begin(&conn, BeginMode::Deferred)?;
    let mut insert = conn
        .prepare(INSERT_HASHED_BLOCKSET)
        .context("prepare blockset insert")?;
    let mut records = Vec::with_capacity(num_entries as usize);
    for i in 0..num_entries {
        let record = BlocksetRecord::random(&mut rng, i as i64 + 1);
        insert
            .execute(params![record.id, record.length, record.full_hash])
            .with_context(|| format!("insert blockset {i}"))?;
        records.push(record);
    }
    drop(insert);
    scope.finish(Finish::Commit)?;
    optimize(&conn)?;
    records.shuffle(&mut rng);

    info!(
        entries = records.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "inserted entries"
    );
    Ok(records)
}

/// What one worker did.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerStats {
    pub worker: usize,
    pub ops: usize,
    pub elapsed: Duration,
}

/// Outcome of one parallelism level.
#[derive(Clone, Debug)]
pub struct ParallelRun {
    pub workers: usize,
    pub stats: Vec<WorkerStats>,
    /// Samples of every worker, concatenated in worker order.
    pub samples: Vec<u64>,
    pub elapsed: Duration,
}

impl ParallelRun {
    /// `parallel_select_p<workers>`
    pub fn report_name(&self) -> String {
        format!("parallel_select_p{}", self.workers)
    }

    /// Appends the concatenated samples; the row's repetition count is the
    /// number of lookups actually timed.
    pub fn report(&self, reporter: &Reporter, config: &RunConfig) -> Result<WrittenReport, BenchError> {
        let config = RunConfig {
            num_repetitions: self.samples.len() as u64,
            ..*config
        };
        reporter.append(&self.report_name(), &config, &self.samples)
    }
}

fn run_worker(
    db_path: &Path,
    config: &RunConfig,
    tuning: &ConnectionTuning,
    worker: usize,
    records: &[BlocksetRecord],
) -> Result<(WorkerStats, Vec<u64>), BenchError> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("worker {worker} open {}", db_path.display()))?;
    tuning.apply(&conn)?;
    let mut lookup = conn
        .prepare(SELECT_HASHED_BLOCKSET_ID)
        .with_context(|| format!("worker {worker} prepare lookup"))?;

    let measurement = Measurement {
        repetitions: records.len() as u64,
        ..Measurement::from_config(config)
    }
    .begin_with(BeginMode::Deferred)
    .commit_after_measurement(true);

    let started = Instant::now();
    let samples = run_timed(
        &conn,
        &measurement,
        |_, i| Ok(&records[(i % records.len() as u64) as usize]),
        |record, phase, i| {
            let found: Option<i64> = lookup
                .query_row(params![record.length, record.full_hash], |row| row.get(0))
                .optional()
                .with_context(|| format!("worker {worker} {} lookup {i}", phase.label()))?;
            let found = found.ok_or_else(|| {
                BenchError::mismatch(format!("worker {worker} ID check"), record.id, "no matching row")
            })?;
            expect_value(&record.id, &found, "parallel ID check")?;
            Ok(1)
        },
    )?;
    let stats = WorkerStats {
        worker,
        ops: samples.len(),
        elapsed: started.elapsed(),
    };
    info!(
        worker,
        ops = stats.ops,
        elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0,
        kops = stats.ops as f64 / stats.elapsed.as_secs_f64().max(f64::EPSILON) / 1000.0,
        "worker finished"
    );
    Ok((stats, samples))
}

/// Runs `workers` scoped threads over disjoint slices of `records`. Empty
/// slices (more workers than records) are skipped.
pub fn run_parallel(
    db_path: &Path,
    config: &RunConfig,
    records: &[BlocksetRecord],
    workers: usize,
    tuning: &ConnectionTuning,
) -> Result<ParallelRun, BenchError> {
    if workers == 0 {
        return Err(BenchError::invalid_input("at least one worker is required"));
    }
    info!(workers, entries = records.len(), "running parallel lookups");

    let started = Instant::now();
    let outcomes: Vec<Result<(WorkerStats, Vec<u64>), BenchError>> = thread::scope(|scope| {
        let handles: Vec<_> = partition(records.len(), workers)
            .into_iter()
            .enumerate()
            .filter(|(worker, range)| {
                if range.is_empty() {
                    warn!(worker, "no records assigned, worker skipped");
                }
                !range.is_empty()
            })
            .map(|(worker, range)| {
                let slice = &records[range];
                (
                    worker,
                    scope.spawn(move || run_worker(db_path, config, tuning, worker, slice)),
                )
            })
            .collect();
        handles
            .into_iter()
            .map(|(worker, handle)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(BenchError::worker(format!("worker {worker} panicked"))))
            })
            .collect()
    });
    let elapsed = started.elapsed();

    let mut stats = Vec::with_capacity(outcomes.len());
    let mut samples = Vec::with_capacity(records.len());
    for outcome in outcomes {
        let (worker_stats, worker_samples) = outcome?;
        stats.push(worker_stats);
        samples.extend(worker_samples);
    }

    let elapsed_ns = elapsed.as_nanos() as f64 / records.len().max(1) as f64;
    info!(
        workers,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        kops = kops(elapsed_ns),
        "parallel lookups finished"
    );
    Ok(ParallelRun {
        workers,
        stats,
        samples,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig {
            num_entries: 200,
            num_warmup: 10,
            num_repetitions: 0,
        }
    }

    #[test]
    fn test_partition_last_range_takes_remainder() {
        assert_eq!(partition(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(partition(8, 4), vec![0..2, 2..4, 4..6, 6..8]);
        assert_eq!(partition(2, 4), vec![0..0, 0..0, 0..0, 0..2]);
        assert!(partition(5, 0).is_empty());
    }

    #[test]
    fn test_prepare_shuffles_all_records() {
        let dir = tempfile::tempdir().unwrap();
        let records = prepare_parallel(&dir.path().join("parallel.sqlite"), 100).unwrap();
        assert_eq!(records.len(), 100);
        let mut ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_ne!(ids, (1..=100).collect::<Vec<_>>());
        ids.sort_unstable();
        assert_eq!(ids, (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_each_record_is_looked_up_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parallel.sqlite");
        let records = prepare_parallel(&path, 200).unwrap();
        for workers in [1, 3, 8] {
            let run =
                run_parallel(&path, &config(), &records, workers, &ConnectionTuning::default())
                    .unwrap();
            assert_eq!(run.samples.len(), 200);
            assert_eq!(run.stats.len(), workers);
            assert_eq!(run.stats.iter().map(|s| s.ops).sum::<usize>(), 200);
            assert_eq!(run.report_name(), format!("parallel_select_p{workers}"));
        }
    }

    #[test]
    fn test_wrong_record_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parallel.sqlite");
        let mut records = prepare_parallel(&path, 50).unwrap();
        records[7].id += 1000;
        let err = run_parallel(&path, &config(), &records, 2, &ConnectionTuning::default())
            .unwrap_err();
        assert!(err.is_mismatch());
    }

    #[test]
    fn test_report_counts_actual_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parallel.sqlite");
        let records = prepare_parallel(&path, 30).unwrap();
        let run = run_parallel(&path, &config(), &records, 2, &ConnectionTuning::default()).unwrap();
        let reporter = Reporter::new(dir.path().join("reports"));
        let written = run.report(&reporter, &config()).unwrap();
        assert_eq!(written.row.num_repetitions, 30);
        assert_eq!(written.name, "parallel_select_p2");
    }
}
