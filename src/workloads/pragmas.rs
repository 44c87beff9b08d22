//! Engine directive comparison over the `Block` / `Blockset` /
//! `BlocksetEntry` schema.
//!
//! The database is filled once; every [`PragmaSet`] then opens its own
//! connection, applies its directives and runs each [`PragmaMeasure`] in
//! turn. Every measure rolls back, so all sets observe the same fill.

use std::path::Path;
use std::time::Instant;

use rand::{Rng, rngs::StdRng};
use rusqlite::{Connection, OptionalExtension, Statement, params};
use tracing::info;

use crate::config::{PragmaSet, RunConfig};
use crate::engine::{BeginMode, Finish, TxnScope, apply_pragmas, expect_value, open_database, optimize};
use crate::entries::{BlockEntry, BlocksetIndex, EntryPicker, FILL_SEED, MEASURE_SEED, seeded_rng};
use crate::errors::{BenchError, ResultExt};
use crate::report::{Reporter, WrittenReport};
use crate::runner::{Measurement, run_timed};
use crate::schema::{
    CREATE_BLOCK_TABLE, INSERT_BLOCK, INSERT_BLOCK_AUTO_ID, INSERT_BLOCKSET, INSERT_BLOCKSET_ENTRY,
    INSERT_OPEN_BLOCKSET, INSERT_OR_IGNORE_BLOCK, PRAGMA_PROGRAM_INDEXES, SELECT_BLOCK_ALL,
    SELECT_BLOCK_ID, SELECT_BLOCK_ID_PAREN, SELECT_BLOCKSET_MEMBERS, UPDATE_BLOCKSET_LENGTH,
    block_tables,
};

/// A blockset is closed after an entry when `rng % 1000` exceeds this.
const BLOCKSET_CLOSE_THRESHOLD: u32 = 995;
/// Chance, in percent, that the blockset measure opens a new blockset.
const NEW_BLOCKSET_PERCENT: u32 = 10;

/// The measures run for every directive set, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PragmaMeasure {
    Insert,
    Select,
    Xor1,
    Xor2,
    Join,
    Blockset,
}

impl PragmaMeasure {
    pub const ALL: [PragmaMeasure; 6] = [
        PragmaMeasure::Insert,
        PragmaMeasure::Select,
        PragmaMeasure::Xor1,
        PragmaMeasure::Xor2,
        PragmaMeasure::Join,
        PragmaMeasure::Blockset,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PragmaMeasure::Insert => "insert",
            PragmaMeasure::Select => "select",
            PragmaMeasure::Xor1 => "xor1",
            PragmaMeasure::Xor2 => "xor2",
            PragmaMeasure::Join => "join",
            PragmaMeasure::Blockset => "blockset",
        }
    }

    /// `pragmas_<measure>_<set>`
    pub fn report_name(self, set: &str) -> String {
        format!("pragmas_{}_{}", self.label(), set)
    }

    pub fn run(
        self,
        conn: &Connection,
        config: &RunConfig,
        rng: &mut StdRng,
        entries: &[BlockEntry],
    ) -> Result<Vec<u64>, BenchError> {
        match self {
            PragmaMeasure::Insert => measure_insert(conn, config, rng, entries),
            PragmaMeasure::Select => measure_select(conn, config, rng, entries),
            PragmaMeasure::Xor1 => measure_xor1(conn, config, rng, entries),
            PragmaMeasure::Xor2 => measure_xor2(conn, config, rng, entries),
            PragmaMeasure::Join => measure_join(conn, config, rng, entries),
            PragmaMeasure::Blockset => measure_new_blockset(conn, config, rng, entries),
        }
    }
}

/// Inserts `num_entries` blocks with ids `0..num_entries`, grouping them into
/// blocksets numbered from 1, and commits.
pub fn fill(
    conn: &Connection,
    rng: &mut StdRng,
    num_entries: u64,
) -> Result<Vec<BlockEntry>, BenchError> {
    let started = Instant::now();
    let scope = TxnScope::begin(conn, BeginMode::Default)?;
    let mut insert_block = conn.prepare(INSERT_BLOCK).context("prepare fill block")?;
    let mut insert_blockset = conn.prepare(INSERT_BLOCKSET).context("prepare fill blockset")?;
    let mut insert_member = conn
        .prepare(INSERT_BLOCKSET_ENTRY)
        .context("prepare fill blockset entry")?;

    let mut entries = Vec::with_capacity(num_entries as usize);
    let mut blockset_id = 1i64;
    let mut blockset_len = 0i64;
    for i in 0..num_entries {
        let entry = BlockEntry::random(rng, i as i64, blockset_id);
        insert_block
            .execute(params![entry.id, entry.hash, entry.size])
            .with_context(|| format!("insert entry {i}"))?;
        insert_member
            .execute(params![blockset_id, entry.id])
            .with_context(|| format!("insert BlocksetEntry for entry {i}"))?;
        entries.push(entry);
        blockset_len += 1;

        if rng.gen_range(0..1000u32) > BLOCKSET_CLOSE_THRESHOLD {
            insert_blockset
                .execute(params![blockset_id, blockset_len])
                .with_context(|| format!("insert Blockset for entry {i}"))?;
            blockset_id += 1;
            blockset_len = 0;
        }
    }
    if blockset_len > 0 {
        insert_blockset
            .execute(params![blockset_id, blockset_len])
            .with_context(|| format!("insert Blockset {blockset_id}"))?;
    } else {
        blockset_id -= 1;
    }
    drop((insert_block, insert_blockset, insert_member));
    scope.finish(Finish::Commit)?;
    optimize(conn)?;

    info!(
        entries = entries.len(),
        blocksets = blockset_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "inserted entries"
    );
    Ok(entries)
}

/// Creates the schema and indexes at `db_path` and fills it from
/// [`FILL_SEED`]. The connection is closed before returning.
pub fn prepare_pragmas(db_path: &Path, config: &RunConfig) -> Result<Vec<BlockEntry>, BenchError> {
    let conn = open_database(db_path, &block_tables(CREATE_BLOCK_TABLE))?;
    for index in PRAGMA_PROGRAM_INDEXES {
        conn.execute_batch(index)
            .with_context(|| format!("executing query: {index}"))?;
    }
    let mut rng = seeded_rng(FILL_SEED);
    fill(&conn, &mut rng, config.num_entries)
}

/// Runs every [`PragmaMeasure`] under `set` on a fresh connection to the
/// filled database, appending one report row after each.
pub fn measure_all(
    db_path: &Path,
    config: &RunConfig,
    set: &PragmaSet,
    entries: &[BlockEntry],
    reporter: &Reporter,
) -> Result<Vec<WrittenReport>, BenchError> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("open {}", db_path.display()))?;
    apply_pragmas(&conn, &set.statements)?;
    info!(set = %set.name, directives = set.statements.len(), "measuring directive set");

    let mut rng = seeded_rng(MEASURE_SEED);
    let mut written = Vec::with_capacity(PragmaMeasure::ALL.len());
    for measure in PragmaMeasure::ALL {
        let samples = measure.run(&conn, config, &mut rng, entries)?;
        written.push(reporter.append(&measure.report_name(&set.name), config, &samples)?);
    }
    Ok(written)
}

fn find_block(stmt: &mut Statement<'_>, entry: &BlockEntry) -> rusqlite::Result<Option<i64>> {
    stmt.query_row(params![entry.hash, entry.size], |row| row.get(0))
        .optional()
}

pub fn measure_insert(
    conn: &Connection,
    config: &RunConfig,
    rng: &mut StdRng,
    entries: &[BlockEntry],
) -> Result<Vec<u64>, BenchError> {
    let mut insert = conn.prepare(INSERT_BLOCK).context("prepare insert statement")?;
    let mut picker = EntryPicker::new(entries, 100, config.num_entries as i64);
    run_timed(
        conn,
        &Measurement::from_config(config),
        |phase, i| Ok(picker.pick(rng, phase, i)),
        |entry, phase, i| {
            insert
                .execute(params![entry.id, entry.hash, entry.size])
                .with_context(|| format!("{} insert {i}", phase.label()))?;
            Ok(1)
        },
    )
}

pub fn measure_select(
    conn: &Connection,
    config: &RunConfig,
    rng: &mut StdRng,
    entries: &[BlockEntry],
) -> Result<Vec<u64>, BenchError> {
    let mut select = conn.prepare(SELECT_BLOCK_ID).context("prepare select statement")?;
    let mut picker = EntryPicker::new(entries, 0, config.num_entries as i64);
    run_timed(
        conn,
        &Measurement::from_config(config),
        |phase, i| Ok(picker.pick(rng, phase, i)),
        |entry, phase, i| {
            let found = find_block(&mut select, entry)
                .with_context(|| format!("{} query execution {i}", phase.label()))?
                .ok_or_else(|| BenchError::mismatch("select ID check", entry.id, "no matching row"))?;
            expect_value(&entry.id, &found, "select ID check")?;
            Ok(1)
        },
    )
}

/// Select, then insert only when the block is absent.
pub fn measure_xor1(
    conn: &Connection,
    config: &RunConfig,
    rng: &mut StdRng,
    entries: &[BlockEntry],
) -> Result<Vec<u64>, BenchError> {
    let mut select = conn
        .prepare(SELECT_BLOCK_ID_PAREN)
        .context("prepare xor select statement")?;
    let mut insert = conn.prepare(INSERT_BLOCK).context("prepare xor insert statement")?;
    let mut picker = EntryPicker::new(entries, 50, config.num_entries as i64);
    run_timed(
        conn,
        &Measurement::from_config(config),
        |phase, i| Ok(picker.pick(rng, phase, i)),
        |entry, phase, i| {
            let found = find_block(&mut select, entry)
                .with_context(|| format!("{} xor1 query execution {i}", phase.label()))?;
            match found {
                Some(id) => expect_value(&entry.id, &id, "xor1 ID check")?,
                None => {
                    insert
                        .execute(params![entry.id, entry.hash, entry.size])
                        .with_context(|| format!("{} xor1 insert {i}", phase.label()))?;
                }
            }
            Ok(1)
        },
    )
}

/// `INSERT OR IGNORE`, then read the row back.
pub fn measure_xor2(
    conn: &Connection,
    config: &RunConfig,
    rng: &mut StdRng,
    entries: &[BlockEntry],
) -> Result<Vec<u64>, BenchError> {
    let mut insert = conn
        .prepare(INSERT_OR_IGNORE_BLOCK)
        .context("prepare xor2 insert statement")?;
    let mut select = conn
        .prepare(SELECT_BLOCK_ALL)
        .context("prepare xor2 select statement")?;
    let mut picker = EntryPicker::new(entries, 50, config.num_entries as i64);
    run_timed(
        conn,
        &Measurement::from_config(config),
        |phase, i| Ok(picker.pick(rng, phase, i)),
        |entry, phase, i| {
            insert
                .execute(params![entry.id, entry.hash, entry.size])
                .with_context(|| format!("{} xor2 insert query execution {i}", phase.label()))?;
            let found = find_block(&mut select, entry)
                .with_context(|| format!("{} xor2 select query execution {i}", phase.label()))?
                .ok_or_else(|| BenchError::mismatch("xor2 ID check", entry.id, "no matching row"))?;
            expect_value(&entry.id, &found, "xor2 ID check")?;
            Ok(1)
        },
    )
}

/// Reads every member of a random blockset. Samples are per returned row
/// and the run stops once `num_repetitions` rows have been read.
pub fn measure_join(
    conn: &Connection,
    config: &RunConfig,
    rng: &mut StdRng,
    entries: &[BlockEntry],
) -> Result<Vec<u64>, BenchError> {
    let mut join = conn
        .prepare(SELECT_BLOCKSET_MEMBERS)
        .context("prepare join statement")?;
    let index = BlocksetIndex::build(entries);
    if index.max_id() < 1 {
        return Err(BenchError::invalid_input("join needs at least one filled blockset"));
    }
    run_timed(
        conn,
        &Measurement::from_config(config).until_rows(),
        |_, _| {
            let blockset_id = index.random_id(rng);
            Ok((blockset_id, index.count(blockset_id)))
        },
        |&(blockset_id, expected_count), phase, _| {
            let mut rows = join
                .query([blockset_id])
                .with_context(|| format!("{} join query", phase.label()))?;
            let mut count = 0u64;
            while let Some(row) = rows.next().context("join step")? {
                let found_id: i64 = row.get(0).context("join Block.ID")?;
                let found_hash: String = row.get(1).context("join Block.Hash")?;
                let found_size: i64 = row.get(2).context("join Block.Size")?;
                let entry = usize::try_from(found_id)
                    .ok()
                    .and_then(|idx| entries.get(idx))
                    .filter(|entry| entry.id == found_id)
                    .ok_or_else(|| BenchError::mismatch("Block ID check", "a filled block", found_id))?;
                expect_value(entry.hash.as_str(), found_hash.as_str(), "Hash check")?;
                expect_value(&entry.size, &found_size, "Size check")?;
                expect_value(&entry.blockset_id, &blockset_id, "Blockset ID check")?;
                count += 1;
            }
            expect_value(&expected_count, &count, "Blockset count check")?;
            Ok(count)
        },
    )
}

fn open_blockset(stmt: &mut Statement<'_>, conn: &Connection) -> Result<i64, BenchError> {
    stmt.execute([]).context("insert blockset")?;
    Ok(conn.last_insert_rowid())
}

/// Appends blocks to an open blockset: look the block up, insert it when
/// absent, link it and bump the blockset length. Opening a new blockset is
/// bookkeeping done before the clock starts.
pub fn measure_new_blockset(
    conn: &Connection,
    config: &RunConfig,
    rng: &mut StdRng,
    entries: &[BlockEntry],
) -> Result<Vec<u64>, BenchError> {
    let mut start_blockset = conn
        .prepare(INSERT_OPEN_BLOCKSET)
        .context("prepare start blockset statement")?;
    let mut check_block = conn
        .prepare(SELECT_BLOCK_ID)
        .context("prepare check block statement")?;
    let mut insert_block = conn
        .prepare(INSERT_BLOCK_AUTO_ID)
        .context("prepare insert block statement")?;
    let mut insert_member = conn
        .prepare(INSERT_BLOCKSET_ENTRY)
        .context("prepare insert blockset entry statement")?;
    let mut grow_blockset = conn
        .prepare(UPDATE_BLOCKSET_LENGTH)
        .context("prepare update blockset statement")?;

    let mut picker = EntryPicker::new(entries, 50, config.num_entries as i64).random_reuse();
    let mut blockset_id = 0i64;
    run_timed(
        conn,
        &Measurement::from_config(config),
        |phase, i| {
            if i == 0 || rng.gen_range(0..100u32) < NEW_BLOCKSET_PERCENT {
                blockset_id = open_blockset(&mut start_blockset, conn)?;
            }
            let mut entry = picker.pick(rng, phase, i).into_owned();
            entry.blockset_id = blockset_id;
            Ok(entry)
        },
        |entry, phase, _| {
            let block_id = match find_block(&mut check_block, entry)
                .with_context(|| format!("{} check block", phase.label()))?
            {
                Some(id) => id,
                None => {
                    insert_block
                        .execute(params![entry.hash, entry.size])
                        .with_context(|| format!("{} insert block", phase.label()))?;
                    conn.last_insert_rowid()
                }
            };
            insert_member
                .execute(params![entry.blockset_id, block_id])
                .with_context(|| format!("{} insert blockset entry", phase.label()))?;
            grow_blockset
                .execute([entry.blockset_id])
                .with_context(|| format!("{} update blockset", phase.label()))?;
            Ok(1)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::open_in_memory;

    fn filled(num_entries: u64) -> (Connection, Vec<BlockEntry>) {
        let conn = open_in_memory(&block_tables(CREATE_BLOCK_TABLE)).unwrap();
        for index in PRAGMA_PROGRAM_INDEXES {
            conn.execute_batch(index).unwrap();
        }
        let mut rng = seeded_rng(FILL_SEED);
        let entries = fill(&conn, &mut rng, num_entries).unwrap();
        (conn, entries)
    }

    fn config(num_entries: u64) -> RunConfig {
        RunConfig {
            num_entries,
            num_warmup: 20,
            num_repetitions: 50,
        }
    }

    fn block_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM Block", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_fill_links_every_block_to_a_blockset() {
        let (conn, entries) = filled(2000);
        assert_eq!(entries.len(), 2000);
        assert!(entries.iter().enumerate().all(|(i, e)| e.id == i as i64));
        let members: i64 = conn
            .query_row("SELECT COUNT(*) FROM BlocksetEntry", [], |row| row.get(0))
            .unwrap();
        assert_eq!(members, 2000);
        let total_length: i64 = conn
            .query_row("SELECT SUM(Length) FROM Blockset", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total_length, 2000);
        let blocksets: i64 = conn
            .query_row("SELECT COUNT(*) FROM Blockset", [], |row| row.get(0))
            .unwrap();
        assert_eq!(blocksets, BlocksetIndex::build(&entries).max_id());
    }

    #[test]
    fn test_every_measure_rolls_back() {
        let (conn, entries) = filled(500);
        let mut rng = seeded_rng(MEASURE_SEED);
        for measure in PragmaMeasure::ALL {
            let samples = measure.run(&conn, &config(500), &mut rng, &entries).unwrap();
            assert!(!samples.is_empty(), "{} produced no samples", measure.label());
            assert_eq!(block_count(&conn), 500, "{} left rows behind", measure.label());
        }
    }

    #[test]
    fn test_call_budget_measures_sample_each_repetition() {
        let (conn, entries) = filled(300);
        let mut rng = seeded_rng(MEASURE_SEED);
        let samples = measure_select(&conn, &config(300), &mut rng, &entries).unwrap();
        assert_eq!(samples.len(), 50);
    }

    #[test]
    fn test_join_samples_until_row_budget() {
        let (conn, entries) = filled(300);
        let mut rng = seeded_rng(MEASURE_SEED);
        let samples = measure_join(&conn, &config(300), &mut rng, &entries).unwrap();
        assert!(!samples.is_empty());
        assert!(samples.len() <= 50);
    }

    #[test]
    fn test_select_detects_corrupted_id() {
        let (conn, entries) = filled(100);
        conn.execute("UPDATE Block SET ID = ID + 100000", []).unwrap();
        let mut rng = seeded_rng(MEASURE_SEED);
        let err = measure_select(&conn, &config(100), &mut rng, &entries).unwrap_err();
        assert!(err.is_mismatch());
    }

    #[test]
    fn test_report_names() {
        assert_eq!(PragmaMeasure::Xor1.report_name("journal_wal"), "pragmas_xor1_journal_wal");
        assert_eq!(
            PragmaMeasure::Blockset.report_name("combination"),
            "pragmas_blockset_combination"
        );
    }
}
