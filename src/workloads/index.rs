//! Index and key-layout comparison.
//!
//! For each index variant the database is rebuilt from scratch, filled,
//! and measured twice: keyed inserts past the filled id range (rolled back)
//! and point lookups of existing blocks (committed). A lookup may bind only
//! part of the key, so rows are scanned until one matches the whole key.

use std::path::Path;

use rand::{Rng, rngs::StdRng};
use rusqlite::{Connection, Row, Statement, params};
use tracing::info;

use crate::config::RunConfig;
use crate::engine::{BeginMode, Finish, TxnScope, expect_value, open_database};
use crate::entries::{BlobBlockEntry, BlockEntry, FILL_SEED, SplitBlockEntry, seeded_rng};
use crate::errors::{BenchError, ResultExt};
use crate::report::{Reporter, WrittenReport};
use crate::runner::{Measurement, run_timed};
use crate::schema::{
    BlobIndex, CREATE_BLOCK_TABLE, CREATE_SPLIT_BLOCK_TABLE, INSERT_BLOCK, INSERT_SPLIT_BLOCK,
    KeyColumn, SplitIndex, TextIndex, block_tables,
};

/// A Block layout plus one index over it.
pub trait IndexVariant: Copy {
    type Entry;

    /// Report prefix naming the layout.
    const LAYOUT: &'static str;

    fn create_table(self) -> &'static str;
    fn insert_statement(self) -> &'static str;
    fn create_index(self) -> &'static str;
    fn lookup(self) -> &'static str;
    fn suffix(self) -> &'static str;

    fn random_entry(rng: &mut StdRng, id: i64) -> Self::Entry;
    fn entry_id(entry: &Self::Entry) -> i64;
    fn insert(self, stmt: &mut Statement<'_>, entry: &Self::Entry) -> rusqlite::Result<usize>;

    /// Binds the lookup parameters this index can serve.
    fn bind_lookup(self, stmt: &mut Statement<'_>, entry: &Self::Entry) -> rusqlite::Result<()>;

    /// The row id when `row` carries the whole key of `entry`.
    fn matching_id(self, row: &Row<'_>, entry: &Self::Entry) -> rusqlite::Result<Option<i64>>;

    fn insert_report(self) -> String {
        format!("{}_insert_index_{}", Self::LAYOUT, self.suffix())
    }

    fn select_report(self) -> String {
        format!("{}_select_index_{}", Self::LAYOUT, self.suffix())
    }
}

impl IndexVariant for TextIndex {
    type Entry = BlockEntry;

    const LAYOUT: &'static str = "index_text";

    fn create_table(self) -> &'static str {
        CREATE_BLOCK_TABLE
    }

    fn insert_statement(self) -> &'static str {
        INSERT_BLOCK
    }

    fn create_index(self) -> &'static str {
        TextIndex::create_index(self)
    }

    fn lookup(self) -> &'static str {
        TextIndex::lookup(self)
    }

    fn suffix(self) -> &'static str {
        TextIndex::suffix(self)
    }

    fn random_entry(rng: &mut StdRng, id: i64) -> BlockEntry {
        BlockEntry::random(rng, id, 0)
    }

    fn entry_id(entry: &BlockEntry) -> i64 {
        entry.id
    }

    fn insert(self, stmt: &mut Statement<'_>, entry: &BlockEntry) -> rusqlite::Result<usize> {
        stmt.execute(params![entry.id, entry.hash, entry.size])
    }

    fn bind_lookup(self, stmt: &mut Statement<'_>, entry: &BlockEntry) -> rusqlite::Result<()> {
        for (pos, column) in self.bound().iter().enumerate() {
            match column {
                KeyColumn::Hash => stmt.raw_bind_parameter(pos + 1, entry.hash.as_str())?,
                KeyColumn::Size => stmt.raw_bind_parameter(pos + 1, entry.size)?,
            }
        }
        Ok(())
    }

    fn matching_id(self, row: &Row<'_>, entry: &BlockEntry) -> rusqlite::Result<Option<i64>> {
        let hash: String = row.get(1)?;
        let size: i64 = row.get(2)?;
        if hash == entry.hash && size == entry.size {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }
}

impl IndexVariant for SplitIndex {
    type Entry = SplitBlockEntry;

    const LAYOUT: &'static str = "index_split";

    fn create_table(self) -> &'static str {
        CREATE_SPLIT_BLOCK_TABLE
    }

    fn insert_statement(self) -> &'static str {
        INSERT_SPLIT_BLOCK
    }

    fn create_index(self) -> &'static str {
        SplitIndex::create_index(self)
    }

    fn lookup(self) -> &'static str {
        SplitIndex::lookup(self)
    }

    fn suffix(self) -> &'static str {
        SplitIndex::suffix(self)
    }

    fn random_entry(rng: &mut StdRng, id: i64) -> SplitBlockEntry {
        SplitBlockEntry::random(rng, id)
    }

    fn entry_id(entry: &SplitBlockEntry) -> i64 {
        entry.id
    }

    fn insert(self, stmt: &mut Statement<'_>, entry: &SplitBlockEntry) -> rusqlite::Result<usize> {
        let [h0, h1, h2, h3] = entry.hash;
        stmt.execute(params![entry.id, h0, h1, h2, h3, entry.size])
    }

    fn bind_lookup(self, stmt: &mut Statement<'_>, entry: &SplitBlockEntry) -> rusqlite::Result<()> {
        let [h0, h1, h2, h3] = entry.hash;
        match self {
            SplitIndex::Normal => {
                stmt.raw_bind_parameter(1, h0)?;
                stmt.raw_bind_parameter(2, h1)?;
                stmt.raw_bind_parameter(3, h2)?;
                stmt.raw_bind_parameter(4, h3)?;
                stmt.raw_bind_parameter(5, entry.size)?;
            }
            SplitIndex::H0 => stmt.raw_bind_parameter(1, h0)?,
            SplitIndex::H0Size => {
                stmt.raw_bind_parameter(1, h0)?;
                stmt.raw_bind_parameter(2, entry.size)?;
            }
            SplitIndex::Size => stmt.raw_bind_parameter(1, entry.size)?,
        }
        Ok(())
    }

    fn matching_id(self, row: &Row<'_>, entry: &SplitBlockEntry) -> rusqlite::Result<Option<i64>> {
        let hash: [i64; 4] = [row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?];
        let size: i64 = row.get(5)?;
        if hash == entry.hash && size == entry.size {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }
}

impl IndexVariant for BlobIndex {
    type Entry = BlobBlockEntry;

    const LAYOUT: &'static str = "index_blob";

    fn create_table(self) -> &'static str {
        BlobIndex::create_table(self)
    }

    fn insert_statement(self) -> &'static str {
        BlobIndex::insert(self)
    }

    fn create_index(self) -> &'static str {
        BlobIndex::create_index(self)
    }

    fn lookup(self) -> &'static str {
        BlobIndex::lookup(self)
    }

    fn suffix(self) -> &'static str {
        BlobIndex::suffix(self)
    }

    fn random_entry(rng: &mut StdRng, id: i64) -> BlobBlockEntry {
        BlobBlockEntry::random(rng, id)
    }

    fn entry_id(entry: &BlobBlockEntry) -> i64 {
        entry.id
    }

    fn insert(self, stmt: &mut Statement<'_>, entry: &BlobBlockEntry) -> rusqlite::Result<usize> {
        match self {
            BlobIndex::Blob => stmt.execute(params![entry.id, &entry.packed_key()[..]]),
            BlobIndex::BlobInt => stmt.execute(params![
                entry.id,
                entry.first_hash(),
                &entry.tail_key()[..]
            ]),
        }
    }

    fn bind_lookup(self, stmt: &mut Statement<'_>, entry: &BlobBlockEntry) -> rusqlite::Result<()> {
        match self {
            BlobIndex::Blob => stmt.raw_bind_parameter(1, &entry.packed_key()[..]),
            BlobIndex::BlobInt => stmt.raw_bind_parameter(1, entry.first_hash()),
        }
    }

    fn matching_id(self, row: &Row<'_>, entry: &BlobBlockEntry) -> rusqlite::Result<Option<i64>> {
        let stored: Vec<u8> = row.get(1)?;
        let matches = match self {
            BlobIndex::Blob => stored[..] == entry.packed_key()[..],
            BlobIndex::BlobInt => stored[..] == entry.tail_key()[..],
        };
        if matches { Ok(Some(row.get(0)?)) } else { Ok(None) }
    }
}

/// Inserts `num_entries` blocks with ids `1..=num_entries` and commits.
pub fn fill<V: IndexVariant>(
    conn: &Connection,
    variant: V,
    rng: &mut StdRng,
    num_entries: u64,
) -> Result<Vec<V::Entry>, BenchError> {
    let scope = TxnScope::begin(conn, BeginMode::Default)?;
    let mut insert = conn
        .prepare(variant.insert_statement())
        .context("prepare fill insert")?;
    let mut entries = Vec::with_capacity(num_entries as usize);
    for i in 0..num_entries {
        let entry = V::random_entry(rng, i as i64 + 1);
        variant
            .insert(&mut insert, &entry)
            .with_context(|| format!("insert entry {i}"))?;
        entries.push(entry);
    }
    drop(insert);
    scope.finish(Finish::Commit)?;
    Ok(entries)
}

/// Inserts fresh blocks with ids after the filled range; rolled back.
pub fn measure_insert<V: IndexVariant>(
    conn: &Connection,
    config: &RunConfig,
    variant: V,
    rng: &mut StdRng,
) -> Result<Vec<u64>, BenchError> {
    let mut insert = conn
        .prepare(variant.insert_statement())
        .context("prepare insert statement")?;
    let first_id = config.num_entries as i64 + 1;
    run_timed(
        conn,
        &Measurement::from_config(config),
        |_, i| Ok(V::random_entry(rng, first_id + i as i64)),
        |entry, phase, i| {
            variant
                .insert(&mut insert, entry)
                .with_context(|| format!("{} insert {i}", phase.label()))?;
            Ok(1)
        },
    )
}

/// Looks up random filled blocks through `variant`'s index; committed.
pub fn measure_select<V: IndexVariant>(
    conn: &Connection,
    config: &RunConfig,
    variant: V,
    rng: &mut StdRng,
    entries: &[V::Entry],
) -> Result<Vec<u64>, BenchError> {
    if entries.is_empty() {
        return Err(BenchError::invalid_input("lookup needs at least one filled entry"));
    }
    let mut lookup = conn.prepare(variant.lookup()).context("prepare select statement")?;
    run_timed(
        conn,
        &Measurement::from_config(config).commit_after_measurement(true),
        |_, _| Ok(&entries[rng.gen_range(0..entries.len())]),
        |entry, phase, i| {
            variant
                .bind_lookup(&mut lookup, entry)
                .with_context(|| format!("{} bind {i}", phase.label()))?;
            let mut rows = lookup.raw_query();
            let mut found = None;
            while let Some(row) = rows
                .next()
                .with_context(|| format!("{} query execution {i}", phase.label()))?
            {
                found = variant.matching_id(row, entry).context("read Block row")?;
                if found.is_some() {
                    break;
                }
            }
            let expected = V::entry_id(entry);
            let found = found.ok_or_else(|| BenchError::mismatch("ID check", expected, "no matching row"))?;
            expect_value(&expected, &found, "ID check")?;
            Ok(1)
        },
    )
}

/// One index variant end to end: fresh database, index, fill, insert
/// measure and lookup measure, each reported as it finishes.
pub fn run_index_program<V: IndexVariant>(
    db_path: &Path,
    config: &RunConfig,
    variant: V,
    reporter: &Reporter,
) -> Result<Vec<WrittenReport>, BenchError> {
    let conn = open_database(db_path, &block_tables(variant.create_table()))?;
    conn.execute_batch(variant.create_index())
        .with_context(|| format!("executing query: {}", variant.create_index()))?;
    info!(layout = V::LAYOUT, index = variant.suffix(), "measuring index variant");

    let mut rng = seeded_rng(FILL_SEED);
    let entries = fill(&conn, variant, &mut rng, config.num_entries)?;

    let inserts = measure_insert(&conn, config, variant, &mut rng)?;
    let insert_report = reporter.append(&variant.insert_report(), config, &inserts)?;
    let selects = measure_select(&conn, config, variant, &mut rng, &entries)?;
    let select_report = reporter.append(&variant.select_report(), config, &selects)?;
    Ok(vec![insert_report, select_report])
}
