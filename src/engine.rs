//! Thin helpers over `rusqlite` for database lifecycle, directives,
//! transaction scopes and oracle checks.

use std::fmt::Display;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::{BenchError, ResultExt};

/// Database file used by the single-connection programs.
pub const DEFAULT_DB_PATH: &str = "benchmark.sqlite";

const SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

/// How a transaction scope is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeginMode {
    Default,
    Deferred,
}

impl BeginMode {
    fn sql(self) -> &'static str {
        match self {
            BeginMode::Default => "BEGIN TRANSACTION;",
            BeginMode::Deferred => "BEGIN DEFERRED TRANSACTION;",
        }
    }
}

/// How a transaction scope is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finish {
    Commit,
    Rollback,
}

impl Finish {
    fn sql(self) -> &'static str {
        match self {
            Finish::Commit => "COMMIT;",
            Finish::Rollback => "ROLLBACK;",
        }
    }
}

/// An open transaction issued as plain statement text.
///
/// Dropping the scope without calling [`TxnScope::finish`] rolls it back,
/// which is what happens when a measured call fails midway.
pub struct TxnScope<'c> {
    conn: &'c Connection,
    open: bool,
}

impl<'c> TxnScope<'c> {
    pub fn begin(conn: &'c Connection, mode: BeginMode) -> Result<Self, BenchError> {
        conn.execute_batch(mode.sql()).context(mode.sql())?;
        Ok(Self { conn, open: true })
    }

    pub fn finish(mut self, finish: Finish) -> Result<(), BenchError> {
        self.open = false;
        self.conn.execute_batch(finish.sql()).context(finish.sql())
    }
}

impl Drop for TxnScope<'_> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.conn.execute_batch(Finish::Rollback.sql());
        }
    }
}

fn sidecar_paths(path: &Path) -> Vec<PathBuf> {
    SIDECAR_SUFFIXES
        .iter()
        .map(|suffix| {
            let mut name = path.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        })
        .collect()
}

/// Deletes the database file and its WAL/SHM sidecars when present.
pub fn remove_database_files(path: &Path) -> Result<(), BenchError> {
    let mut targets = vec![path.to_path_buf()];
    targets.extend(sidecar_paths(path));
    for target in targets {
        match fs::remove_file(&target) {
            Ok(()) => debug!(path = %target.display(), "removed database file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Starts from an empty database file and creates the given tables.
pub fn open_database<P: AsRef<Path>>(path: P, ddl: &[&str]) -> Result<Connection, BenchError> {
    let path = path.as_ref();
    info!(path = %path.display(), "deleting database file");
    remove_database_files(path)?;
    info!(path = %path.display(), "creating database file");
    let conn = Connection::open(path).context(format!("open {}", path.display()))?;
    create_tables(&conn, ddl)?;
    Ok(conn)
}

/// In-memory counterpart of [`open_database`].
pub fn open_in_memory(ddl: &[&str]) -> Result<Connection, BenchError> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    create_tables(&conn, ddl)?;
    Ok(conn)
}

fn create_tables(conn: &Connection, ddl: &[&str]) -> Result<(), BenchError> {
    for statement in ddl {
        conn.execute_batch(statement)
            .context(format!("executing query: {statement}"))?;
    }
    Ok(())
}

/// Executes directive statements; directives that answer with a row
/// (`journal_mode`, `mmap_size`, ...) are accepted.
pub fn apply_pragmas<S: AsRef<str>>(conn: &Connection, statements: &[S]) -> Result<(), BenchError> {
    for statement in statements {
        let statement = statement.as_ref();
        match conn.execute(statement, []) {
            Ok(_) | Err(rusqlite::Error::ExecuteReturnedResults) => {
                debug!(statement, "applied directive");
            }
            Err(e) => return Err(BenchError::engine(statement, e)),
        }
    }
    Ok(())
}

/// `PRAGMA optimize;` after a bulk fill.
pub fn optimize(conn: &Connection) -> Result<(), BenchError> {
    apply_pragmas(conn, &["PRAGMA optimize;"])
}

/// Oracle check: a value read back from the engine must equal the
/// independently tracked one.
pub fn expect_value<T>(expected: &T, actual: &T, context: &str) -> Result<(), BenchError>
where
    T: PartialEq + Display + ?Sized,
{
    if expected != actual {
        return Err(BenchError::mismatch(context, expected, actual));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_database_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.sqlite");
        {
            let conn = open_database(&path, &["CREATE TABLE T(ID INTEGER PRIMARY KEY);"]).unwrap();
            conn.execute("INSERT INTO T(ID) VALUES (1)", []).unwrap();
        }
        let conn = open_database(&path, &["CREATE TABLE T(ID INTEGER PRIMARY KEY);"]).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM T", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_remove_database_files_deletes_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.sqlite");
        for p in [&path]
            .into_iter()
            .cloned()
            .chain(sidecar_paths(&path))
        {
            fs::write(&p, b"x").unwrap();
        }
        remove_database_files(&path).unwrap();
        assert!(!path.exists());
        assert!(sidecar_paths(&path).iter().all(|p| !p.exists()));
        remove_database_files(&path).unwrap();
    }

    #[test]
    fn test_dropped_scope_rolls_back() {
        let conn = open_in_memory(&["CREATE TABLE T(ID INTEGER PRIMARY KEY);"]).unwrap();
        {
            let _scope = TxnScope::begin(&conn, BeginMode::Default).unwrap();
            conn.execute("INSERT INTO T(ID) VALUES (1)", []).unwrap();
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM T", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_commit_persists() {
        let conn = open_in_memory(&["CREATE TABLE T(ID INTEGER PRIMARY KEY);"]).unwrap();
        let scope = TxnScope::begin(&conn, BeginMode::Deferred).unwrap();
        conn.execute("INSERT INTO T(ID) VALUES (1)", []).unwrap();
        scope.finish(Finish::Commit).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM T", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_apply_pragmas_accepts_row_returning_directives() {
        let conn = open_in_memory(&[]).unwrap();
        apply_pragmas(&conn, &["PRAGMA journal_mode = MEMORY;", "PRAGMA cache_size = -2000;"])
            .unwrap();
        let err = apply_pragmas(&conn, &["PRAGMA nonsense syntax here"]).unwrap_err();
        assert!(matches!(err, BenchError::Engine { .. }));
    }

    #[test]
    fn test_expect_value() {
        assert!(expect_value(&3u64, &3u64, "id").is_ok());
        assert!(expect_value("abc", "abd", "hash").unwrap_err().is_mismatch());
    }
}
