//! Run configuration and engine tuning for the benchmark programs.
//!
//! This module holds the per-invocation [`RunConfig`], the catalog of
//! engine directive sets measured by the pragma program, the per-worker
//! tuning applied by the parallel program, and the environment overrides
//! shared by every program.

use std::env;
use std::path::PathBuf;

use rusqlite::Connection;

use crate::engine::apply_pragmas;
use crate::errors::BenchError;

/// Directory the reports land in unless overridden.
pub const DEFAULT_REPORTS_DIR: &str = "reports";
/// Overrides [`DEFAULT_REPORTS_DIR`].
pub const REPORTS_DIR_ENV: &str = "SQLITEBENCH_REPORTS_DIR";
/// Comma separated pragma variant names, or `all`.
pub const PRAGMAS_ENV: &str = "SQLITEBENCH_PRAGMAS";
/// Comma separated worker counts for the parallel program.
pub const THREADS_ENV: &str = "SQLITEBENCH_THREADS";

/// Sizes of one benchmark invocation.
///
/// Parsed once from the command line and never mutated afterwards.
///
/// # Default Configuration
///
/// ```rust
/// use sqlitebench::RunConfig;
/// let config = RunConfig::default();
/// assert_eq!(config.num_entries, 100_000);
/// assert_eq!(config.num_warmup, 1_000);
/// assert_eq!(config.num_repetitions, 10_000);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Rows pre-filled before anything is measured.
    pub num_entries: u64,
    /// Untimed calls run before the measured phase.
    pub num_warmup: u64,
    /// Timed calls; one duration sample each.
    pub num_repetitions: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_entries: 100_000,
            num_warmup: 1_000,
            num_repetitions: 10_000,
        }
    }
}

/// A named list of engine directive statements applied after the fill.
///
/// The name becomes the suffix of every report produced under it, e.g.
/// `pragmas_select_journal_wal`.
///
/// ```rust
/// use sqlitebench::PragmaSet;
/// let sets = PragmaSet::select(Some("journal_wal,threads_8")).unwrap();
/// assert_eq!(sets.len(), 2);
/// assert_eq!(sets[0].statements, vec!["PRAGMA journal_mode = WAL;".to_string()]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PragmaSet {
    pub name: String,
    pub statements: Vec<String>,
}

impl PragmaSet {
    pub fn new<N: Into<String>>(name: N, statements: &[&str]) -> Self {
        Self {
            name: name.into(),
            statements: statements.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn single(name: String, statement: String) -> Self {
        Self {
            name,
            statements: vec![statement],
        }
    }

    /// Every variant the pragma program knows how to measure.
    pub fn catalog() -> Vec<PragmaSet> {
        let mut sets = vec![PragmaSet::new("normal", &[])];
        for (name, mode) in [
            ("off", "OFF"),
            ("normal", "NORMAL"),
            ("full", "FULL"),
            ("extra", "EXTRA"),
        ] {
            sets.push(Self::single(
                format!("synch_{name}"),
                format!("PRAGMA synchronous = {mode};"),
            ));
        }
        for (name, mode) in [("memory", "MEMORY"), ("default", "DEFAULT")] {
            sets.push(Self::single(
                format!("temp_store_{name}"),
                format!("PRAGMA temp_store = {mode};"),
            ));
        }
        for (name, mode) in [
            ("delete", "DELETE"),
            ("memory", "MEMORY"),
            ("wal", "WAL"),
            ("off", "OFF"),
        ] {
            sets.push(Self::single(
                format!("journal_{name}"),
                format!("PRAGMA journal_mode = {mode};"),
            ));
        }
        let sizes_mb = [2u64, 4, 8, 16, 32, 64, 128, 256, 512];
        for mb in sizes_mb {
            sets.push(Self::single(
                format!("cache_size_{mb}M"),
                format!("PRAGMA cache_size = -{};", mb * 1000),
            ));
        }
        for mb in sizes_mb {
            sets.push(Self::single(
                format!("mmap_size_{mb}M"),
                format!("PRAGMA mmap_size = {};", mb * 1_000_000),
            ));
        }
        for threads in [0u32, 1, 2, 4, 8, 16, 32] {
            sets.push(Self::single(
                format!("threads_{threads}"),
                format!("PRAGMA threads = {threads};"),
            ));
        }
        sets.push(Self::combination());
        sets
    }

    /// The tuned configuration measured by default.
    pub fn combination() -> Self {
        PragmaSet::new(
            "combination",
            &[
                "PRAGMA synchronous = NORMAL;",
                "PRAGMA temp_store = MEMORY;",
                "PRAGMA journal_mode = WAL;",
                "PRAGMA cache_size = -64000;",
                "PRAGMA mmap_size = 64000000;",
                "PRAGMA threads = 8;",
            ],
        )
    }

    /// Resolves a comma separated list of variant names (or `all`).
    /// `None` or a blank filter selects [`PragmaSet::combination`].
    pub fn select(filter: Option<&str>) -> Result<Vec<PragmaSet>, BenchError> {
        let filter = filter.map(str::trim).unwrap_or("");
        if filter.is_empty() {
            return Ok(vec![Self::combination()]);
        }
        let catalog = Self::catalog();
        if filter == "all" {
            return Ok(catalog);
        }
        filter
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                catalog
                    .iter()
                    .find(|set| set.name == name)
                    .cloned()
                    .ok_or_else(|| {
                        BenchError::invalid_input(format!("unknown pragma variant {name}"))
                    })
            })
            .collect()
    }

    /// Selection taken from [`PRAGMAS_ENV`].
    pub fn from_env() -> Result<Vec<PragmaSet>, BenchError> {
        Self::select(env::var(PRAGMAS_ENV).ok().as_deref())
    }
}

/// Connection tuning each parallel worker applies to its private handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionTuning {
    pub synchronous: String,
    pub temp_store: String,
    pub journal_mode: String,
    /// Negative values are KiB, as SQLite interprets them.
    pub cache_size: i64,
    pub threads: u32,
    pub read_uncommitted: bool,
    pub mmap_size: u64,
    pub shared_cache: bool,
}

impl Default for ConnectionTuning {
    fn default() -> Self {
        Self {
            synchronous: "NORMAL".to_string(),
            temp_store: "MEMORY".to_string(),
            journal_mode: "WAL".to_string(),
            cache_size: -512_000,
            threads: 8,
            read_uncommitted: true,
            mmap_size: 4_194_304,
            shared_cache: true,
        }
    }
}

impl ConnectionTuning {
    pub fn statements(&self) -> Vec<String> {
        vec![
            format!("PRAGMA synchronous = {}", self.synchronous),
            format!("PRAGMA temp_store = {}", self.temp_store),
            format!("PRAGMA journal_mode = {}", self.journal_mode),
            format!("PRAGMA cache_size = {}", self.cache_size),
            format!("PRAGMA threads = {}", self.threads),
            format!("PRAGMA read_uncommitted = {}", u8::from(self.read_uncommitted)),
            format!("PRAGMA mmap_size = {}", self.mmap_size),
            format!("PRAGMA shared_cache = {}", self.shared_cache),
        ]
    }

    pub fn apply(&self, conn: &Connection) -> Result<(), BenchError> {
        apply_pragmas(conn, &self.statements())
    }
}

/// Report directory, honouring [`REPORTS_DIR_ENV`].
pub fn reports_dir_from_env() -> PathBuf {
    env::var(REPORTS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPORTS_DIR))
}

/// Parses a comma separated list of worker counts.
pub fn parse_thread_levels(raw: &str) -> Result<Vec<usize>, BenchError> {
    let levels = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(0) | Err(_) => Err(BenchError::invalid_input(format!(
                "invalid worker count {s}"
            ))),
            Ok(n) => Ok(n),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if levels.is_empty() {
        return Err(BenchError::invalid_input("no worker counts given"));
    }
    Ok(levels)
}

/// Worker counts from [`THREADS_ENV`], defaulting to `1,2,4,8`.
pub fn thread_levels_from_env() -> Result<Vec<usize>, BenchError> {
    match env::var(THREADS_ENV) {
        Ok(raw) => parse_thread_levels(&raw),
        Err(_) => Ok(vec![1, 2, 4, 8]),
    }
}
