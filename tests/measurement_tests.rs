use std::fs;

use sqlitebench::BenchError;
use sqlitebench::config::RunConfig;
use sqlitebench::engine::open_database;
use sqlitebench::entries::{FILL_SEED, MEASURE_SEED, seeded_rng};
use sqlitebench::report::{REPORT_HEADER, Reporter};
use sqlitebench::schema::{CREATE_BLOCK_TABLE, PRAGMA_PROGRAM_INDEXES, block_tables};
use sqlitebench::workloads::pragmas::{fill, measure_insert, measure_select};

fn data_lines(reporter: &Reporter, name: &str) -> Vec<String> {
    match fs::read_to_string(reporter.path_for(name)) {
        Ok(text) => text.lines().skip(1).map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn test_insert_then_select_reports_one_row_each() {
    let dir = tempfile::tempdir().unwrap();
    let reporter = Reporter::new(dir.path().join("reports"));
    let config = RunConfig::default();

    let conn = open_database(dir.path().join("bench.sqlite"), &block_tables(CREATE_BLOCK_TABLE))
        .unwrap();
    for index in PRAGMA_PROGRAM_INDEXES {
        conn.execute_batch(index).unwrap();
    }
    let entries = fill(&conn, &mut seeded_rng(FILL_SEED), config.num_entries).unwrap();
    let mut rng = seeded_rng(MEASURE_SEED);

    let inserts = measure_insert(&conn, &config, &mut rng, &entries).unwrap();
    assert_eq!(inserts.len(), 10_000);
    reporter.append("e2e_insert", &config, &inserts).unwrap();

    let selects = measure_select(&conn, &config, &mut rng, &entries).unwrap();
    assert_eq!(selects.len(), 10_000);
    let written = reporter.append("e2e_select", &config, &selects).unwrap();
    assert_eq!(written.row.num_repetitions, 10_000);

    let lines = data_lines(&reporter, "e2e_select");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("100000,1000,10000,"));
}

#[test]
fn test_id_mismatch_appends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let reporter = Reporter::new(dir.path().join("reports"));
    let config = RunConfig {
        num_entries: 1_000,
        num_warmup: 10,
        num_repetitions: 100,
    };

    let conn = open_database(dir.path().join("bench.sqlite"), &block_tables(CREATE_BLOCK_TABLE))
        .unwrap();
    let entries = fill(&conn, &mut seeded_rng(FILL_SEED), config.num_entries).unwrap();
    conn.execute("UPDATE Block SET ID = ID + 1000000", []).unwrap();

    let result = measure_select(&conn, &config, &mut seeded_rng(MEASURE_SEED), &entries)
        .and_then(|samples| reporter.append("mismatch_select", &config, &samples));
    assert!(matches!(result, Err(BenchError::Mismatch { .. })));
    assert!(data_lines(&reporter, "mismatch_select").is_empty());
    assert!(!reporter.path_for("mismatch_select").exists());
}

#[test]
fn test_reporter_twice_gives_one_header() {
    let dir = tempfile::tempdir().unwrap();
    let reporter = Reporter::new(dir.path().join("reports"));
    let config = RunConfig::default();
    reporter.append("twice", &config, &[3, 1, 2]).unwrap();
    reporter.append("twice", &config, &[6, 5, 4]).unwrap();

    let text = fs::read_to_string(reporter.path_for("twice")).unwrap();
    let header = REPORT_HEADER.join(",");
    assert_eq!(text.lines().filter(|line| *line == header).count(), 1);
    assert_eq!(text.lines().count(), 3);
    assert_eq!(text.lines().next(), Some(header.as_str()));
}
