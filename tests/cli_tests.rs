use std::fs;
use std::path::Path;

use assert_cmd::Command;

const SMALL_RUN: [&str; 6] = [
    "--num-entries",
    "300",
    "--num-warmup",
    "10",
    "--num-repitions",
    "50",
];

fn program(name: &str, workdir: &Path) -> Command {
    let mut cmd = Command::new(match name {
        "pragmas" => env!("CARGO_BIN_EXE_pragmas"),
        "index_text" => env!("CARGO_BIN_EXE_index_text"),
        "index_split" => env!("CARGO_BIN_EXE_index_split"),
        "index_blob" => env!("CARGO_BIN_EXE_index_blob"),
        _ => env!("CARGO_BIN_EXE_parallel_select"),
    });
    cmd.current_dir(workdir)
        .env_remove("SQLITEBENCH_REPORTS_DIR")
        .env("RUST_LOG", "warn");
    cmd
}

fn report_rows(workdir: &Path, name: &str) -> usize {
    let text = fs::read_to_string(workdir.join("reports").join(format!("{name}.csv"))).unwrap();
    text.lines().count() - 1
}

#[test]
fn test_help_exits_with_success() {
    let dir = tempfile::tempdir().unwrap();
    program("pragmas", dir.path()).arg("--help").assert().success();
}

#[test]
fn test_non_integer_value_fails() {
    let dir = tempfile::tempdir().unwrap();
    program("index_text", dir.path())
        .args(["--num-entries", "many"])
        .assert()
        .failure();
    assert!(!dir.path().join("reports").exists());
}

#[test]
fn test_pragmas_program_reports_every_measure() {
    let dir = tempfile::tempdir().unwrap();
    program("pragmas", dir.path())
        .env("SQLITEBENCH_PRAGMAS", "journal_wal,synch_off")
        .args(SMALL_RUN)
        .arg("--unknown-flag")
        .assert()
        .success();
    for measure in ["insert", "select", "xor1", "xor2", "join", "blockset"] {
        for set in ["journal_wal", "synch_off"] {
            assert_eq!(report_rows(dir.path(), &format!("pragmas_{measure}_{set}")), 1);
        }
    }
    assert!(!dir.path().join("benchmark.sqlite").exists());
}

#[test]
fn test_index_programs_report_each_variant() {
    let dir = tempfile::tempdir().unwrap();
    program("index_text", dir.path()).args(SMALL_RUN).assert().success();
    program("index_split", dir.path()).args(SMALL_RUN).assert().success();
    for suffix in ["normal", "hash", "size"] {
        assert_eq!(report_rows(dir.path(), &format!("index_text_insert_index_{suffix}")), 1);
        assert_eq!(report_rows(dir.path(), &format!("index_text_select_index_{suffix}")), 1);
    }
    for suffix in ["normal", "h0", "h0_size", "size"] {
        assert_eq!(report_rows(dir.path(), &format!("index_split_insert_index_{suffix}")), 1);
        assert_eq!(report_rows(dir.path(), &format!("index_split_select_index_{suffix}")), 1);
    }
}

#[test]
fn test_blob_index_program_reports_each_variant() {
    let dir = tempfile::tempdir().unwrap();
    let output = program("index_blob", dir.path())
        .args(SMALL_RUN)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(String::from_utf8(output).unwrap().lines().count(), 4);
    for suffix in ["blob", "blob_int"] {
        assert_eq!(report_rows(dir.path(), &format!("index_blob_insert_index_{suffix}")), 1);
        assert_eq!(report_rows(dir.path(), &format!("index_blob_select_index_{suffix}")), 1);
    }
    assert!(!dir.path().join("benchmark.sqlite").exists());
}

#[test]
fn test_parallel_program_reports_each_level() {
    let dir = tempfile::tempdir().unwrap();
    let output = program("parallel_select", dir.path())
        .env("SQLITEBENCH_THREADS", "1,2")
        .args(SMALL_RUN)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();
    assert_eq!(stdout.lines().count(), 2);
    let text = fs::read_to_string(dir.path().join("reports/parallel_select_p2.csv")).unwrap();
    assert!(text.lines().nth(1).unwrap().starts_with("300,10,300,"));
    assert!(!dir.path().join("benchmark.sqlite-wal").exists());
}

#[test]
fn test_repeated_runs_append_rows() {
    let dir = tempfile::tempdir().unwrap();
    for _ in 0..2 {
        program("index_text", dir.path()).args(SMALL_RUN).assert().success();
    }
    assert_eq!(report_rows(dir.path(), "index_text_select_index_hash"), 2);
}
