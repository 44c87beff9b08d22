use std::path::Path;

use sqlitebench::config::PragmaSet;
use sqlitebench::engine::{DEFAULT_DB_PATH, remove_database_files};
use sqlitebench::report::Reporter;
use sqlitebench::run_program;
use sqlitebench::workloads::{measure_all, prepare_pragmas};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let code = run_program("pragmas", &args, |config| {
        let sets = PragmaSet::from_env()?;
        let reporter = Reporter::from_env();
        let db_path = Path::new(DEFAULT_DB_PATH);

        let entries = prepare_pragmas(db_path, config)?;
        let mut written = Vec::new();
        for set in &sets {
            written.extend(measure_all(db_path, config, set, &entries, &reporter)?);
        }
        remove_database_files(db_path)?;
        Ok(written)
    });
    std::process::exit(code);
}
