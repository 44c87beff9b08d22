use std::path::Path;

use sqlitebench::config::{ConnectionTuning, thread_levels_from_env};
use sqlitebench::engine::{DEFAULT_DB_PATH, remove_database_files};
use sqlitebench::report::Reporter;
use sqlitebench::run_program;
use sqlitebench::workloads::{prepare_parallel, run_parallel};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let code = run_program("parallel_select", &args, |config| {
        let levels = thread_levels_from_env()?;
        let reporter = Reporter::from_env();
        let tuning = ConnectionTuning::default();
        let db_path = Path::new(DEFAULT_DB_PATH);

        let records = prepare_parallel(db_path, config.num_entries)?;
        let mut written = Vec::with_capacity(levels.len());
        for workers in levels {
            let run = run_parallel(db_path, config, &records, workers, &tuning)?;
            written.push(run.report(&reporter, config)?);
        }
        remove_database_files(db_path)?;
        Ok(written)
    });
    std::process::exit(code);
}
