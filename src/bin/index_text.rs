use std::path::Path;

use sqlitebench::engine::{DEFAULT_DB_PATH, remove_database_files};
use sqlitebench::report::Reporter;
use sqlitebench::run_program;
use sqlitebench::schema::TextIndex;
use sqlitebench::workloads::run_index_program;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let code = run_program("index_text", &args, |config| {
        let reporter = Reporter::from_env();
        let db_path = Path::new(DEFAULT_DB_PATH);
        let mut written = Vec::new();
        for variant in TextIndex::ALL {
            written.extend(run_index_program(db_path, config, variant, &reporter)?);
        }
        remove_database_files(db_path)?;
        Ok(written)
    });
    std::process::exit(code);
}
