//! Runs every benchmark program in turn, forwarding the command line, and
//! prints each program's exit status and the reports it appended.

use std::process::{Command, Stdio};

use serde_json::Value;

const PROGRAMS: [&str; 5] = [
    "pragmas",
    "index_text",
    "index_split",
    "index_blob",
    "parallel_select",
];

#[derive(Clone, Debug, PartialEq)]
struct ProgramOutcome {
    program: &'static str,
    /// `None` when the program could not be launched or was killed.
    exit_code: Option<i32>,
    reports: Vec<String>,
}

impl ProgramOutcome {
    fn ok(&self) -> bool {
        self.exit_code == Some(0)
    }

    fn status(&self) -> String {
        match self.exit_code {
            Some(0) => "OK".to_string(),
            Some(code) => format!("FAIL({code})"),
            None => "FAIL".to_string(),
        }
    }
}

/// Report names from the JSON summary lines a program prints on stdout.
fn report_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| value.get("report").and_then(Value::as_str).map(str::to_string))
        .collect()
}

fn run_program(program: &'static str, forwarded: &[String]) -> ProgramOutcome {
    let output = Command::new("cargo")
        .args(["run", "--release", "--bin", program, "--"])
        .args(forwarded)
        .stderr(Stdio::inherit())
        .output();
    match output {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            print!("{stdout}");
            ProgramOutcome {
                program,
                exit_code: output.status.code(),
                reports: report_names(&stdout),
            }
        }
        Err(err) => {
            eprintln!("failed to launch {program}: {err}");
            ProgramOutcome {
                program,
                exit_code: None,
                reports: Vec::new(),
            }
        }
    }
}

fn summary(outcomes: &[ProgramOutcome]) -> String {
    let mut out = String::from("Summary\n=======\n");
    for outcome in outcomes {
        out.push_str(&format!(
            "{:<18}{:<10}{} reports\n",
            outcome.program,
            outcome.status(),
            outcome.reports.len()
        ));
    }
    out
}

fn main() {
    let forwarded: Vec<String> = std::env::args().skip(1).collect();
    println!("sqlitebench driver\n==================");
    let outcomes: Vec<ProgramOutcome> = PROGRAMS
        .iter()
        .map(|&program| run_program(program, &forwarded))
        .collect();
    print!("\n{}", summary(&outcomes));
    if !outcomes.iter().all(ProgramOutcome::ok) {
        std::process::exit(1);
    }
}
