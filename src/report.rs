//! CSV report series: one file per report name, one row per run.
//!
//! Files are append-only across process runs. The header is written only
//! when the file does not exist yet, so repeated runs of the same benchmark
//! build up a historical log under `reports/<name>.csv`.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::{RunConfig, reports_dir_from_env};
use crate::errors::BenchError;
use crate::stats::LatencySummary;

/// Column names, in file order.
pub const REPORT_HEADER: [&str; 19] = [
    "num_entries",
    "num_warmup",
    "num_repitions",
    "min",
    "1st",
    "10th",
    "25th",
    "median",
    "75th",
    "90th",
    "99th",
    "max",
    "avg",
    "1-99_avg",
    "10-90_avg",
    "median_kops",
    "avg_kops",
    "1-99_avg_kops",
    "10-90_avg_kops",
];

/// One data line of a report file. Field order is the column order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRow {
    pub num_entries: u64,
    pub num_warmup: u64,
    #[serde(rename = "num_repitions")]
    pub num_repetitions: u64,
    pub min: u64,
    #[serde(rename = "1st")]
    pub p1: u64,
    #[serde(rename = "10th")]
    pub p10: u64,
    #[serde(rename = "25th")]
    pub p25: u64,
    pub median: u64,
    #[serde(rename = "75th")]
    pub p75: u64,
    #[serde(rename = "90th")]
    pub p90: u64,
    #[serde(rename = "99th")]
    pub p99: u64,
    pub max: u64,
    #[serde(rename = "avg")]
    pub mean: f64,
    #[serde(rename = "1-99_avg")]
    pub trimmed_mean_1_99: f64,
    #[serde(rename = "10-90_avg")]
    pub trimmed_mean_10_90: f64,
    #[serde(rename = "median_kops")]
    pub median_throughput_kops: f64,
    #[serde(rename = "avg_kops")]
    pub mean_throughput_kops: f64,
    #[serde(rename = "1-99_avg_kops")]
    pub trimmed_mean_1_99_throughput_kops: f64,
    #[serde(rename = "10-90_avg_kops")]
    pub trimmed_mean_10_90_throughput_kops: f64,
}

impl ReportRow {
    pub fn new(config: &RunConfig, summary: &LatencySummary) -> Self {
        Self {
            num_entries: config.num_entries,
            num_warmup: config.num_warmup,
            num_repetitions: config.num_repetitions,
            min: summary.min,
            p1: summary.p1,
            p10: summary.p10,
            p25: summary.p25,
            median: summary.median,
            p75: summary.p75,
            p90: summary.p90,
            p99: summary.p99,
            max: summary.max,
            mean: summary.mean,
            trimmed_mean_1_99: summary.trimmed_mean_1_99,
            trimmed_mean_10_90: summary.trimmed_mean_10_90,
            median_throughput_kops: summary.median_kops(),
            mean_throughput_kops: summary.mean_kops(),
            trimmed_mean_1_99_throughput_kops: summary.trimmed_mean_1_99_kops(),
            trimmed_mean_10_90_throughput_kops: summary.trimmed_mean_10_90_kops(),
        }
    }
}

/// A row that has been appended, and where.
#[derive(Clone, Debug, PartialEq)]
pub struct WrittenReport {
    pub name: String,
    pub path: PathBuf,
    pub row: ReportRow,
}

impl WrittenReport {
    /// Single-line JSON summary for stdout.
    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "report": self.name,
            "path": self.path.display().to_string(),
            "row": self.row,
        })
    }
}

/// Appends report rows under a directory.
#[derive(Clone, Debug)]
pub struct Reporter {
    dir: PathBuf,
}

impl Reporter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// `reports`, unless `SQLITEBENCH_REPORTS_DIR` says otherwise.
    pub fn from_env() -> Self {
        Self::new(reports_dir_from_env())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The report name is used verbatim as the file stem.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }

    pub fn append(
        &self,
        name: &str,
        config: &RunConfig,
        samples: &[u64],
    ) -> Result<WrittenReport, BenchError> {
        let summary = LatencySummary::from_samples(samples)
            .map_err(|_| BenchError::empty_samples(name))?;
        let row = ReportRow::new(config, &summary);

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);
        let emit_header = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(emit_header)
            .from_writer(file);
        writer.serialize(&row)?;
        writer.flush()?;

        info!(
            report = name,
            samples = summary.samples,
            median_ns = row.median,
            avg_ns = row.mean,
            median_kops = row.median_throughput_kops,
            "report row appended"
        );
        Ok(WrittenReport {
            name: name.to_string(),
            path,
            row,
        })
    }
}
