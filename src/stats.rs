//! Order statistics and throughput derived from a sequence of nanosecond
//! durations.
//!
//! Percentiles are read by direct index into the sorted copy using
//! truncating integer division; there is no interpolation between ranks.

use crate::errors::BenchError;

/// Distribution of one measured phase, in nanoseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct LatencySummary {
    pub samples: usize,
    pub min: u64,
    pub p1: u64,
    pub p10: u64,
    pub p25: u64,
    pub median: u64,
    pub p75: u64,
    pub p90: u64,
    pub p99: u64,
    pub max: u64,
    pub mean: f64,
    pub trimmed_mean_1_99: f64,
    pub trimmed_mean_10_90: f64,
}

impl LatencySummary {
    pub fn from_samples(samples: &[u64]) -> Result<Self, BenchError> {
        if samples.is_empty() {
            return Err(BenchError::empty_samples("latency summary"));
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let n = sorted.len();
        Ok(Self {
            samples: n,
            min: sorted[0],
            p1: sorted[n / 100],
            p10: sorted[n / 10],
            p25: sorted[n / 4],
            median: sorted[n / 2],
            p75: sorted[n * 3 / 4],
            p90: sorted[n * 9 / 10],
            p99: sorted[n * 99 / 100],
            max: sorted[n - 1],
            mean: mean(&sorted),
            trimmed_mean_1_99: trimmed_mean(&sorted, n / 100),
            trimmed_mean_10_90: trimmed_mean(&sorted, n / 10),
        })
    }

    pub fn median_kops(&self) -> f64 {
        kops(self.median as f64)
    }

    pub fn mean_kops(&self) -> f64 {
        kops(self.mean)
    }

    pub fn trimmed_mean_1_99_kops(&self) -> f64 {
        kops(self.trimmed_mean_1_99)
    }

    pub fn trimmed_mean_10_90_kops(&self) -> f64 {
        kops(self.trimmed_mean_10_90)
    }
}

/// Thousands of operations per second at `latency_ns` per operation.
pub fn kops(latency_ns: f64) -> f64 {
    1e9 / latency_ns / 1000.0
}

fn mean(values: &[u64]) -> f64 {
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    sum / values.len() as f64
}

/// Mean of the ranks `[cut, n - cut)` of an already sorted slice.
fn trimmed_mean(sorted: &[u64], cut: usize) -> f64 {
    mean(&sorted[cut..sorted.len() - cut])
}
