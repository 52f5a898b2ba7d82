//! # Latency Metrics
//!
//! Every operation unit records one sample per timed request into its own
//! [`LatencyStats`]. Once all units finish, the runner merges them and asks
//! for a [`StatisticsSnapshot`]: min, max, average, nearest-rank p95 and p99
//! in milliseconds, plus operations per wall-clock second.
//!
//! ```rust
//! use s3_benchmark::metrics::LatencyStats;
//! use std::time::Duration;
//!
//! let mut first = LatencyStats::new();
//! first.add_millis(10);
//! first.add_millis(30);
//!
//! let mut second = LatencyStats::new();
//! second.add_millis(20);
//! second.add_millis(40);
//!
//! first.merge(second);
//! let snapshot = first.snapshot(Duration::from_secs(2)).unwrap();
//! assert_eq!(snapshot.count, 4);
//! assert_eq!(snapshot.avg, 25.0);
//! assert_eq!(snapshot.p95, 40);
//! assert_eq!(snapshot.ops_per_second, 2.0);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::StatisticsError;

/// Summary statistics over one run's latency samples, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub count: usize,
    pub min: u64,
    pub max: u64,
    pub avg: f64,
    pub p95: u64,
    pub p99: u64,
    pub ops_per_second: f64,
    #[serde(with = "duration_millis")]
    pub test_duration: Duration,
}

/// Latency aggregator holding raw samples so percentiles are exact.
///
/// Each operation unit owns one of these; the orchestrator merges them once
/// every unit has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencyStats {
    samples: Vec<u64>,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an elapsed duration, truncated to whole milliseconds.
    pub fn add_value(&mut self, elapsed: Duration) {
        self.samples.push(elapsed.as_millis() as u64);
    }

    pub fn add_millis(&mut self, millis: u64) {
        self.samples.push(millis);
    }

    /// Append every sample of `other`.
    pub fn merge(&mut self, other: LatencyStats) {
        self.samples.extend(other.samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[u64] {
        &self.samples
    }

    /// Compute the summary over all recorded samples.
    ///
    /// `test_duration` is the wall-clock span the samples were collected in
    /// and only feeds `ops_per_second`.
    pub fn snapshot(&self, test_duration: Duration) -> Result<StatisticsSnapshot, StatisticsError> {
        if self.samples.is_empty() {
            return Err(StatisticsError::Empty);
        }

        let mut sorted = self.samples.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u128 = sorted.iter().map(|v| *v as u128).sum();
        let secs = test_duration.as_secs_f64();
        let ops_per_second = if secs > 0.0 { count as f64 / secs } else { 0.0 };

        Ok(StatisticsSnapshot {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            avg: sum as f64 / count as f64,
            p95: nearest_rank(&sorted, 95),
            p99: nearest_rank(&sorted, 99),
            ops_per_second,
            test_duration,
        })
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice.
fn nearest_rank(sorted: &[u64], percentile: usize) -> u64 {
    let n = sorted.len();
    // ceil(percentile * n / 100) without going through floats
    let rank = ((percentile * n + 99) / 100).clamp(1, n);
    sorted[rank - 1]
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
