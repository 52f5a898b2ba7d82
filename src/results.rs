use crate::{benchmark::BenchmarkConfig, metrics::StatisticsSnapshot, operations::OperationKind, utils};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Outcome of one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub operation: OperationKind,
    pub config: BenchmarkConfig,
    pub statistics: StatisticsSnapshot,
    /// Units whose samples are included in `statistics`
    pub completed_units: usize,
    /// Units that aborted; their samples are discarded
    pub failed_units: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub test_duration: Duration,
    pub system_info: SystemInfo,
}

impl BenchmarkResults {
    pub fn new(
        config: BenchmarkConfig,
        statistics: StatisticsSnapshot,
        completed_units: usize,
        failed_units: usize,
    ) -> Self {
        Self {
            operation: config.operation,
            test_duration: statistics.test_duration,
            config,
            statistics,
            completed_units,
            failed_units,
            timestamp: chrono::Utc::now(),
            system_info: SystemInfo::collect(),
        }
    }
}

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub rust_version: String,
    pub benchmark_version: String,
}

impl SystemInfo {
    pub fn collect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: utils::get_cpu_cores(),
            rust_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
            benchmark_version: crate::VERSION.to_string(),
        }
    }
}

/// Top-level layout of the JSON results file
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalBenchmarkResults {
    pub metadata: BenchmarkMetadata,
    pub results: BenchmarkResults,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BenchmarkMetadata {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Prints the run summary and writes the optional JSON results file.
pub struct ResultsManager {
    output_file: Option<PathBuf>,
}

impl ResultsManager {
    pub fn new(output_file: Option<&Path>) -> Self {
        Self {
            output_file: output_file.map(Path::to_path_buf),
        }
    }

    /// Print the summary table and persist the results if an output file is set.
    pub fn finalize(&self, results: &BenchmarkResults) -> Result<()> {
        println!("{}", Self::summary_table(results));

        if let Some(path) = &self.output_file {
            Self::write_json(path, results)?;
            info!("Results written to: {:?}", path);
        }
        Ok(())
    }

    fn write_json(path: &Path, results: &BenchmarkResults) -> Result<()> {
        let final_results = FinalBenchmarkResults {
            metadata: BenchmarkMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
            },
            results: results.clone(),
        };

        let json = serde_json::to_string_pretty(&final_results)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {:?}", path))?;
        Ok(())
    }

    /// Render the console summary.
    pub fn summary_table(results: &BenchmarkResults) -> String {
        let stats = &results.statistics;
        let widths = [22, 20];
        let mut rows = vec![
            ("Operation", results.operation.to_string()),
            ("Units (ok/failed)", format!("{}/{}", results.completed_units, results.failed_units)),
            ("Samples", stats.count.to_string()),
            ("Test duration", utils::format_duration(stats.test_duration)),
            ("Throughput", utils::format_ops_rate(stats.ops_per_second)),
            ("Avg latency", format!("{:.2} ms", stats.avg)),
            ("Min latency", format!("{} ms", stats.min)),
            ("P95 latency", format!("{} ms", stats.p95)),
            ("P99 latency", format!("{} ms", stats.p99)),
            ("Max latency", format!("{} ms", stats.max)),
        ];
        if results.operation.uploads_payload() {
            let bytes_per_second = stats.ops_per_second * results.config.size as f64;
            rows.push(("Data rate", utils::format_rate(bytes_per_second)));
        }

        let mut out = String::new();
        out.push_str(&utils::table_separator(&widths));
        out.push('\n');
        for (label, value) in rows {
            out.push_str(&utils::table_row(&[label, value.as_str()], &widths));
            out.push('\n');
        }
        out.push_str(&utils::table_separator(&widths));
        out
    }
}
