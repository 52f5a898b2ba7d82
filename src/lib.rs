//! # S3 Benchmark Library
//!
//! A load generator for object-storage services that speak the S3 protocol.
//! It runs one benchmark kind (upload, verified upload, random reads, bucket
//! and manifest maintenance) with a configurable number of concurrent
//! workers, measures every operation's latency and publishes the summary to
//! the console, an optional JSON file and an optional KairosDB endpoint.
//!
//! ## Architecture Overview
//!
//! - `payload`: Seeded pseudo-random object bodies streamed without buffering
//! - `storage`: The `ObjectStore` abstraction with S3 and in-memory adapters
//! - `operations`: One worker type per benchmark kind
//! - `benchmark`: Configuration and the orchestrator that runs the workers
//! - `metrics`: Latency samples and the nearest-rank statistics snapshot
//! - `reporting`: Metric points, batching and the KairosDB sink
//! - `results`: Console summary and JSON results file
//! - `manifest`: The key file shared by listing and random-read kinds
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use s3_benchmark::{BenchmarkConfig, BenchmarkRunner, InMemoryStore, OperationKind};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BenchmarkConfig {
//!         operation: OperationKind::Upload,
//!         threads: 4,
//!         n: 250,
//!         size: 64 * 1024,
//!         ..BenchmarkConfig::default()
//!     };
//!
//!     let runner = BenchmarkRunner::new(config, Arc::new(InMemoryStore::new()));
//!     let results = runner.run().await?;
//!
//!     println!("p99 latency: {} ms", results.statistics.p99);
//!     Ok(())
//! }
//! ```

/// Run configuration and the execution orchestrator
pub mod benchmark;

/// Command-line interface
pub mod cli;

pub mod error;

/// Console and file logging setup
pub mod logging;

pub mod manifest;

pub mod metrics;

/// Benchmark worker implementations
pub mod operations;

pub mod payload;

/// Publishing run statistics to KairosDB
pub mod reporting;

/// Result collection and output formatting
pub mod results;

/// Object-storage abstraction and adapters
pub mod storage;

pub mod utils;

pub use benchmark::{BenchmarkConfig, BenchmarkRunner};
pub use cli::Args;
pub use error::{BenchmarkError, GenerationError, OperationError, ReportingError, StatisticsError};
pub use metrics::{LatencyStats, StatisticsSnapshot};
pub use operations::OperationKind;
pub use payload::RandomPayload;
pub use reporting::{KairosDbSink, MetricsBatcher, MetricsSink};
pub use results::{BenchmarkResults, ResultsManager};
pub use storage::{InMemoryStore, ObjectStore, S3Store, S3StoreConfig, StorageKind};

/// The current version of the benchmark, recorded in the results file
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
///
/// Shared by the command line definitions and `BenchmarkConfig::default()`.
pub mod defaults {
    /// Default number of concurrent workers
    pub const THREADS: usize = 1;

    /// Upper bound accepted for `--threads`
    pub const MAX_THREADS: usize = 1024;

    /// Default operations per worker
    pub const N: usize = 1000;

    /// Default object size in bytes (64 KiB)
    pub const SIZE: u64 = 65536;

    pub const BUCKET: &str = "test-bucket";

    /// Default S3 endpoint host
    ///
    /// A bare host; the scheme is chosen by `--use-http`.
    pub const ENDPOINT: &str = "s3.amazonaws.com";

    pub const REGION: &str = "us-east-1";

    /// Default key manifest path
    pub const KEY_FILE: &str = "keys.txt";

    /// Default `source` metric tag
    pub const SOURCE: &str = "s3pt";

    /// Default `backend` metric tag
    pub const BACKEND: &str = "s3";

    /// Default metric name prefix
    pub const NAMESPACE: &str = "core.engineering.s3";

    /// Metric points buffered before a batch is posted
    pub const BATCH_SIZE: usize = 100;
}
