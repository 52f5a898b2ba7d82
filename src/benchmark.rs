//! # Benchmark Engine Module
//!
//! The execution orchestrator. It turns a [`BenchmarkConfig`] into a set of
//! operation units, runs them concurrently against one shared object store
//! and folds their samples into a single statistics snapshot.
//!
//! ## Test Execution Lifecycle
//!
//! 1. **Preparation**: Load the key manifest once when the kind reads random
//!    keys, and decide how many units to build
//! 2. **Execution**: Spawn every unit as a tokio task with the wall clock
//!    started just before submission
//! 3. **Collection**: Join all units, stop the clock, log and count failures
//! 4. **Aggregation**: Merge the surviving samples and compute the snapshot
//!
//! ## Concurrency Handling
//!
//! Multi-threaded kinds (uploads and random reads) run `threads` units.
//! Every other kind runs exactly one unit; asking for more only produces a
//! warning. Since at most `threads` units exist, at most `threads` run at
//! once.
//!
//! ## Failure Handling
//!
//! A unit that returns an error is logged and counted, and whatever it had
//! recorded is dropped. The run still reports the statistics of the other
//! units. Only a run with no surviving sample at all fails, with
//! [`StatisticsError::Empty`](crate::error::StatisticsError::Empty).

use crate::{
    cli::Args,
    error::BenchmarkError,
    manifest::KeyManifest,
    metrics::LatencyStats,
    operations::{OperationContext, OperationFactory, OperationKind},
    results::BenchmarkResults,
    storage::{ObjectStore, S3StoreConfig, StorageKind},
    utils,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Banner printed before a run starts.
struct BenchmarkConfigDisplay<'a> {
    config: &'a BenchmarkConfig,
    store: &'a str,
    units: usize,
}

impl<'a> std::fmt::Display for BenchmarkConfigDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "-----------------------------------------------------------------"
        )?;
        writeln!(f, "Starting Benchmark for: {}", self.config.operation)?;
        writeln!(f, "  Storage:            {}", self.store)?;
        if self.config.storage == StorageKind::S3 {
            writeln!(f, "  Endpoint:           {}", self.config.store.endpoint_url())?;
            writeln!(f, "  Region:             {}", self.config.store.region)?;
        }
        writeln!(f, "  Bucket:             {}", self.config.bucket)?;
        writeln!(f, "  Units:              {}", self.units)?;
        writeln!(f, "  Operations/Unit:    {}", self.config.n)?;
        if self.config.operation.uploads_payload() {
            writeln!(
                f,
                "  Object Size:        {} ({} bytes)",
                utils::format_bytes(self.config.size),
                self.config.size
            )?;
        }
        if self.config.operation.requires_key_manifest()
            || self.config.operation == OperationKind::CreateKeyFile
        {
            writeln!(f, "  Key File:           {}", self.config.key_file.display())?;
        }
        let reporting = self
            .config
            .kairosdb_url
            .as_deref()
            .unwrap_or("Disabled");
        writeln!(f, "  Metrics Endpoint:   {}", reporting)?;
        write!(
            f,
            "-----------------------------------------------------------------"
        )
    }
}

/// Configuration for benchmark execution
///
/// The validated, serializable form of the command line. It is embedded in
/// the results file, so it never carries credentials: those live only in
/// [`S3StoreConfig`] and are skipped by serde.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// The benchmark kind to run
    pub operation: OperationKind,

    /// Requested worker count
    ///
    /// Honoured by multi-threaded kinds. `CLEAR_BUCKET` uses it as the width
    /// of its delete fan-out; the other single-unit kinds ignore it.
    pub threads: usize,

    /// Operations per unit
    pub n: usize,

    /// Payload size in bytes for upload kinds
    pub size: u64,

    pub bucket: String,

    /// Manifest written by `CREATE_KEY_FILE` and read by random reads
    pub key_file: PathBuf,

    /// Which adapter the store factory builds
    pub storage: StorageKind,

    /// Connection settings for the S3 adapter
    pub store: S3StoreConfig,

    /// Metrics reporting is skipped when unset
    pub kairosdb_url: Option<String>,

    /// `source` metric tag
    pub source: String,

    /// `backend` metric tag
    pub backend: String,

    /// Metric name prefix
    pub namespace: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            operation: OperationKind::Upload,
            threads: crate::defaults::THREADS,
            n: crate::defaults::N,
            size: crate::defaults::SIZE,
            bucket: crate::defaults::BUCKET.to_string(),
            key_file: PathBuf::from(crate::defaults::KEY_FILE),
            storage: StorageKind::S3,
            store: S3StoreConfig::default(),
            kairosdb_url: None,
            source: crate::defaults::SOURCE.to_string(),
            backend: crate::defaults::BACKEND.to_string(),
            namespace: crate::defaults::NAMESPACE.to_string(),
        }
    }
}

impl BenchmarkConfig {
    /// Create benchmark configuration from CLI arguments
    ///
    /// ## Validation
    /// - Thread count between 1 and [`crate::defaults::MAX_THREADS`]
    /// - At least one operation per unit
    /// - Non-zero object size for upload kinds
    pub fn from_args(args: &Args) -> Result<Self> {
        utils::validate_threads(args.threads)?;
        utils::validate_operation_count(args.n)?;
        utils::validate_object_size(args.operation, args.size)?;

        Ok(Self {
            operation: args.operation,
            threads: args.threads,
            n: args.n,
            size: args.size,
            bucket: args.bucket.clone(),
            key_file: args.key_file.clone(),
            storage: args.storage,
            store: S3StoreConfig {
                endpoint: args.endpoint_url.clone(),
                region: args.region.clone(),
                access_key: args.access_key.clone(),
                secret_key: args.secret_key.clone(),
                use_http: args.use_http,
                path_style: args.path_style_access,
                keep_alive: !args.no_keep_alive,
            },
            kairosdb_url: args.kairosdb_url.clone(),
            source: args.source.clone(),
            backend: args.backend.clone(),
            namespace: args.namespace.clone(),
        })
    }

    /// Number of units a run of this configuration starts.
    pub fn unit_count(&self) -> usize {
        if self.operation.is_multi_threaded() {
            self.threads.max(1)
        } else {
            1
        }
    }
}

/// Runs one benchmark against an object store
///
/// ## Usage Pattern
///
/// ```rust,no_run
/// # use s3_benchmark::benchmark::{BenchmarkConfig, BenchmarkRunner};
/// # use s3_benchmark::storage::InMemoryStore;
/// # use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let config = BenchmarkConfig {
///     n: 100,
///     size: 4096,
///     ..BenchmarkConfig::default()
/// };
/// let runner = BenchmarkRunner::new(config, Arc::new(InMemoryStore::new()));
/// let results = runner.run().await?;
/// println!("p99 = {} ms", results.statistics.p99);
/// # Ok(())
/// # }
/// ```
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    store: Arc<dyn ObjectStore>,
}

impl BenchmarkRunner {
    pub fn new(config: BenchmarkConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Number of units [`run`](Self::run) will start.
    pub fn unit_count(&self) -> usize {
        self.config.unit_count()
    }

    /// Run every unit to completion and aggregate their samples
    ///
    /// ## Returns
    /// - `Ok(BenchmarkResults)`: Statistics over all surviving samples
    /// - `Err(BenchmarkError::Operation)`: The key manifest could not be loaded
    /// - `Err(BenchmarkError::Join)`: A unit panicked
    /// - `Err(BenchmarkError::Statistics)`: No unit recorded a sample
    pub async fn run(&self) -> Result<BenchmarkResults, BenchmarkError> {
        let kind = self.config.operation;
        let units = self.unit_count();

        info!(
            "{}",
            BenchmarkConfigDisplay {
                config: &self.config,
                store: self.store.name(),
                units,
            }
        );

        if !kind.is_multi_threaded() && self.config.threads > 1 {
            warn!(
                "Operation {} does not support multiple threads, using a single thread",
                kind
            );
        }

        let manifest = if kind.requires_key_manifest() {
            let manifest = KeyManifest::load(&self.config.key_file).await?;
            debug!(
                "Loaded {} keys from {:?}",
                manifest.len(),
                self.config.key_file
            );
            Some(Arc::new(manifest))
        } else {
            None
        };

        let ctx = OperationContext {
            store: self.store.clone(),
            bucket: self.config.bucket.clone(),
            n: self.config.n,
            size: self.config.size,
            threads: self.config.threads,
            manifest,
            key_file: self.config.key_file.clone(),
        };

        let operations = (0..units)
            .map(|_| OperationFactory::create(kind, &ctx))
            .collect::<Result<Vec<_>, _>>()?;

        let start = Instant::now();
        let handles: Vec<_> = operations
            .into_iter()
            .map(|mut operation| tokio::spawn(async move { operation.run().await }))
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await?);
        }
        let test_duration = start.elapsed();

        let mut stats = LatencyStats::new();
        let mut failed_units = 0;
        for (unit, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(result) => stats.merge(result.into_stats()),
                Err(e) => {
                    error!("Unit {} of {} failed: {:#}", unit + 1, kind, anyhow::Error::new(e));
                    failed_units += 1;
                }
            }
        }
        let completed_units = units - failed_units;

        let snapshot = stats.snapshot(test_duration)?;
        info!(
            "{} finished: {} samples from {} units ({} failed) in {}",
            kind,
            snapshot.count,
            completed_units,
            failed_units,
            utils::format_duration(test_duration)
        );

        Ok(BenchmarkResults::new(
            self.config.clone(),
            snapshot,
            completed_units,
            failed_units,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OperationError, StatisticsError};
    use crate::storage::InMemoryStore;
    use clap::Parser;
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry;

    fn config(operation: OperationKind, threads: usize, n: usize) -> BenchmarkConfig {
        BenchmarkConfig {
            operation,
            threads,
            n,
            size: 256,
            bucket: "bench".to_string(),
            storage: StorageKind::Memory,
            ..BenchmarkConfig::default()
        }
    }

    #[test]
    fn test_from_args_maps_every_field() {
        let args = Args::try_parse_from([
            "s3-benchmark",
            "-o",
            "upload-and-read",
            "-t",
            "3",
            "-n",
            "7",
            "-s",
            "2048",
            "--endpoint-url",
            "minio:9000",
            "--access-key",
            "AKIA",
            "--secret-key",
            "shh",
            "--use-http",
            "--no-keep-alive",
            "--backend",
            "ceph",
        ])
        .unwrap();

        let config = BenchmarkConfig::from_args(&args).unwrap();
        assert_eq!(config.operation, OperationKind::UploadAndRead);
        assert_eq!(config.threads, 3);
        assert_eq!(config.n, 7);
        assert_eq!(config.size, 2048);
        assert_eq!(config.store.endpoint_url(), "http://minio:9000");
        assert_eq!(config.store.access_key.as_deref(), Some("AKIA"));
        assert!(!config.store.keep_alive);
        assert_eq!(config.backend, "ceph");
    }

    #[test]
    fn test_from_args_rejects_invalid_values() {
        let zero_threads = Args::try_parse_from(["s3-benchmark", "-t", "0"]).unwrap();
        assert!(BenchmarkConfig::from_args(&zero_threads).is_err());

        let zero_n = Args::try_parse_from(["s3-benchmark", "-n", "0"]).unwrap();
        assert!(BenchmarkConfig::from_args(&zero_n).is_err());

        let empty_upload = Args::try_parse_from(["s3-benchmark", "-s", "0"]).unwrap();
        assert!(BenchmarkConfig::from_args(&empty_upload).is_err());

        let empty_clear =
            Args::try_parse_from(["s3-benchmark", "-o", "clear-bucket", "-s", "0"]).unwrap();
        assert!(BenchmarkConfig::from_args(&empty_clear).is_ok());
    }

    #[test]
    fn test_serialized_config_has_no_credentials() {
        let mut config = BenchmarkConfig::default();
        config.store.access_key = Some("AKIA".to_string());
        config.store.secret_key = Some("shh".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"operation\":\"UPLOAD\""));
        assert!(!json.contains("AKIA"));
        assert!(!json.contains("shh"));
    }

    #[test]
    fn test_unit_count_follows_kind() {
        assert_eq!(config(OperationKind::Upload, 4, 1).unit_count(), 4);
        assert_eq!(config(OperationKind::RandomReadMetadata, 2, 1).unit_count(), 2);
        assert_eq!(config(OperationKind::ClearBucket, 4, 1).unit_count(), 1);
        assert_eq!(config(OperationKind::CreateKeyFile, 8, 1).unit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_merges_all_units() {
        let store = InMemoryStore::new().with_latency(Duration::from_millis(5));

        let runner = BenchmarkRunner::new(config(OperationKind::Upload, 3, 4), Arc::new(store.clone()));
        let results = runner.run().await.unwrap();

        assert_eq!(results.statistics.count, 12);
        assert_eq!(results.statistics.min, 5);
        assert_eq!(results.statistics.max, 5);
        assert_eq!(results.completed_units, 3);
        assert_eq!(results.failed_units, 0);
        assert_eq!(store.object_count("bench"), 12);
        // three concurrent units of four sequential 5 ms puts
        assert_eq!(results.test_duration, Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_unit_kind_ignores_extra_threads() {
        let store = InMemoryStore::new();
        let runner = BenchmarkRunner::new(config(OperationKind::CreateBucket, 4, 1), Arc::new(store.clone()));
        assert_eq!(runner.unit_count(), 1);

        let results = runner.run().await.unwrap();
        assert_eq!(results.statistics.count, 1);
        assert_eq!(results.completed_units, 1);
        assert!(store.bucket_exists("bench"));
    }

    /// Collects the level and message of every event it sees.
    #[derive(Clone, Default)]
    struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

    impl<S: Subscriber> Layer<S> for CapturedEvents {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut message = MessageField::default();
            event.record(&mut message);
            self.0.lock().unwrap().push((*event.metadata().level(), message.0));
        }
    }

    #[derive(Default)]
    struct MessageField(String);

    impl Visit for MessageField {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{:?}", value);
            }
        }
    }

    impl CapturedEvents {
        fn warnings(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|(level, _)| *level == Level::WARN)
                .map(|(_, message)| message.clone())
                .collect()
        }
    }

    #[tokio::test]
    async fn test_extra_threads_on_single_unit_kind_are_warned() {
        let events = CapturedEvents::default();
        let _guard = tracing::subscriber::set_default(registry().with(events.clone()));

        let runner = BenchmarkRunner::new(config(OperationKind::CreateBucket, 4, 1), Arc::new(InMemoryStore::new()));
        runner.run().await.unwrap();

        let warnings = events.warnings();
        assert_eq!(warnings.len(), 1, "{:?}", warnings);
        assert!(warnings[0].contains("CREATE_BUCKET does not support multiple threads"));
    }

    #[tokio::test]
    async fn test_multi_threaded_kind_is_not_warned() {
        let events = CapturedEvents::default();
        let _guard = tracing::subscriber::set_default(registry().with(events.clone()));

        let runner = BenchmarkRunner::new(config(OperationKind::Upload, 4, 1), Arc::new(InMemoryStore::new()));
        runner.run().await.unwrap();

        assert!(events.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_all_units_failing_is_a_statistics_error() {
        let store = InMemoryStore::new();
        // bucket does not exist, so DeleteBucket fails
        let runner = BenchmarkRunner::new(config(OperationKind::DeleteBucket, 1, 1), Arc::new(store));

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, BenchmarkError::Statistics(StatisticsError::Empty)));
    }

    #[tokio::test]
    async fn test_missing_manifest_fails_before_any_unit() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(OperationKind::RandomRead, 2, 1);
        cfg.key_file = dir.path().join("missing.txt");

        let runner = BenchmarkRunner::new(cfg, Arc::new(InMemoryStore::new()));
        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, BenchmarkError::Operation(OperationError::Manifest { .. })));
    }
}
