//! # Metrics Reporting
//!
//! After a run the statistics snapshot is turned into named metric points
//! and posted to a KairosDB-compatible endpoint.
//!
//! ## Delivery Policy
//!
//! Points go through a [`MetricsBatcher`] that buffers them and sends one
//! batch whenever the buffer reaches its threshold (100 by default) or when
//! flushed explicitly. A batch is sent once: the buffer is cleared whether
//! or not the send succeeded, and failures are only logged. Reporting can
//! therefore never change or fail a completed benchmark.
//!
//! ## Wire Format
//!
//! `POST <base>/api/v1/datapoints` with `Content-Type: application/json` and
//! a JSON array body:
//!
//! ```json
//! [{"name": "core.engineering.s3.ops", "timestamp": 1700000000000,
//!   "value": 98.5, "tags": {"op": "UPLOAD", "threads": "T4"}}]
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::benchmark::BenchmarkConfig;
use crate::error::ReportingError;
use crate::metrics::StatisticsSnapshot;
use crate::results::BenchmarkResults;

/// One named sample posted to the metrics store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub name: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
}

/// Destination for batches of metric points.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn send(&self, points: &[MetricPoint]) -> Result<(), ReportingError>;
}

/// HTTP sink for the KairosDB REST API.
#[derive(Debug, Clone)]
pub struct KairosDbSink {
    client: reqwest::Client,
    url: String,
}

impl KairosDbSink {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/api/v1/datapoints", base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MetricsSink for KairosDbSink {
    async fn send(&self, points: &[MetricPoint]) -> Result<(), ReportingError> {
        debug!("Posting {} metric points to {}", points.len(), self.url);
        let response = self.client.post(&self.url).json(points).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportingError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Buffers metric points and sends them to a sink in batches.
pub struct MetricsBatcher<S: MetricsSink> {
    sink: S,
    buffer: Vec<MetricPoint>,
    batch_size: usize,
}

impl<S: MetricsSink> MetricsBatcher<S> {
    pub fn new(sink: S) -> Self {
        Self::with_batch_size(sink, crate::defaults::BATCH_SIZE)
    }

    pub fn with_batch_size(sink: S, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            buffer: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    /// Buffer a point, flushing once the buffer is full.
    pub async fn add_point(&mut self, point: MetricPoint) -> Result<(), ReportingError> {
        self.buffer.push(point);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Send everything buffered as one batch. The buffer is emptied even if
    /// the send fails; an empty buffer sends nothing.
    pub async fn flush(&mut self) -> Result<(), ReportingError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);
        self.sink.send(&batch).await
    }

    /// Points waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Tags attached to every point of a run.
pub fn run_tags(config: &BenchmarkConfig) -> BTreeMap<String, String> {
    let op = config.operation.to_string();
    let mut tags = BTreeMap::new();
    tags.insert("backend".to_string(), config.backend.clone());
    tags.insert("size".to_string(), format!("{}{}", op, config.size));
    tags.insert("op".to_string(), op);
    tags.insert("source".to_string(), config.source.clone());
    tags.insert("threads".to_string(), format!("T{}", config.threads));
    tags
}

/// The six points published per run, in publishing order.
pub fn snapshot_points(
    snapshot: &StatisticsSnapshot,
    namespace: &str,
    tags: &BTreeMap<String, String>,
    timestamp: i64,
) -> Vec<MetricPoint> {
    let point = |suffix: &str, value: f64| MetricPoint {
        name: format!("{}.{}", namespace, suffix),
        timestamp,
        value,
        tags: tags.clone(),
    };

    vec![
        point("operation_time.avg", snapshot.avg),
        point("operation_time.min", snapshot.min as f64),
        point("operation_time.max", snapshot.max as f64),
        point("operation_time.p99", snapshot.p99 as f64),
        point("operation_time.p95", snapshot.p95 as f64),
        point("ops", snapshot.ops_per_second),
    ]
}

/// Publish a run's statistics through `sink`.
///
/// Returns whether every batch was delivered. Failures are logged and
/// otherwise ignored.
pub async fn report<S: MetricsSink>(results: &BenchmarkResults, config: &BenchmarkConfig, sink: S) -> bool {
    let tags = run_tags(config);
    let points = snapshot_points(
        &results.statistics,
        &config.namespace,
        &tags,
        results.timestamp.timestamp_millis(),
    );
    let count = points.len();

    let mut batcher = MetricsBatcher::new(sink);
    let mut delivered = true;
    for point in points {
        if let Err(e) = batcher.add_point(point).await {
            warn!("Dropping metrics batch: {}", e);
            delivered = false;
        }
    }
    if let Err(e) = batcher.flush().await {
        warn!("Dropping metrics batch: {}", e);
        delivered = false;
    }

    if delivered {
        info!("Reported {} metric points", count);
    }
    delivered
}
