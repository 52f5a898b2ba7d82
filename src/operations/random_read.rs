use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{log_progress, BenchmarkOperation, OperationContext, OperationKind, OperationResult};
use crate::error::OperationError;
use crate::manifest::KeyManifest;
use crate::metrics::LatencyStats;

/// Reads random keys drawn from the key manifest.
///
/// In metadata mode only `get_object_metadata` is timed; otherwise the
/// timed span is `get_object` plus draining the body.
pub struct RandomRead {
    ctx: OperationContext,
    manifest: Arc<KeyManifest>,
    metadata_only: bool,
    stats: LatencyStats,
}

impl RandomRead {
    pub fn new(ctx: OperationContext, manifest: Arc<KeyManifest>) -> Self {
        Self {
            ctx,
            manifest,
            metadata_only: false,
            stats: LatencyStats::new(),
        }
    }

    pub fn metadata_only(ctx: OperationContext, manifest: Arc<KeyManifest>) -> Self {
        Self {
            metadata_only: true,
            ..Self::new(ctx, manifest)
        }
    }

    async fn read_once(&self, key: &str) -> Result<u64, OperationError> {
        let OperationContext { store, bucket, .. } = &self.ctx;

        if self.metadata_only {
            let metadata = store
                .get_object_metadata(bucket, key)
                .await
                .map_err(|e| OperationError::storage("get_object_metadata", key, e))?;
            return Ok(metadata.content_length);
        }

        let mut body = store
            .get_object(bucket, key)
            .await
            .map_err(|e| OperationError::storage("get_object", key, e))?;
        let read = tokio::io::copy(&mut body, &mut tokio::io::sink())
            .await
            .map_err(|e| OperationError::storage("read_object", key, e.into()))?;
        Ok(read)
    }
}

#[async_trait]
impl BenchmarkOperation for RandomRead {
    fn kind(&self) -> OperationKind {
        if self.metadata_only {
            OperationKind::RandomReadMetadata
        } else {
            OperationKind::RandomRead
        }
    }

    async fn run(&mut self) -> Result<OperationResult, OperationError> {
        let n = self.ctx.n;
        info!(
            "{}: n={}, keys={}",
            self.kind(),
            n,
            self.manifest.len()
        );

        for i in 0..n {
            let key = self.manifest.random_key(&mut rand::thread_rng()).to_string();
            debug!("Reading object: {}", key);

            let start = Instant::now();
            let bytes = self.read_once(&key).await?;
            let elapsed = start.elapsed();

            debug!("Time = {} ms ({} bytes)", elapsed.as_millis(), bytes);
            self.stats.add_value(elapsed);
            log_progress(i + 1, n);
        }

        Ok(OperationResult::new(std::mem::take(&mut self.stats)))
    }
}
