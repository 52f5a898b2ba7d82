use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::{log_progress, BenchmarkOperation, OperationContext, OperationKind, OperationResult};
use crate::error::OperationError;
use crate::metrics::LatencyStats;
use crate::payload::RandomPayload;

/// Uploads `n` generated objects under fresh UUID keys.
pub struct Upload {
    ctx: OperationContext,
    stats: LatencyStats,
}

impl Upload {
    pub fn new(ctx: OperationContext) -> Self {
        Self {
            ctx,
            stats: LatencyStats::new(),
        }
    }
}

#[async_trait]
impl BenchmarkOperation for Upload {
    fn kind(&self) -> OperationKind {
        OperationKind::Upload
    }

    async fn run(&mut self) -> Result<OperationResult, OperationError> {
        let OperationContext {
            store, bucket, n, size, ..
        } = &self.ctx;
        info!("Upload: n={}, size={} bytes", n, size);

        for i in 0..*n {
            let key = Uuid::new_v4().to_string();
            let payload = RandomPayload::new(*size, rand::random());
            debug!("Uploading object: {}", key);

            let start = Instant::now();
            store
                .put_object(bucket, &key, Box::new(payload), *size)
                .await
                .map_err(|e| OperationError::storage("put_object", &key, e))?;
            let elapsed = start.elapsed();

            debug!("Time = {} ms", elapsed.as_millis());
            self.stats.add_value(elapsed);
            log_progress(i + 1, *n);
        }

        Ok(OperationResult::new(std::mem::take(&mut self.stats)))
    }
}
