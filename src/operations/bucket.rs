use async_trait::async_trait;
use tokio::time::Instant;
use tracing::info;

use super::{BenchmarkOperation, OperationContext, OperationKind, OperationResult};
use crate::error::OperationError;
use crate::metrics::LatencyStats;

/// Times a single `create_bucket` call.
pub struct CreateBucket {
    ctx: OperationContext,
}

impl CreateBucket {
    pub fn new(ctx: OperationContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl BenchmarkOperation for CreateBucket {
    fn kind(&self) -> OperationKind {
        OperationKind::CreateBucket
    }

    async fn run(&mut self) -> Result<OperationResult, OperationError> {
        let bucket = &self.ctx.bucket;
        info!("Create bucket: {}", bucket);

        let mut stats = LatencyStats::new();
        let start = Instant::now();
        self.ctx
            .store
            .create_bucket(bucket)
            .await
            .map_err(|e| OperationError::storage("create_bucket", bucket, e))?;
        stats.add_value(start.elapsed());

        Ok(OperationResult::new(stats))
    }
}

/// Times a single `delete_bucket` call.
pub struct DeleteBucket {
    ctx: OperationContext,
}

impl DeleteBucket {
    pub fn new(ctx: OperationContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl BenchmarkOperation for DeleteBucket {
    fn kind(&self) -> OperationKind {
        OperationKind::DeleteBucket
    }

    async fn run(&mut self) -> Result<OperationResult, OperationError> {
        let bucket = &self.ctx.bucket;
        info!("Delete bucket: {}", bucket);

        let mut stats = LatencyStats::new();
        let start = Instant::now();
        self.ctx
            .store
            .delete_bucket(bucket)
            .await
            .map_err(|e| OperationError::storage("delete_bucket", bucket, e))?;
        stats.add_value(start.elapsed());

        Ok(OperationResult::new(stats))
    }
}
