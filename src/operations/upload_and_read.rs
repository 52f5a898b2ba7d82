use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{log_progress, BenchmarkOperation, OperationContext, OperationKind, OperationResult};
use crate::error::OperationError;
use crate::metrics::LatencyStats;
use crate::payload::{sha256_hex, RandomPayload};

/// Uploads a generated object, reads it back and checks its SHA-256.
///
/// The expected digest comes from a second generator with the same seed and
/// is computed before the timer starts, so no copy of the upload is kept and
/// only the PUT plus the full GET land in the sample. A mismatch is logged,
/// not fatal.
pub struct UploadAndRead {
    ctx: OperationContext,
    stats: LatencyStats,
    mismatches: usize,
}

impl UploadAndRead {
    pub fn new(ctx: OperationContext) -> Self {
        Self {
            ctx,
            stats: LatencyStats::new(),
            mismatches: 0,
        }
    }

    /// Objects whose downloaded content did not verify.
    pub fn mismatches(&self) -> usize {
        self.mismatches
    }
}

#[async_trait]
impl BenchmarkOperation for UploadAndRead {
    fn kind(&self) -> OperationKind {
        OperationKind::UploadAndRead
    }

    async fn run(&mut self) -> Result<OperationResult, OperationError> {
        let OperationContext {
            store, bucket, n, size, ..
        } = &self.ctx;
        info!("Upload and read: n={}, size={} bytes", n, size);

        for i in 0..*n {
            let key = Uuid::new_v4().to_string();
            let seed: u64 = rand::random();
            debug!("Uploading object: {}", key);
            let expected = RandomPayload::new(*size, seed).digest();

            let start = Instant::now();
            store
                .put_object(bucket, &key, Box::new(RandomPayload::new(*size, seed)), *size)
                .await
                .map_err(|e| OperationError::storage("put_object", &key, e))?;

            let mut body = store
                .get_object(bucket, &key)
                .await
                .map_err(|e| OperationError::storage("get_object", &key, e))?;

            let actual = sha256_hex(&mut body).await;
            let elapsed = start.elapsed();

            match actual {
                Ok(actual) => {
                    if actual != expected {
                        warn!(
                            "Inconsistent upload-read for '{}': expected {}, got {}",
                            key, expected, actual
                        );
                        self.mismatches += 1;
                    }
                }
                Err(e) => {
                    warn!("Could not read back object '{}': {}", key, e);
                    self.mismatches += 1;
                }
            }

            debug!("Time = {} ms", elapsed.as_millis());
            self.stats.add_value(elapsed);
            log_progress(i + 1, *n);
        }

        if self.mismatches > 0 {
            warn!("{} of {} objects failed verification", self.mismatches, n);
        }
        Ok(OperationResult::new(std::mem::take(&mut self.stats)))
    }
}
