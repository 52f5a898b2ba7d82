//! Bucket clearing.
//!
//! With one configured thread the unit walks the listing page by page and
//! deletes as it goes. With `T > 1` it first enumerates up to `n` keys, then
//! fans the deletes out as sub-tasks bounded by a semaphore of `T` permits.
//! Every sub-task records into a private aggregator that is merged once all
//! of them have joined; a failed delete loses only its own sample.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{list_keys, BenchmarkOperation, OperationContext, OperationKind, OperationResult, PROGRESS_INTERVAL};
use crate::error::OperationError;
use crate::metrics::LatencyStats;

pub struct ClearBucket {
    ctx: OperationContext,
}

impl ClearBucket {
    pub fn new(ctx: OperationContext) -> Self {
        Self { ctx }
    }

    async fn clear_sequential(&self) -> Result<LatencyStats, OperationError> {
        let OperationContext { store, bucket, n, .. } = &self.ctx;
        let mut stats = LatencyStats::new();
        let mut deleted = 0;
        let mut continuation = None;

        'pages: loop {
            let listing = store
                .list_objects(bucket, continuation)
                .await
                .map_err(|e| OperationError::storage("list_objects", bucket, e))?;

            for key in listing.keys {
                debug!("Delete object: {}, #deleted {}", key, deleted);

                let start = Instant::now();
                store
                    .delete_object(bucket, &key)
                    .await
                    .map_err(|e| OperationError::storage("delete_object", &key, e))?;
                let elapsed = start.elapsed();

                debug!("Time = {} ms", elapsed.as_millis());
                stats.add_value(elapsed);

                deleted += 1;
                if deleted >= *n {
                    break 'pages;
                }
                if deleted % PROGRESS_INTERVAL == 0 {
                    info!("Objects deleted so far: {}", deleted);
                }
            }

            match listing.next_continuation {
                Some(next) if listing.is_truncated => continuation = Some(next),
                _ => break,
            }
        }

        info!("Objects deleted: {}", deleted);
        Ok(stats)
    }

    async fn clear_parallel(&self) -> Result<LatencyStats, OperationError> {
        let OperationContext {
            store,
            bucket,
            n,
            threads,
            ..
        } = &self.ctx;

        let keys = list_keys(store.as_ref(), bucket, *n).await?;
        info!("Objects scheduled: {}", keys.len());

        let permits = Arc::new(Semaphore::new(*threads));
        let mut tasks = JoinSet::new();
        for key in keys {
            let store = Arc::clone(store);
            let bucket = bucket.clone();
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                // the semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();

                let mut stats = LatencyStats::new();
                let start = Instant::now();
                store
                    .delete_object(&bucket, &key)
                    .await
                    .map_err(|e| OperationError::storage("delete_object", &key, e))?;
                stats.add_value(start.elapsed());
                Ok::<_, OperationError>(stats)
            });
        }

        let mut merged = LatencyStats::new();
        let mut deleted = 0;
        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(stats)) => {
                    merged.merge(stats);
                    deleted += 1;
                    if deleted % PROGRESS_INTERVAL == 0 {
                        info!("Objects deleted so far: {}", deleted);
                    }
                }
                Ok(Err(e)) => {
                    failed += 1;
                    warn!("{:#}", anyhow::Error::from(e));
                }
                Err(e) => {
                    failed += 1;
                    error!("Delete task aborted: {}", e);
                }
            }
        }

        if failed > 0 {
            warn!("Objects deleted: {}, failed: {}", deleted, failed);
        } else {
            info!("Objects deleted: {}", deleted);
        }
        Ok(merged)
    }
}

#[async_trait]
impl BenchmarkOperation for ClearBucket {
    fn kind(&self) -> OperationKind {
        OperationKind::ClearBucket
    }

    async fn run(&mut self) -> Result<OperationResult, OperationError> {
        info!(
            "Clear bucket: bucket={}, n={}, threads={}",
            self.ctx.bucket, self.ctx.n, self.ctx.threads
        );

        let stats = if self.ctx.threads > 1 {
            self.clear_parallel().await?
        } else {
            self.clear_sequential().await?
        };
        Ok(OperationResult::new(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, seed_objects};
    use super::*;
    use crate::storage::InMemoryStore;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sequential_follows_pages_until_n() {
        let store = InMemoryStore::new().with_page_size(2);
        seed_objects(&store, 7);

        let result = ClearBucket::new(context(&store, 5, 0, 1)).run().await.unwrap();
        assert_eq!(result.stats().len(), 5);
        assert_eq!(store.object_count("bench"), 2);
    }

    #[tokio::test]
    async fn test_sequential_stops_when_listing_ends() {
        let store = InMemoryStore::new().with_page_size(3);
        seed_objects(&store, 4);

        let result = ClearBucket::new(context(&store, 100, 0, 1)).run().await.unwrap();
        assert_eq!(result.stats().len(), 4);
        assert_eq!(store.object_count("bench"), 0);
    }

    #[tokio::test]
    async fn test_parallel_deletes_across_pages() {
        let store = InMemoryStore::new().with_page_size(2);
        seed_objects(&store, 9);

        let result = ClearBucket::new(context(&store, 6, 0, 3)).run().await.unwrap();
        assert_eq!(result.stats().len(), 6);
        assert_eq!(store.object_count("bench"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_width_is_bounded_by_threads() {
        let store = InMemoryStore::new().with_latency(Duration::from_millis(10));
        seed_objects(&store, 8);

        let start = Instant::now();
        let result = ClearBucket::new(context(&store, 8, 0, 4)).run().await.unwrap();

        // one listing call, then 8 deletes in two waves of 4
        assert_eq!(start.elapsed(), Duration::from_millis(30));
        assert_eq!(result.stats().samples(), &[10; 8]);
    }

    #[tokio::test]
    async fn test_failed_deletes() {
        let store = InMemoryStore::new();
        seed_objects(&store, 3);
        store.fail_deletes();

        let err = ClearBucket::new(context(&store, 3, 0, 1)).run().await.unwrap_err();
        assert!(matches!(err, OperationError::Storage { action: "delete_object", .. }));

        // fan-out drops the failed samples instead of failing the unit
        let result = ClearBucket::new(context(&store, 3, 0, 2)).run().await.unwrap();
        assert!(result.stats().is_empty());
        assert_eq!(store.object_count("bench"), 3);
    }
}
