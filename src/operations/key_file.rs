use async_trait::async_trait;
use tokio::time::Instant;
use tracing::info;

use super::{list_keys, BenchmarkOperation, OperationContext, OperationKind, OperationResult};
use crate::error::OperationError;
use crate::manifest::KeyManifest;
use crate::metrics::LatencyStats;

/// Lists up to `n` keys of the bucket and writes them to the key file.
///
/// Only the listing is timed, as one sample; writing the file is not.
pub struct CreateKeyFile {
    ctx: OperationContext,
}

impl CreateKeyFile {
    pub fn new(ctx: OperationContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl BenchmarkOperation for CreateKeyFile {
    fn kind(&self) -> OperationKind {
        OperationKind::CreateKeyFile
    }

    async fn run(&mut self) -> Result<OperationResult, OperationError> {
        let OperationContext {
            store,
            bucket,
            n,
            key_file,
            ..
        } = &self.ctx;
        info!("Create key file: bucket={}, n={}, file={}", bucket, n, key_file.display());

        let mut stats = LatencyStats::new();
        let start = Instant::now();
        let keys = list_keys(store.as_ref(), bucket, *n).await?;
        stats.add_value(start.elapsed());

        KeyManifest::write(key_file, &keys).await?;
        info!("Wrote {} keys to {}", keys.len(), key_file.display());

        Ok(OperationResult::new(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, seed_objects};
    use super::*;
    use crate::storage::InMemoryStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_listed_keys() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryStore::new().with_page_size(4);
        seed_objects(&store, 10);

        let mut ctx = context(&store, 6, 0, 1);
        ctx.key_file = dir.path().join("keys.txt");

        let result = CreateKeyFile::new(ctx.clone()).run().await.unwrap();
        assert_eq!(result.stats().len(), 1);

        let manifest = KeyManifest::load(&ctx.key_file).await.unwrap();
        assert_eq!(manifest.len(), 6);
        assert_eq!(manifest.get(5), Some("obj-0005"));
    }
}
