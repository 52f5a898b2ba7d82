use anyhow::Result;
use s3_benchmark::{BenchmarkConfig, BenchmarkRunner, InMemoryStore, OperationKind, StorageKind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn config(operation: OperationKind, threads: usize, n: usize, key_file: &Path) -> BenchmarkConfig {
    BenchmarkConfig {
        operation,
        threads,
        n,
        bucket: "reads".to_string(),
        key_file: key_file.to_path_buf(),
        storage: StorageKind::Memory,
        ..BenchmarkConfig::default()
    }
}

/// CREATE_KEY_FILE followed by both random-read kinds over the same manifest.
#[tokio::test(start_paused = true)]
async fn key_file_feeds_random_reads() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let key_file = dir.path().join("keys.txt");

    let store = InMemoryStore::new()
        .with_page_size(5)
        .with_latency(Duration::from_millis(4));
    for i in 0..12 {
        store.insert("reads", &format!("k{i:02}"), vec![7u8; 100]);
    }
    let store = Arc::new(store);

    let listing = BenchmarkRunner::new(
        config(OperationKind::CreateKeyFile, 1, 12, &key_file),
        store.clone(),
    )
    .run()
    .await?;
    // three pages of 4 ms each, timed as one sample
    assert_eq!(listing.statistics.count, 1);
    assert_eq!(listing.statistics.max, 12);

    let reads = BenchmarkRunner::new(config(OperationKind::RandomRead, 3, 5, &key_file), store.clone())
        .run()
        .await?;
    assert_eq!(reads.statistics.count, 15);
    assert_eq!(reads.statistics.min, 4);
    assert_eq!(reads.failed_units, 0);

    let heads = BenchmarkRunner::new(
        config(OperationKind::RandomReadMetadata, 2, 5, &key_file),
        store,
    )
    .run()
    .await?;
    assert_eq!(heads.statistics.count, 10);
    assert_eq!(heads.statistics.avg, 4.0);
    Ok(())
}

/// Keys in the manifest that the bucket no longer has fail the reading unit.
#[tokio::test]
async fn stale_manifest_key_fails_unit() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let key_file = dir.path().join("keys.txt");
    std::fs::write(&key_file, "gone\n")?;

    let store = Arc::new(InMemoryStore::new());
    let err = BenchmarkRunner::new(config(OperationKind::RandomRead, 2, 3, &key_file), store)
        .run()
        .await;

    assert!(err.is_err());
    Ok(())
}
