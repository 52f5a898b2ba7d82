//! In-memory object store.
//!
//! Objects live in a per-bucket ordered map behind an `Arc<Mutex<..>>`, so
//! the store is [`Clone`]: a test can keep one handle for inspection while
//! the benchmark owns another. Listing is paginated with a configurable page
//! size and uses the last returned key as continuation cursor.
//!
//! Latency and failures can be injected:
//!
//! - [`InMemoryStore::with_latency`] sleeps on every call (`tokio::time`, so
//!   a paused test clock makes the delay exact);
//! - [`InMemoryStore::fail_put_call`] fails the k-th `put_object` overall;
//! - [`InMemoryStore::fail_deletes`] fails every `delete_object`.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use super::{ObjectBody, ObjectListing, ObjectMetadata, ObjectStore};

const DEFAULT_PAGE_SIZE: usize = 1000;

type Buckets = HashMap<String, BTreeMap<String, Bytes>>;

#[derive(Debug, Clone)]
pub struct InMemoryStore {
    buckets: Arc<Mutex<Buckets>>,
    latency: Duration,
    page_size: usize,
    fail_put_call: Option<usize>,
    fail_deletes: Arc<AtomicBool>,
    put_calls: Arc<AtomicUsize>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            latency: Duration::ZERO,
            page_size: DEFAULT_PAGE_SIZE,
            fail_put_call: None,
            fail_deletes: Arc::new(AtomicBool::new(false)),
            put_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Return at most `page_size` keys per listing call.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make the `call`-th `put_object` (1-based, counted across all callers) fail.
    pub fn fail_put_call(mut self, call: usize) -> Self {
        self.fail_put_call = Some(call);
        self
    }

    /// Make every subsequent `delete_object` fail.
    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    /// Store an object directly, bypassing latency and failure injection.
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.lock()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.into());
    }

    pub fn get_stored(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.lock().get(bucket).and_then(|objects| objects.get(key).cloned())
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.lock().get(bucket).map_or(0, |objects| objects.len())
    }

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.lock().contains_key(bucket)
    }

    /// Number of `put_object` calls seen so far, failed ones included.
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put_object(&self, bucket: &str, key: &str, mut body: ObjectBody, length: u64) -> Result<()> {
        let call = self.put_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.delay().await;

        if self.fail_put_call == Some(call) {
            bail!("injected failure on put call {call}");
        }

        let mut data = Vec::with_capacity(length as usize);
        body.read_to_end(&mut data).await?;
        if data.len() as u64 != length {
            bail!("body for '{key}' was {} bytes, expected {length}", data.len());
        }

        self.insert(bucket, key, data);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        self.delay().await;
        let data = self
            .get_stored(bucket, key)
            .ok_or_else(|| anyhow!("no such key '{key}' in bucket '{bucket}'"))?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn get_object_metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        self.delay().await;
        let data = self
            .get_stored(bucket, key)
            .ok_or_else(|| anyhow!("no such key '{key}' in bucket '{bucket}'"))?;
        Ok(ObjectMetadata {
            content_length: data.len() as u64,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.delay().await;
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("injected failure deleting '{key}'");
        }
        if let Some(objects) = self.lock().get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, continuation: Option<String>) -> Result<ObjectListing> {
        self.delay().await;
        let buckets = self.lock();
        let Some(objects) = buckets.get(bucket) else {
            return Ok(ObjectListing::default());
        };

        let start = match &continuation {
            Some(after) => Bound::Excluded(after.clone()),
            None => Bound::Unbounded,
        };
        let mut remaining = objects.range((start, Bound::Unbounded)).map(|(k, _)| k);
        let keys: Vec<String> = remaining.by_ref().take(self.page_size).cloned().collect();
        let is_truncated = remaining.next().is_some();
        let next_continuation = if is_truncated { keys.last().cloned() } else { None };

        Ok(ObjectListing {
            keys,
            is_truncated,
            next_continuation,
        })
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.delay().await;
        let mut buckets = self.lock();
        if buckets.contains_key(bucket) {
            bail!("bucket '{bucket}' already exists");
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.delay().await;
        let mut buckets = self.lock();
        match buckets.get(bucket).map(|objects| objects.len()) {
            None => bail!("no such bucket '{bucket}'"),
            Some(count) if count > 0 => {
                bail!("bucket '{bucket}' is not empty ({count} objects)")
            }
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
