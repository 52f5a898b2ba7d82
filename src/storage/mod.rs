//! Object-storage collaborator.
//!
//! The benchmark engine never talks to a storage service directly; every
//! operation unit goes through the [`ObjectStore`] trait. Two adapters are
//! provided:
//!
//! - [`S3Store`] speaks the S3 protocol through the `rust-s3` client and is
//!   what real runs use.
//! - [`InMemoryStore`] keeps objects in a map and can inject latency and
//!   failures, which makes runs reproducible in tests.
//!
//! Errors cross this boundary as [`anyhow::Error`]; operation units wrap
//! them in [`OperationError`](crate::error::OperationError) together with
//! the action that failed.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncRead;

pub mod in_memory;
pub mod s3_compatible;

pub use in_memory::InMemoryStore;
pub use s3_compatible::{S3Store, S3StoreConfig};

/// A streamed object body.
pub type ObjectBody = Box<dyn AsyncRead + Send + Unpin>;

/// One page of a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    pub keys: Vec<String>,
    pub is_truncated: bool,
    /// Cursor to pass to the next `list_objects` call.
    pub next_continuation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_length: u64,
}

/// Storage operations a benchmark unit can issue.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `length` bytes read from `body` under `key`.
    async fn put_object(&self, bucket: &str, key: &str, body: ObjectBody, length: u64) -> Result<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody>;

    async fn get_object_metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// List one page of keys, starting at `continuation` if given.
    async fn list_objects(&self, bucket: &str, continuation: Option<String>) -> Result<ObjectListing>;

    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Adapter name for logs and the run banner.
    fn name(&self) -> &'static str;
}

/// Storage adapter selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// S3-compatible endpoint
    S3,
    /// Process-local map, for dry runs
    Memory,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::S3 => write!(f, "s3"),
            StorageKind::Memory => write!(f, "memory"),
        }
    }
}

/// Factory for the configured storage adapter.
pub struct StoreFactory;

impl StoreFactory {
    pub fn create(kind: StorageKind, config: &S3StoreConfig) -> Result<Arc<dyn ObjectStore>> {
        match kind {
            StorageKind::S3 => Ok(Arc::new(S3Store::new(config)?)),
            StorageKind::Memory => Ok(Arc::new(InMemoryStore::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_memory_store() {
        let store = StoreFactory::create(StorageKind::Memory, &S3StoreConfig::default()).unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_factory_builds_s3_store_without_network() {
        let config = S3StoreConfig {
            endpoint: "localhost:9000".to_string(),
            use_http: true,
            path_style: true,
            access_key: Some("minio".to_string()),
            secret_key: Some("minio123".to_string()),
            ..S3StoreConfig::default()
        };
        let store = StoreFactory::create(StorageKind::S3, &config).unwrap();
        assert_eq!(store.name(), "s3");
    }
}
