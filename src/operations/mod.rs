//! # Operation Units
//!
//! An operation unit is one independently schedulable worker that runs a
//! benchmark kind `n` times against the object store and records every
//! iteration's elapsed time into its own [`LatencyStats`]. The orchestrator
//! spawns `T` of them for multi-threaded kinds and exactly one otherwise.
//!
//! ## Kinds
//!
//! | Kind | Units | Timed span |
//! |------|-------|------------|
//! | `UPLOAD` | T | one `put_object` of a generated payload |
//! | `UPLOAD_AND_READ` | T | put, get and SHA-256 verification |
//! | `RANDOM_READ` | T | `get_object` of a manifest key, body drained |
//! | `RANDOM_READ_METADATA` | T | `get_object_metadata` of a manifest key |
//! | `CLEAR_BUCKET` | 1 | each `delete_object` |
//! | `CREATE_BUCKET` | 1 | one `create_bucket` |
//! | `DELETE_BUCKET` | 1 | one `delete_bucket` |
//! | `CREATE_KEY_FILE` | 1 | the paginated listing |
//!
//! ## Failure Model
//!
//! A collaborator failure aborts the unit with [`OperationError`]; nothing
//! is retried. Samples already recorded by a failed unit are discarded by
//! the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::OperationError;
use crate::manifest::KeyManifest;
use crate::metrics::LatencyStats;
use crate::storage::ObjectStore;

pub mod bucket;
pub mod clear_bucket;
pub mod key_file;
pub mod random_read;
pub mod upload;
pub mod upload_and_read;

pub use bucket::{CreateBucket, DeleteBucket};
pub use clear_bucket::ClearBucket;
pub use key_file::CreateKeyFile;
pub use random_read::RandomRead;
pub use upload::Upload;
pub use upload_and_read::UploadAndRead;

/// Iterations between progress log lines.
pub const PROGRESS_INTERVAL: usize = 1000;

/// Benchmark kinds that can be selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    /// Upload generated objects under random keys
    Upload,
    /// Upload, read back and verify generated objects
    UploadAndRead,
    /// Read random keys from the key file
    RandomRead,
    /// Fetch metadata of random keys from the key file
    RandomReadMetadata,
    /// Delete up to n objects from the bucket
    ClearBucket,
    /// Create the bucket
    CreateBucket,
    /// Delete the (empty) bucket
    DeleteBucket,
    /// List up to n keys and write them to the key file
    CreateKeyFile,
}

impl OperationKind {
    /// Whether the orchestrator may run more than one unit of this kind.
    pub fn is_multi_threaded(self) -> bool {
        matches!(
            self,
            OperationKind::Upload
                | OperationKind::UploadAndRead
                | OperationKind::RandomRead
                | OperationKind::RandomReadMetadata
        )
    }

    /// Whether units of this kind draw keys from the key manifest.
    pub fn requires_key_manifest(self) -> bool {
        matches!(
            self,
            OperationKind::RandomRead | OperationKind::RandomReadMetadata
        )
    }

    /// Whether units of this kind generate payloads of the configured size.
    pub fn uploads_payload(self) -> bool {
        matches!(self, OperationKind::Upload | OperationKind::UploadAndRead)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::Upload => "UPLOAD",
            OperationKind::UploadAndRead => "UPLOAD_AND_READ",
            OperationKind::RandomRead => "RANDOM_READ",
            OperationKind::RandomReadMetadata => "RANDOM_READ_METADATA",
            OperationKind::ClearBucket => "CLEAR_BUCKET",
            OperationKind::CreateBucket => "CREATE_BUCKET",
            OperationKind::DeleteBucket => "DELETE_BUCKET",
            OperationKind::CreateKeyFile => "CREATE_KEY_FILE",
        };
        write!(f, "{}", name)
    }
}

/// Everything a unit needs from the run configuration.
#[derive(Clone)]
pub struct OperationContext {
    pub store: Arc<dyn ObjectStore>,
    pub bucket: String,
    /// Iterations per unit (objects to delete / keys to list for single-unit kinds)
    pub n: usize,
    /// Payload size in bytes
    pub size: u64,
    /// Configured worker count; `ClearBucket` uses it for its fan-out width
    pub threads: usize,
    /// Preloaded manifest, present for random-read kinds
    pub manifest: Option<Arc<KeyManifest>>,
    pub key_file: PathBuf,
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("store", &self.store.name())
            .field("bucket", &self.bucket)
            .field("n", &self.n)
            .field("size", &self.size)
            .field("threads", &self.threads)
            .field("manifest_keys", &self.manifest.as_ref().map(|m| m.len()))
            .field("key_file", &self.key_file)
            .finish()
    }
}

/// The samples recorded by exactly one unit.
#[derive(Debug, Default)]
pub struct OperationResult {
    stats: LatencyStats,
}

impl OperationResult {
    pub fn new(stats: LatencyStats) -> Self {
        Self { stats }
    }

    pub fn stats(&self) -> &LatencyStats {
        &self.stats
    }

    pub fn into_stats(self) -> LatencyStats {
        self.stats
    }
}

/// One benchmark worker.
#[async_trait]
pub trait BenchmarkOperation: Send {
    fn kind(&self) -> OperationKind;

    fn supports_multi_threading(&self) -> bool {
        self.kind().is_multi_threaded()
    }

    /// Run all iterations and hand back the recorded samples.
    async fn run(&mut self) -> Result<OperationResult, OperationError>;
}

/// Maps an [`OperationKind`] to its unit type.
pub struct OperationFactory;

impl OperationFactory {
    pub fn create(
        kind: OperationKind,
        ctx: &OperationContext,
    ) -> Result<Box<dyn BenchmarkOperation>, OperationError> {
        let ctx = ctx.clone();
        Ok(match kind {
            OperationKind::Upload => Box::new(Upload::new(ctx)),
            OperationKind::UploadAndRead => Box::new(UploadAndRead::new(ctx)),
            OperationKind::RandomRead => {
                let manifest = Self::manifest(&ctx)?;
                Box::new(RandomRead::new(ctx, manifest))
            }
            OperationKind::RandomReadMetadata => {
                let manifest = Self::manifest(&ctx)?;
                Box::new(RandomRead::metadata_only(ctx, manifest))
            }
            OperationKind::ClearBucket => Box::new(ClearBucket::new(ctx)),
            OperationKind::CreateBucket => Box::new(CreateBucket::new(ctx)),
            OperationKind::DeleteBucket => Box::new(DeleteBucket::new(ctx)),
            OperationKind::CreateKeyFile => Box::new(CreateKeyFile::new(ctx)),
        })
    }

    fn manifest(ctx: &OperationContext) -> Result<Arc<KeyManifest>, OperationError> {
        ctx.manifest.clone().ok_or_else(|| OperationError::Manifest {
            path: ctx.key_file.clone(),
            reason: "key manifest was not loaded".to_string(),
        })
    }
}

/// Log a progress line every [`PROGRESS_INTERVAL`] completed iterations.
pub(crate) fn log_progress(done: usize, n: usize) {
    if done > 0 && done % PROGRESS_INTERVAL == 0 {
        info!("Progress: {} of {}", done, n);
    }
}

/// Page through the bucket listing until `limit` keys are collected or the
/// listing ends.
pub(crate) async fn list_keys(
    store: &dyn ObjectStore,
    bucket: &str,
    limit: usize,
) -> Result<Vec<String>, OperationError> {
    let mut keys = Vec::new();
    let mut continuation = None;

    loop {
        let listing = store
            .list_objects(bucket, continuation)
            .await
            .map_err(|e| OperationError::storage("list_objects", bucket, e))?;

        let take = limit - keys.len();
        keys.extend(listing.keys.into_iter().take(take));
        if keys.len() % PROGRESS_INTERVAL == 0 && !keys.is_empty() {
            info!("Keys listed so far: {}", keys.len());
        }

        match listing.next_continuation {
            Some(next) if listing.is_truncated && keys.len() < limit => continuation = Some(next),
            _ => break,
        }
    }

    Ok(keys)
}
