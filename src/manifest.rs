//! Key manifest: the newline-delimited list of object keys that random-read
//! benchmarks draw from. `CreateKeyFile` writes it; `RandomRead` and
//! `RandomReadMetadata` load it once per run and share it read-only.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::OperationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyManifest {
    keys: Vec<String>,
}

impl KeyManifest {
    /// Build a manifest from keys in memory. Returns `None` when `keys` is empty.
    pub fn from_keys(keys: Vec<String>) -> Option<Self> {
        (!keys.is_empty()).then_some(Self { keys })
    }

    /// Read a manifest, skipping blank lines.
    pub async fn load(path: &Path) -> Result<Self, OperationError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| OperationError::Manifest {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let keys: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        Self::from_keys(keys).ok_or_else(|| OperationError::Manifest {
            path: path.to_path_buf(),
            reason: "contains no keys".to_string(),
        })
    }

    /// Write one key per line, replacing any existing file.
    pub async fn write(path: &Path, keys: &[String]) -> Result<(), OperationError> {
        let mut file = fs::File::create(path).await?;
        for key in keys {
            file.write_all(key.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        file.flush().await?;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }

    pub fn random_key<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        // from_keys/load guarantee at least one key
        self.keys.choose(rng).map_or("", String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}
