//! Blob store collaborator
//!
//! Uploaded media gets a fetchable URL back. [`LocalBlobStore`] keeps files
//! in a directory, named by the SHA-256 of their content, so uploading the
//! same bytes twice yields the same URL.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use crate::error::{Result, SparkError, UpstreamError};
use crate::media::MediaCandidate;

#[async_trait]
pub trait BlobStore: Send + Sync {
    fn name(&self) -> &str;

    /// Store `bytes` and return a URL the publisher can fetch
    async fn upload(&self, candidate: &MediaCandidate, bytes: &[u8]) -> Result<String>;
}

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn failure(&self, message: String) -> SparkError {
        SparkError::Upstream(UpstreamError::Service {
            provider: self.name().to_string(),
            message,
        })
    }
}

fn extension_of(candidate: &MediaCandidate) -> Option<String> {
    candidate
        .file_name
        .as_deref()
        .and_then(|n| Path::new(n).extension())
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn name(&self) -> &str {
        "local-blob"
    }

    async fn upload(&self, candidate: &MediaCandidate, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| self.failure(format!("Upload failed: {}", e)))?;
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|e| self.failure(format!("Upload failed: {}", e)))?;

        let digest = hex::encode(Sha256::digest(bytes));
        let file_name = match extension_of(candidate) {
            Some(ext) => format!("{}.{}", digest, ext),
            None => digest,
        };
        let target = root.join(&file_name);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!("Blob {} already stored", file_name);
        } else {
            let tmp = root.join(format!("{}.partial", file_name));
            tokio::fs::write(&tmp, bytes)
                .await
                .map_err(|e| self.failure(format!("Upload failed: {}", e)))?;
            tokio::fs::rename(&tmp, &target)
                .await
                .map_err(|e| self.failure(format!("Upload failed: {}", e)))?;
            debug!("Stored blob {} ({} bytes)", file_name, bytes.len());
        }

        Url::from_file_path(&target)
            .map(String::from)
            .map_err(|_| self.failure(format!("Upload failed: no URL for {}", target.display())))
    }
}
