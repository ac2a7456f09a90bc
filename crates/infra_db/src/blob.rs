//! Filesystem blob store for proof-of-delivery photos
//!
//! Writes under a root directory and hands back `<public_base_url>/<path>`.
//! Without a root it reports `NotConfigured`, which makes uploads fall back
//! to inline data URLs.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use core_kernel::DomainPort;
use domain_delivery::{BlobError, BlobStore};

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: Option<PathBuf>,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: Option<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root,
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn resolve(root: &Path, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(BlobError::Io(format!("refusing unsafe blob path '{}'", path)));
        }
        Ok(root.join(relative))
    }
}

impl DomainPort for FsBlobStore {}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self, bytes), fields(path = %path, size = bytes.len()))]
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, BlobError> {
        let root = self
            .root
            .as_deref()
            .ok_or_else(|| BlobError::NotConfigured("no blob root directory".to_string()))?;
        let target = Self::resolve(root, path)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::Io(e.to_string()))?;
        }
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| BlobError::Io(e.to_string()))?;

        debug!(target = %target.display(), "blob written");
        Ok(format!("{}/{}", self.public_base_url.trim_end_matches('/'), path))
    }
}
