//! Proof-of-delivery photo upload
//!
//! Photos arrive base64 encoded, optionally as a `data:` URL. They are
//! stored under `pod/<order_id>/<millis>.jpg`. When no blob store is
//! configured the upload still succeeds and the caller keeps the inline
//! data URL as the proof reference.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{instrument, warn};

use core_kernel::{DomainPort, OrderId};

use crate::error::DeliveryError;

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Errors reported by a blob store
#[derive(Debug, Error)]
pub enum BlobError {
    /// No bucket or directory is set up; callers fall back to inline storage
    #[error("Blob storage not configured: {0}")]
    NotConfigured(String),

    #[error("Blob storage I/O error: {0}")]
    Io(String),
}

/// Port for proof-of-delivery photo storage
#[async_trait]
pub trait BlobStore: DomainPort {
    /// Stores `bytes` at `path` and returns a retrievable URL
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError>;
}

/// Result of a proof upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofUpload {
    pub path: String,
    pub photo_url: Option<String>,
    pub fallback_to_inline: bool,
    /// Present only on fallback
    pub inline_data_url: Option<String>,
}

impl ProofUpload {
    /// The value to store as the order's proof photo
    pub fn reference(&self) -> Option<&str> {
        self.photo_url
            .as_deref()
            .or(self.inline_data_url.as_deref())
    }
}

/// Decoded photo payload
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPhoto {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Normalized `data:<type>;base64,<payload>` form
    pub data_url: String,
}

/// Accepts raw base64 or a `data:image/...;base64,` URL
pub fn decode_photo(photo: &str) -> Result<DecodedPhoto, DeliveryError> {
    let photo = photo.trim();
    let (content_type, payload) = match photo.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| DeliveryError::InvalidProof("malformed data URL".to_string()))?;
            let content_type = header
                .strip_suffix(";base64")
                .ok_or_else(|| DeliveryError::InvalidProof("data URL is not base64".to_string()))?;
            (content_type.to_string(), payload)
        }
        None => (DEFAULT_CONTENT_TYPE.to_string(), photo),
    };

    if payload.is_empty() {
        return Err(DeliveryError::InvalidProof("photo is empty".to_string()));
    }
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| DeliveryError::InvalidProof(format!("invalid base64: {}", e)))?;

    Ok(DecodedPhoto {
        data_url: format!("data:{};base64,{}", content_type, payload),
        bytes,
        content_type,
    })
}

/// Uploads proof photos through a [`BlobStore`]
#[derive(Clone)]
pub struct ProofUploader {
    blobs: Arc<dyn BlobStore>,
}

impl ProofUploader {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    #[instrument(skip(self, photo), fields(order_id = %order_id))]
    pub async fn upload(&self, order_id: OrderId, photo: &str) -> Result<ProofUpload, DeliveryError> {
        let decoded = decode_photo(photo)?;
        let path = format!("pod/{}/{}.jpg", order_id.as_uuid(), Utc::now().timestamp_millis());

        match self
            .blobs
            .put(&path, decoded.bytes, &decoded.content_type)
            .await
        {
            Ok(url) => Ok(ProofUpload {
                path,
                photo_url: Some(url),
                fallback_to_inline: false,
                inline_data_url: None,
            }),
            Err(BlobError::NotConfigured(reason)) => {
                warn!(%reason, "blob storage unavailable, keeping photo inline");
                Ok(ProofUpload {
                    path,
                    photo_url: None,
                    fallback_to_inline: true,
                    inline_data_url: Some(decoded.data_url),
                })
            }
            Err(BlobError::Io(message)) => Err(DeliveryError::InvalidProof(format!(
                "upload failed: {}",
                message
            ))),
        }
    }
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    /// In-memory blob store
    #[derive(Debug, Default)]
    pub struct MemoryBlobStore {
        objects: RwLock<HashMap<String, Vec<u8>>>,
        unconfigured: bool,
    }

    impl MemoryBlobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// A store that behaves like a missing bucket
        pub fn unconfigured() -> Self {
            Self {
                unconfigured: true,
                ..Self::default()
            }
        }

        pub async fn get(&self, path: &str) -> Option<Vec<u8>> {
            self.objects.read().await.get(path).cloned()
        }
    }

    impl DomainPort for MemoryBlobStore {}

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, BlobError> {
            if self.unconfigured {
                return Err(BlobError::NotConfigured("bucket not found".to_string()));
            }
            self.objects.write().await.insert(path.to_string(), bytes);
            Ok(format!("memory://{}", path))
        }
    }
}
