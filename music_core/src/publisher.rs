//! Hands staged artifacts to object storage.
//!
//! Storage problems never fail a request: the publisher reports the local
//! path with a warning instead and leaves the staged file in place. The local
//! copy is removed only after a confirmed upload.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::StorageError;
use crate::wav::StagedArtifact;

pub const WAV_CONTENT_TYPE: &str = "audio/wav";

/// Upper bound on the whole upload, bucket check included.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(90);

/// Destination for published artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the destination bucket if it does not exist yet.
    async fn ensure_bucket(&self) -> Result<(), StorageError>;

    async fn put_object(&self, name: &str, body: Vec<u8>, content_type: &str)
        -> Result<(), StorageError>;

    /// Publicly resolvable URL for an uploaded object.
    fn locator(&self, name: &str) -> String;
}

/// Where a generated file ended up. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishResult {
    Published { url: String },
    Degraded { local_path: PathBuf, reason: String },
}

impl PublishResult {
    pub fn is_degraded(&self) -> bool {
        matches!(self, PublishResult::Degraded { .. })
    }
}

#[derive(Clone)]
pub struct ArtifactPublisher {
    store: Option<Arc<dyn ObjectStore>>,
    timeout: Duration,
}

impl Default for ArtifactPublisher {
    fn default() -> Self {
        Self::local_only()
    }
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store: Some(store),
            timeout: PUBLISH_TIMEOUT,
        }
    }

    /// A publisher without a sink; every artifact stays local.
    pub fn local_only() -> Self {
        Self {
            store: None,
            timeout: PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn publish(&self, artifact: &StagedArtifact) -> PublishResult {
        let result = match &self.store {
            Some(store) => tokio::time::timeout(self.timeout, upload(store.as_ref(), artifact))
                .await
                .unwrap_or(Err(StorageError::Timeout(self.timeout))),
            None => Err(StorageError::NotConfigured),
        };

        match result {
            Ok(url) => {
                info!("Uploaded {} to {}", artifact.object_name, url);
                if let Err(e) = tokio::fs::remove_file(&artifact.path).await {
                    warn!("Failed to remove staged file {}: {e}", artifact.path.display());
                }
                PublishResult::Published { url }
            }
            Err(e) => {
                error!("Upload failed, returning local path as fallback: {e}");
                PublishResult::Degraded {
                    local_path: artifact.path.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }
}

async fn upload(store: &dyn ObjectStore, artifact: &StagedArtifact) -> Result<String, StorageError> {
    store.ensure_bucket().await?;
    let body = tokio::fs::read(&artifact.path).await?;
    store
        .put_object(&artifact.object_name, body, WAV_CONTENT_TYPE)
        .await?;
    Ok(store.locator(&artifact.object_name))
}
