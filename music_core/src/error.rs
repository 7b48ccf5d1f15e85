use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a generation request.
///
/// Moderation rejections, empty streams and storage outages are not errors:
/// they are reported through [`crate::GenerationReport`].
#[derive(Debug, Error)]
pub enum MusicError {
    #[error("Failed to negotiate generation session: {0}")]
    Negotiation(String),

    #[error("Failed to write audio file {}: {source}", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MusicError {
    pub fn negotiation(reason: impl std::fmt::Display) -> Self {
        MusicError::Negotiation(reason.to_string())
    }
}

/// Failures while talking to the object store. Never leaves the publisher.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object storage is not configured")]
    NotConfigured,

    #[error("Storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Storage returned {status} for {operation}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to sign storage request: {0}")]
    Signing(String),

    #[error("Storage did not respond within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Failed to read staged file: {0}")]
    Io(#[from] std::io::Error),
}
