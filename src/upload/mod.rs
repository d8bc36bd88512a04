pub mod lighthouse;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use lighthouse::LighthouseUploader;

/// Opaque identifier the remote store assigns to an uploaded file
pub type ContentId = String;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("upload response did not contain a content hash")]
    MissingContentId,

    #[error("no upload API key configured")]
    MissingApiKey,
}

/// Remote content-addressed storage
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<ContentId, UploadError>;
}
