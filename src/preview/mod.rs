//! Optional preview storage for uploaded creatives.

mod drive;

pub use drive::{view_url, DriveUploader};

use async_trait::async_trait;
use thiserror::Error;

use crate::google_auth::AuthError;
use crate::upload::CreativeFile;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Drive API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Publishes a creative somewhere a spreadsheet can render it from.
#[async_trait]
pub trait PreviewStore: Send + Sync {
    /// Returns the public URL, or `None` when the store keeps no previews.
    async fn store(&self, file: &CreativeFile) -> Result<Option<String>, PreviewError>;
}

/// Store used when preview upload is not configured.
pub struct NoPreviewStore;

#[async_trait]
impl PreviewStore for NoPreviewStore {
    async fn store(&self, _file: &CreativeFile) -> Result<Option<String>, PreviewError> {
        Ok(None)
    }
}
