//! Creative classification.
//!
//! A [`CreativeClassifier`] turns an uploaded image into [`CreativeFields`].
//! [`classify_with_defaults`] wraps it with the fixed video classification and
//! the fallback used whenever the model cannot be relied upon, so callers
//! always get a result.

pub mod openrouter;
pub mod options;
mod prompt;
pub mod result;

pub use openrouter::{CompletionOptions, OpenRouterClassifier};
pub use options::{ClosedSet, InvalidOption, OptionSets};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::server::metrics;
use crate::sheets::CreativeFields;
use crate::upload::CreativeFile;
use options::CreativeType;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Model reply contained no usable classification")]
    UnparseableReply,
}

#[async_trait]
pub trait CreativeClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Classifies one still image.
    async fn classify(&self, file: &CreativeFile) -> Result<CreativeFields, ClassifyError>;
}

/// How a classification was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    Model,
    VideoDefault,
    Fallback,
}

impl ClassificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationSource::Model => "model",
            ClassificationSource::VideoDefault => "video_default",
            ClassificationSource::Fallback => "fallback",
        }
    }
}

/// Classifies a file, never failing: videos get the fixed video
/// classification without a model call, errors get the fallback.
pub async fn classify_with_defaults(
    classifier: &dyn CreativeClassifier,
    file: &CreativeFile,
) -> (CreativeFields, ClassificationSource) {
    let (fields, source) = if file.is_video() {
        (result::video_default(), ClassificationSource::VideoDefault)
    } else {
        match classifier.classify(file).await {
            Ok(fields) => (fields, ClassificationSource::Model),
            Err(err) => {
                warn!(
                    "Classification of {} by {} failed, using defaults: {}",
                    file.name,
                    classifier.name(),
                    err
                );
                (result::fallback(CreativeType::Static), ClassificationSource::Fallback)
            }
        }
    };
    metrics::record_classification(source.as_str());
    (fields, source)
}
