//! Test doubles and upload fixtures
//!
//! The fakes stand in for the model and Drive so that end-to-end tests only
//! exercise the server and the in-memory spreadsheet.

use super::constants::*;
use async_trait::async_trait;
use creative_naming_server::classifier::options::{
    AiFlag, CreativeType, MainObject, MainTone, Offer, Product, Style, Uvp,
};
use creative_naming_server::classifier::{ClassifyError, CreativeClassifier};
use creative_naming_server::preview::{PreviewError, PreviewStore};
use creative_naming_server::sheets::{CreativeFields, MarketingFields};
use creative_naming_server::upload::CreativeFile;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Minimal PNG signature, enough for content sniffing
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

/// ISO base media header of an mp4 file
const MP4_BYTES: &[u8] = &[
    0, 0, 0, 0x18, b'f', b't', b'y', b'p', b'm', b'p', b'4', b'2', 0, 0, 0, 0,
];

/// One file of a multipart upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

pub fn image(name: &str) -> UploadFile {
    UploadFile {
        name: name.to_string(),
        content_type: "image/png".to_string(),
        data: PNG_BYTES.to_vec(),
    }
}

pub fn video(name: &str) -> UploadFile {
    UploadFile {
        name: name.to_string(),
        content_type: "video/mp4".to_string(),
        data: MP4_BYTES.to_vec(),
    }
}

/// An image padded to `size` bytes
pub fn image_of_size(name: &str, size: usize) -> UploadFile {
    let mut file = image(name);
    file.data.resize(size, 0);
    file
}

/// Classifier driven by the file name:
/// - names containing `fail` get a rate-limit error
/// - otherwise the file stem becomes the hypothesis
///
/// Every call sleeps briefly so concurrent uploads interleave.
#[derive(Default)]
pub struct FilenameClassifier {
    calls: AtomicUsize,
}

impl FilenameClassifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CreativeClassifier for FilenameClassifier {
    fn name(&self) -> &str {
        "filename"
    }

    async fn classify(&self, file: &CreativeFile) -> Result<CreativeFields, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        if file.name.contains("fail") {
            return Err(ClassifyError::RateLimited);
        }
        let stem = file.name.split('.').next().unwrap_or_default().to_string();
        Ok(CreativeFields {
            kind: CreativeType::Static,
            hypothesis: stem,
            ai_flag: AiFlag::MadeAi,
            style: Style::Illustration,
            main_tone: MainTone::Bright,
            main_object: MainObject::Girl,
            marketing: MarketingFields {
                header_text: "Learn maths online".to_string(),
                uvp: Uvp::ThroughBenefit,
                product: Product::MathCourse,
                offer: Offer::FreeLesson,
            },
        })
    }
}

/// Preview store handing out deterministic URLs; names containing
/// `nopreview` fail.
pub struct FakePreviewStore;

#[async_trait]
impl PreviewStore for FakePreviewStore {
    async fn store(&self, file: &CreativeFile) -> Result<Option<String>, PreviewError> {
        if file.name.contains("nopreview") {
            return Err(PreviewError::Api {
                status: 403,
                message: "insufficient permissions".to_string(),
            });
        }
        Ok(Some(format!("{}/{}", PREVIEW_BASE_URL, file.name)))
    }
}
