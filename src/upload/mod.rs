//! Batch processing of uploaded creatives.
//!
//! Files are handled one after another in input order, so IDs follow the
//! order the operator picked. A file that fails is reported and the rest of
//! the batch continues; only a batch where every file failed is an error.

mod file;

pub use file::{CreativeFile, UploadLimits, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE};

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::classifier::{classify_with_defaults, CreativeClassifier};
use crate::preview::PreviewStore;
use crate::server::metrics;
use crate::sheets::{CreativeFields, LedgerError, RowWriter};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No files provided")]
    NoFiles,

    #[error("Maximum {max} files allowed")]
    TooManyFiles { max: usize },

    #[error("File {name} is too large (max {limit})")]
    FileTooLarge { name: String, limit: String },

    #[error("{0}")]
    AllFailed(String),
}

impl UploadError {
    /// Whether the batch was rejected before any external call.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, UploadError::AllFailed(_))
    }
}

/// Result for one successfully written file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub name: String,
    pub creative_id: u64,
    pub row_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    pub data: CreativeFields,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub results: Vec<FileOutcome>,
    /// Per-file failures and title rows that could not be created, in file order.
    pub warnings: Vec<String>,
}

pub struct UploadProcessor {
    classifier: Arc<dyn CreativeClassifier>,
    previews: Arc<dyn PreviewStore>,
    writer: Arc<RowWriter>,
    limits: UploadLimits,
}

impl UploadProcessor {
    pub fn new(
        classifier: Arc<dyn CreativeClassifier>,
        previews: Arc<dyn PreviewStore>,
        writer: Arc<RowWriter>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            classifier,
            previews,
            writer,
            limits,
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    pub async fn process(&self, files: Vec<CreativeFile>) -> Result<BatchReport, UploadError> {
        self.limits.validate(&files)?;
        info!("Processing upload batch of {} files", files.len());

        let mut report = BatchReport::default();
        let mut failures = Vec::new();
        for file in &files {
            match self.process_file(file, &mut report.warnings).await {
                Ok(outcome) => report.results.push(outcome),
                Err(err) => {
                    let message = format!("{}: {}", file.name, err);
                    warn!("File {} could not be written: {}", file.name, err);
                    metrics::record_batch_file_failure();
                    report.warnings.push(message.clone());
                    failures.push(message);
                }
            }
        }

        if report.results.is_empty() {
            let message = if failures.is_empty() {
                "Failed to process any files".to_string()
            } else {
                failures.join("; ")
            };
            return Err(UploadError::AllFailed(message));
        }

        info!(
            "Upload batch done, {} written, {} warnings",
            report.results.len(),
            report.warnings.len()
        );
        Ok(report)
    }

    async fn process_file(
        &self,
        file: &CreativeFile,
        warnings: &mut Vec<String>,
    ) -> Result<FileOutcome, LedgerError> {
        let (fields, _) = classify_with_defaults(self.classifier.as_ref(), file).await;

        let preview_url = if file.is_video() {
            None
        } else {
            match self.previews.store(file).await {
                Ok(url) => url,
                Err(err) => {
                    warn!("Preview upload of {} failed: {}", file.name, err);
                    None
                }
            }
        };

        let written = self
            .writer
            .add_creative(&fields, &file.name, preview_url.as_deref())
            .await?;

        let title_id = if self.writer.has_title_sheet() {
            match self.writer.add_title(&fields.marketing).await {
                Ok(title) => Some(title.id),
                Err(err) => {
                    warn!("Title row for {} not created: {}", file.name, err);
                    warnings.push(format!("{}: title row not created: {}", file.name, err));
                    None
                }
            }
        } else {
            None
        };

        Ok(FileOutcome {
            name: file.name.clone(),
            creative_id: written.id,
            row_index: written.row_index,
            title_id,
            preview_url,
            data: fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifyError;
    use crate::preview::{NoPreviewStore, PreviewError};
    use crate::sheets::{
        IdScanPolicy, InMemorySpreadsheet, LockRegistry, SchemaRevision, SheetNames, SheetSchema,
    };
    use async_trait::async_trait;

    struct FailingClassifier;

    #[async_trait]
    impl CreativeClassifier for FailingClassifier {
        fn name(&self) -> &str {
            "failing"
        }

        async fn classify(&self, _file: &CreativeFile) -> Result<CreativeFields, ClassifyError> {
            Err(ClassifyError::RateLimited)
        }
    }

    struct FixedPreview;

    #[async_trait]
    impl PreviewStore for FixedPreview {
        async fn store(&self, file: &CreativeFile) -> Result<Option<String>, PreviewError> {
            if file.name.starts_with("broken") {
                Err(PreviewError::Connection("reset".to_string()))
            } else {
                Ok(Some(format!("https://previews/{}", file.name)))
            }
        }
    }

    fn processor(
        store: Arc<InMemorySpreadsheet>,
        previews: Arc<dyn PreviewStore>,
        revision: SchemaRevision,
    ) -> UploadProcessor {
        let writer = RowWriter::new(
            store,
            Arc::new(LockRegistry::new()),
            Arc::new(SheetSchema::for_revision(revision).unwrap()),
            &SheetNames::default(),
            IdScanPolicy::default(),
        );
        UploadProcessor::new(
            Arc::new(FailingClassifier),
            previews,
            Arc::new(writer),
            UploadLimits::default(),
        )
    }

    fn png(name: &str) -> CreativeFile {
        CreativeFile::new(name, "image/png", vec![0; 16])
    }

    fn store() -> Arc<InMemorySpreadsheet> {
        Arc::new(
            InMemorySpreadsheet::new()
                .with_sheet("Creative")
                .with_sheet("Title"),
        )
    }

    #[tokio::test]
    async fn test_classification_failures_do_not_fail_the_batch() {
        let store = store();
        let processor = processor(store.clone(), Arc::new(NoPreviewStore), SchemaRevision::Marketing);
        let report = processor
            .process(vec![png("a.png"), png("b.png"), png("c.png")])
            .await
            .unwrap();

        let ids: Vec<u64> = report.results.iter().map(|r| r.creative_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(report.warnings.is_empty());
        assert_eq!(report.results[0].title_id, Some(1));
        assert_eq!(report.results[2].row_index, 4);
        assert_eq!(report.results[1].data.hypothesis, "unknown");
    }

    #[tokio::test]
    async fn test_append_failure_reported_as_warning() {
        let store = store();
        store.fail_append("Creative", 2);
        let processor = processor(store.clone(), Arc::new(NoPreviewStore), SchemaRevision::Marketing);
        let report = processor
            .process(vec![png("a.png"), png("b.png"), png("c.png")])
            .await
            .unwrap();

        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("b.png: "));
        // The failed append consumed no ID.
        assert_eq!(report.results[1].creative_id, 2);
    }

    #[tokio::test]
    async fn test_all_failed_joins_messages() {
        let store = Arc::new(InMemorySpreadsheet::new());
        let processor = processor(store, Arc::new(NoPreviewStore), SchemaRevision::Marketing);
        let err = processor
            .process(vec![png("a.png"), png("b.png")])
            .await
            .unwrap_err();
        match err {
            UploadError::AllFailed(message) => {
                let parts: Vec<&str> = message.split("; ").collect();
                assert_eq!(parts.len(), 2);
                assert!(parts[0].starts_with("a.png: Sheet \"Creative\" not found"));
                assert!(parts[1].starts_with("b.png: "));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_title_failure_is_a_warning() {
        let store = Arc::new(InMemorySpreadsheet::new().with_sheet("Creative"));
        let processor = processor(store, Arc::new(NoPreviewStore), SchemaRevision::Marketing);
        let report = processor.process(vec![png("a.png")]).await.unwrap();
        assert_eq!(report.results[0].creative_id, 1);
        assert_eq!(report.results[0].title_id, None);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("a.png: title row not created"));
    }

    #[tokio::test]
    async fn test_previews_and_videos() {
        let store = store();
        let processor = processor(store.clone(), Arc::new(FixedPreview), SchemaRevision::Marketing);
        let report = processor
            .process(vec![
                png("a.png"),
                png("broken.png"),
                CreativeFile::new("clip.mp4", "video/mp4", vec![0; 4]),
            ])
            .await
            .unwrap();

        assert_eq!(report.results[0].preview_url.as_deref(), Some("https://previews/a.png"));
        assert_eq!(report.results[1].preview_url, None);
        assert_eq!(report.results[2].preview_url, None);
        assert_eq!(report.results[2].data.hypothesis, "video content");
        assert_eq!(store.cell("Creative", 2, 2), "=IMAGE(\"https://previews/a.png\")");
        assert_eq!(store.cell("Creative", 3, 2), "");
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_legacy_revision_writes_no_title() {
        let store = Arc::new(InMemorySpreadsheet::new().with_sheet("Creative"));
        let processor = processor(store, Arc::new(NoPreviewStore), SchemaRevision::Legacy);
        let report = processor.process(vec![png("a.png")]).await.unwrap();
        assert_eq!(report.results[0].title_id, None);
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_batch_touches_nothing() {
        let store = store();
        let processor = processor(store.clone(), Arc::new(NoPreviewStore), SchemaRevision::Marketing);
        let files = (0..21).map(|i| png(&format!("{}.png", i))).collect();
        let err = processor.process(files).await.unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(err.to_string(), "Maximum 20 files allowed");
        assert!(store.operations().is_empty());
    }
}
