//! Uploaded creative files and batch limits.

use byte_unit::{Byte, UnitType};

use super::UploadError;

const OCTET_STREAM: &str = "application/octet-stream";

/// One uploaded file, fully buffered.
#[derive(Clone, PartialEq, Eq)]
pub struct CreativeFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for CreativeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreativeFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

impl CreativeFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Builds a file from a multipart part. A missing or generic declared type
    /// is replaced by one sniffed from the content.
    pub fn from_part(name: Option<&str>, declared_type: Option<&str>, data: Vec<u8>) -> Self {
        let declared = declared_type
            .map(str::trim)
            .filter(|t| !t.is_empty() && *t != OCTET_STREAM);
        let content_type = match declared {
            Some(t) => t.to_string(),
            None => infer::get(&data)
                .map(|kind| kind.mime_type().to_string())
                .unwrap_or_else(|| OCTET_STREAM.to_string()),
        };
        Self {
            name: name
                .filter(|n| !n.is_empty())
                .unwrap_or("unnamed")
                .to_string(),
            content_type,
            data,
        }
    }

    pub fn is_video(&self) -> bool {
        self.content_type.starts_with("video/")
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Per-request upload limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_file_size: u64,
}

pub const DEFAULT_MAX_FILES: usize = 20;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl UploadLimits {
    /// Rejects an empty batch, too many files, or any file above the size limit.
    pub fn validate(&self, files: &[CreativeFile]) -> Result<(), UploadError> {
        if files.is_empty() {
            return Err(UploadError::NoFiles);
        }
        if files.len() > self.max_files {
            return Err(UploadError::TooManyFiles {
                max: self.max_files,
            });
        }
        if let Some(file) = files.iter().find(|f| f.size() > self.max_file_size) {
            return Err(UploadError::FileTooLarge {
                name: file.name.clone(),
                limit: format!(
                    "{:#}",
                    Byte::from(self.max_file_size).get_appropriate_unit(UnitType::Binary)
                ),
            });
        }
        Ok(())
    }
}
