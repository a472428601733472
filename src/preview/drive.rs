//! Google Drive preview storage.
//!
//! Uploads the creative with a multipart/related request, grants public read
//! access, and returns the direct view URL that Sheets' `=IMAGE()` can render.

use async_trait::async_trait;
use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::{PreviewError, PreviewStore};
use crate::google_auth::ServiceAccountAuth;
use crate::upload::CreativeFile;

const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

/// Direct view URL for a Drive file id.
pub fn view_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?export=view&id={}", file_id)
}

pub struct DriveUploader {
    client: reqwest::Client,
    auth: Arc<ServiceAccountAuth>,
    folder_id: Option<String>,
}

impl DriveUploader {
    pub fn new(
        client: reqwest::Client,
        auth: Arc<ServiceAccountAuth>,
        folder_id: Option<String>,
    ) -> Self {
        Self {
            client,
            auth,
            folder_id,
        }
    }

    async fn create_file(&self, file: &CreativeFile, token: &str) -> Result<String, PreviewError> {
        let metadata = FileMetadata {
            name: format!("{}_{}", Utc::now().timestamp_millis(), file.name),
            parents: self.folder_id.iter().cloned().collect(),
        };
        let boundary = random_boundary();
        let body = related_body(&boundary, &metadata, &file.content_type, &file.data)?;

        let response = self
            .client
            .post(DRIVE_UPLOAD_URL)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| PreviewError::Connection(e.to_string()))?;
        let response = check_status(response).await?;

        let created: CreatedFile = response
            .json()
            .await
            .map_err(|e| PreviewError::InvalidResponse(e.to_string()))?;
        created
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PreviewError::InvalidResponse("no file ID returned".to_string()))
    }

    async fn share_publicly(&self, file_id: &str, token: &str) -> Result<(), PreviewError> {
        let response = self
            .client
            .post(format!("{}/{}/permissions", DRIVE_FILES_URL, file_id))
            .bearer_auth(token)
            .json(&Permission {
                role: "reader",
                kind: "anyone",
            })
            .send()
            .await
            .map_err(|e| PreviewError::Connection(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl PreviewStore for DriveUploader {
    async fn store(&self, file: &CreativeFile) -> Result<Option<String>, PreviewError> {
        let token = self.auth.access_token().await?;
        debug!("Uploading preview of {} ({} bytes) to Drive", file.name, file.data.len());

        let file_id = self.create_file(file, &token).await?;
        self.share_publicly(&file_id, &token).await?;

        let url = view_url(&file_id);
        info!("Preview of {} stored as {}", file.name, file_id);
        Ok(Some(url))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PreviewError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(PreviewError::Api {
        status: status.as_u16(),
        message,
    })
}

fn random_boundary() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("creative_{}", suffix)
}

/// multipart/related body: JSON metadata part followed by the media part.
fn related_body(
    boundary: &str,
    metadata: &FileMetadata,
    content_type: &str,
    data: &[u8],
) -> Result<Vec<u8>, PreviewError> {
    let metadata =
        serde_json::to_string(metadata).map_err(|e| PreviewError::InvalidResponse(e.to_string()))?;
    let mut body = Vec::with_capacity(data.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {t}\r\n\r\n",
            b = boundary,
            m = metadata,
            t = content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    Ok(body)
}

#[derive(Debug, Serialize)]
struct FileMetadata {
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parents: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Permission {
    role: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_url() {
        assert_eq!(
            view_url("1AbC"),
            "https://drive.google.com/uc?export=view&id=1AbC"
        );
    }

    #[test]
    fn test_related_body_layout() {
        let metadata = FileMetadata {
            name: "1_a.png".to_string(),
            parents: vec!["folder".to_string()],
        };
        let body = related_body("xyz", &metadata, "image/png", b"PNG").unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--xyz\r\nContent-Type: application/json"));
        assert!(text.contains(r#"{"name":"1_a.png","parents":["folder"]}"#));
        assert!(text.contains("Content-Type: image/png\r\n\r\nPNG\r\n--xyz--\r\n"));
    }

    #[test]
    fn test_metadata_without_folder() {
        let metadata = FileMetadata {
            name: "a.png".to_string(),
            parents: Vec::new(),
        };
        assert_eq!(
            serde_json::to_string(&metadata).unwrap(),
            r#"{"name":"a.png"}"#
        );
    }

    #[test]
    fn test_boundary_is_random() {
        let a = random_boundary();
        assert!(a.starts_with("creative_"));
        assert_ne!(a, random_boundary());
    }
}
