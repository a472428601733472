//! HTTP client for end-to-end tests
//!
//! This module wraps reqwest and provides methods for all server endpoints.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use super::fixtures::UploadFile;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::Value;
use std::time::Duration;

/// HTTP test client
#[derive(Clone)]
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Informational Endpoints
    // ========================================================================

    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    pub async fn get_options(&self) -> Response {
        self.client
            .get(format!("{}/api/options", self.base_url))
            .send()
            .await
            .expect("Options request failed")
    }

    // ========================================================================
    // Creative Endpoints
    // ========================================================================

    /// POST /api/upload-creatives with every file under the `files` field
    pub async fn upload(&self, files: &[UploadFile]) -> Response {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.data.clone())
                .file_name(file.name.clone())
                .mime_str(&file.content_type)
                .expect("Invalid content type");
            form = form.part("files", part);
        }
        self.client
            .post(format!("{}/api/upload-creatives", self.base_url))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    /// Uploads and returns the parsed JSON body along with the status
    pub async fn upload_json(&self, files: &[UploadFile]) -> (reqwest::StatusCode, Value) {
        let response = self.upload(files).await;
        let status = response.status();
        let body = response.json().await.expect("Upload response is not JSON");
        (status, body)
    }

    /// POST /api/update-creative with a raw JSON body
    pub async fn update(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/api/update-creative", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Update request failed")
    }
}
