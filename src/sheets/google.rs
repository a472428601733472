//! Google Sheets v4 implementation of [`SheetsClient`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::client::{sheet_of_range, AppendOutcome, SheetsClient, SheetsError, ValueInput};
use crate::google_auth::ServiceAccountAuth;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Default per-request timeout for the shared HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to one spreadsheet.
pub struct GoogleSheetsClient {
    client: reqwest::Client,
    auth: Arc<ServiceAccountAuth>,
    spreadsheet_id: String,
}

impl GoogleSheetsClient {
    pub fn new(
        client: reqwest::Client,
        auth: Arc<ServiceAccountAuth>,
        spreadsheet_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth,
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            SHEETS_API_BASE,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    async fn send(
        &self,
        range: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SheetsError> {
        let token = self.auth.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SheetsError::Connection(format!("Request timed out: {}", e))
                } else {
                    SheetsError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(classify_error(range, status.as_u16(), message))
    }
}

/// Maps a failed call to a [`SheetsError`]. Sheets reports a range that points
/// at a non-existent tab as a 400 "Unable to parse range".
fn classify_error(range: &str, status: u16, message: String) -> SheetsError {
    if status == 400 && message.contains("Unable to parse range") {
        SheetsError::MissingSheet(sheet_of_range(range))
    } else {
        SheetsError::Api { status, message }
    }
}

#[async_trait]
impl SheetsClient for GoogleSheetsClient {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        debug!("Reading range {}", range);
        let request = self.client.get(self.values_url(range));
        let response = self.send(range, request).await?;
        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| SheetsError::InvalidResponse(e.to_string()))?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    async fn update_range(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
        input: ValueInput,
    ) -> Result<(), SheetsError> {
        debug!("Updating range {} ({})", range, input.as_str());
        let request = self
            .client
            .put(self.values_url(range))
            .query(&[("valueInputOption", input.as_str())])
            .json(&ValueRangeBody {
                range,
                major_dimension: "ROWS",
                values: rows,
            });
        self.send(range, request).await?;
        Ok(())
    }

    async fn append_row(
        &self,
        range: &str,
        row: Vec<String>,
        input: ValueInput,
    ) -> Result<AppendOutcome, SheetsError> {
        debug!("Appending row to {} ({})", range, input.as_str());
        let url = format!("{}:append", self.values_url(range));
        let request = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", input.as_str()),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&ValueRangeBody {
                range,
                major_dimension: "ROWS",
                values: vec![row],
            });
        let response = self.send(range, request).await?;
        let body: AppendResponse = response
            .json()
            .await
            .map_err(|e| SheetsError::InvalidResponse(e.to_string()))?;
        Ok(AppendOutcome {
            updated_range: body
                .updates
                .and_then(|u| u.updated_range)
                .unwrap_or_default(),
        })
    }
}

fn cell_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// Sheets API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'a str,
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
