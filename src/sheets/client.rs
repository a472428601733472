//! Spreadsheet store abstraction.
//!
//! The writers only need three range-addressed operations, so the store is
//! hidden behind [`SheetsClient`]. [`super::GoogleSheetsClient`] talks to the
//! Sheets v4 API, [`super::InMemorySpreadsheet`] backs tests and local runs.

use async_trait::async_trait;
use thiserror::Error;

use crate::google_auth::AuthError;

/// How the store should interpret written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInput {
    /// Stored verbatim; a leading `=` stays literal text.
    Raw,
    /// Parsed as if typed into the UI; formulas are evaluated.
    UserEntered,
}

impl ValueInput {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInput::Raw => "RAW",
            ValueInput::UserEntered => "USER_ENTERED",
        }
    }
}

/// Result of an append: the absolute range the row landed in, e.g. `Creative!A15:N15`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppendOutcome {
    pub updated_range: String,
}

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Sheet \"{0}\" not found. Please create it in the spreadsheet.")]
    MissingSheet(String),

    #[error("Sheets API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Range-addressed access to one spreadsheet.
#[async_trait]
pub trait SheetsClient: Send + Sync {
    /// Reads a range; rows and trailing cells the store omits are simply absent.
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError>;

    /// Overwrites a range with the given rows.
    async fn update_range(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
        input: ValueInput,
    ) -> Result<(), SheetsError>;

    /// Appends one row after the last non-empty row of the table found at `range`.
    async fn append_row(
        &self,
        range: &str,
        row: Vec<String>,
        input: ValueInput,
    ) -> Result<AppendOutcome, SheetsError>;
}

/// Sheet name of an A1 range, unquoted: `'Ads naming'!A1` -> `Ads naming`.
pub fn sheet_of_range(range: &str) -> String {
    let name = range.rsplit_once('!').map(|(name, _)| name).unwrap_or(range);
    match name.strip_prefix('\'').and_then(|n| n.strip_suffix('\'')) {
        Some(quoted) => quoted.replace("''", "'"),
        None => name.to_string(),
    }
}
