//! Shared constants for end-to-end tests
//!
//! When sheet names, credentials or limits used by the harness change,
//! update only this file.

// ============================================================================
// Spreadsheet
// ============================================================================

/// Name of the Creative sheet in the test spreadsheet
pub const CREATIVE_SHEET: &str = "Creative";

/// Name of the Title sheet in the test spreadsheet
pub const TITLE_SHEET: &str = "Title";

/// Base of the preview URLs handed out by the fake preview store
pub const PREVIEW_BASE_URL: &str = "https://previews.test";

/// API key configured on the default test server
pub const TEST_API_KEY: &str = "sk-or-test";

// ============================================================================
// Creative sheet columns (marketing revision, 1-indexed)
// ============================================================================

pub const COL_ID: u32 = 1;
pub const COL_PREVIEW: u32 = 2;
pub const COL_LINK: u32 = 3;
pub const COL_TYPE: u32 = 4;
pub const COL_HYPOTHESIS: u32 = 5;
pub const COL_STYLE: u32 = 7;
pub const COL_MAIN_TONE: u32 = 8;
pub const COL_OFFER: u32 = 13;
pub const COL_FILENAME: u32 = 14;

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
