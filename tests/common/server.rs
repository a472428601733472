//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server backed by its own in-memory spreadsheet.

use super::constants::*;
use super::fixtures::{FakePreviewStore, FilenameClassifier};
use creative_naming_server::config::{AppConfig, CliConfig, SheetsBackend};
use creative_naming_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use creative_naming_server::sheets::{InMemorySpreadsheet, SchemaRevision};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Knobs for [`TestServer::spawn_with`]
pub struct TestServerOptions {
    pub revision: SchemaRevision,
    pub spreadsheet: InMemorySpreadsheet,
    pub api_key: Option<String>,
    pub max_files: usize,
    pub max_file_size_mb: u64,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            revision: SchemaRevision::Marketing,
            spreadsheet: InMemorySpreadsheet::new()
                .with_sheet(CREATIVE_SHEET)
                .with_sheet(TITLE_SHEET),
            api_key: Some(TEST_API_KEY.to_string()),
            max_files: 20,
            max_file_size_mb: 10,
        }
    }
}

/// Test server instance with an isolated spreadsheet
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Spreadsheet behind the server, for direct inspection in tests
    pub spreadsheet: Arc<InMemorySpreadsheet>,

    /// Classifier behind the server, for counting model calls
    pub classifier: Arc<FilenameClassifier>,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server with the marketing layout and both sheets present
    pub async fn spawn() -> Self {
        Self::spawn_with(TestServerOptions::default()).await
    }

    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid, port binding fails or the
    /// server doesn't become ready within timeout.
    pub async fn spawn_with(options: TestServerOptions) -> Self {
        let cli = CliConfig {
            sheets_backend: SheetsBackend::Memory,
            schema_revision: options.revision,
            openrouter_api_key: options.api_key,
            classify_timeout_sec: 60,
            max_files: options.max_files,
            max_file_size_mb: options.max_file_size_mb,
            ..Default::default()
        };
        let app_config = AppConfig::resolve(&cli, None).expect("Invalid test configuration");

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        };

        let spreadsheet = Arc::new(options.spreadsheet);
        let classifier = Arc::new(FilenameClassifier::default());
        let state = ServerState::new(
            config,
            &app_config,
            spreadsheet.clone(),
            classifier.clone(),
            Arc::new(FakePreviewStore),
        )
        .expect("Failed to build server state");
        let app = make_app(state);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            spreadsheet,
            classifier,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    /// Cell of the Creative sheet, 1-indexed
    pub fn creative_cell(&self, row: u32, column: u32) -> String {
        self.spreadsheet.cell(CREATIVE_SHEET, row, column)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
