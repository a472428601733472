use axum::extract::FromRef;

use crate::classifier::CreativeClassifier;
use crate::config::AppConfig;
use crate::preview::PreviewStore;
use crate::sheets::{
    LockRegistry, RowUpdater, RowWriter, SchemaRevision, SheetSchema, SheetsClient,
};
use crate::upload::UploadProcessor;
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedUploadProcessor = Arc<UploadProcessor>;
pub type GuardedRowUpdater = Arc<RowUpdater>;
pub type MissingSettings = Arc<Vec<String>>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub schema_revision: SchemaRevision,
    /// Missing credentials; when non-empty every upload and edit is refused.
    pub missing_settings: MissingSettings,
    pub uploads: GuardedUploadProcessor,
    pub updater: GuardedRowUpdater,
}

impl ServerState {
    /// Wires the ledger on top of `client`. The lock registry created here is
    /// the only one in the process and lives as long as the state.
    pub fn new(
        config: ServerConfig,
        app_config: &AppConfig,
        client: Arc<dyn SheetsClient>,
        classifier: Arc<dyn CreativeClassifier>,
        previews: Arc<dyn PreviewStore>,
    ) -> Result<ServerState> {
        let schema = Arc::new(SheetSchema::for_revision(app_config.schema_revision)?);
        let locks = Arc::new(LockRegistry::new());

        let writer = RowWriter::new(
            client.clone(),
            locks,
            schema.clone(),
            &app_config.sheet_names,
            app_config.id_scan_policy,
        );
        let updater = RowUpdater::new(client, schema, &app_config.sheet_names.creative);
        let uploads = UploadProcessor::new(
            classifier,
            previews,
            Arc::new(writer),
            app_config.upload_limits,
        );

        Ok(ServerState {
            config,
            start_time: Instant::now(),
            schema_revision: app_config.schema_revision,
            missing_settings: Arc::new(app_config.missing_settings()),
            uploads: Arc::new(uploads),
            updater: Arc::new(updater),
        })
    }

    /// The configuration error reported to callers, if any.
    pub fn configuration_error(&self) -> Option<String> {
        if self.missing_settings.is_empty() {
            None
        } else {
            Some(format!(
                "Configuration error: {}",
                self.missing_settings.join(", ")
            ))
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedUploadProcessor {
    fn from_ref(input: &ServerState) -> Self {
        input.uploads.clone()
    }
}

impl FromRef<ServerState> for GuardedRowUpdater {
    fn from_ref(input: &ServerState) -> Self {
        input.updater.clone()
    }
}
