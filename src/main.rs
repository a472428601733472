use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use creative_naming_server::classifier::{CompletionOptions, CreativeClassifier, OpenRouterClassifier};
use creative_naming_server::config::{AppConfig, CliConfig, FileConfig, SheetsBackend};
use creative_naming_server::google_auth::{
    ServiceAccountAuth, ServiceAccountCredentials, DRIVE_SCOPES, SHEETS_SCOPE,
};
use creative_naming_server::preview::{DriveUploader, NoPreviewStore, PreviewStore};
use creative_naming_server::server::{run_server, RequestsLoggingLevel, ServerConfig, ServerState};
use creative_naming_server::sheets::{
    GoogleSheetsClient, IdScanPolicy, InMemorySpreadsheet, SchemaRevision, SheetsClient,
    DEFAULT_REQUEST_TIMEOUT,
};
use creative_naming_server::upload::{DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Where rows are stored.
    #[clap(long, value_enum, default_value = "google")]
    pub sheets_backend: SheetsBackend,

    /// Column layout of the spreadsheet.
    #[clap(long, value_enum, default_value = "marketing")]
    pub schema_revision: SchemaRevision,

    /// How the last allocated ID is found in the ID column.
    #[clap(long, value_enum, default_value = "last_numeric")]
    pub id_scan_policy: IdScanPolicy,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    #[clap(long, env = "GOOGLE_SERVICE_ACCOUNT_EMAIL", hide_env_values = true)]
    pub service_account_email: Option<String>,

    /// PEM private key of the service account; `\n` escapes are accepted.
    #[clap(long, env = "GOOGLE_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    #[clap(long, env = "GOOGLE_SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    /// Name of the Creative sheet.
    #[clap(long, env = "GOOGLE_SHEET_NAME")]
    pub creative_sheet: Option<String>,

    /// Name of the Title sheet.
    #[clap(long, env = "GOOGLE_TITLE_SHEET_NAME")]
    pub title_sheet: Option<String>,

    /// Drive folder receiving image previews. Previews are disabled when unset.
    #[clap(long, env = "GOOGLE_DRIVE_FOLDER_ID")]
    pub drive_folder_id: Option<String>,

    #[clap(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    #[clap(long, env = "OPENROUTER_MODEL")]
    pub openrouter_model: Option<String>,

    /// Timeout in seconds for one classification request.
    #[clap(long, default_value_t = 60)]
    pub classify_timeout_sec: u64,

    /// Maximum number of files per upload.
    #[clap(long, default_value_t = DEFAULT_MAX_FILES)]
    pub max_files: usize,

    /// Maximum size of one uploaded file, in MiB.
    #[clap(long, default_value_t = DEFAULT_MAX_FILE_SIZE / (1024 * 1024))]
    pub max_file_size_mb: u64,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            sheets_backend: self.sheets_backend,
            schema_revision: self.schema_revision,
            id_scan_policy: self.id_scan_policy,
            frontend_dir_path: self.frontend_dir_path.clone(),
            service_account_email: self.service_account_email.clone(),
            private_key: self.private_key.clone(),
            spreadsheet_id: self.spreadsheet_id.clone(),
            creative_sheet: self.creative_sheet.clone(),
            title_sheet: self.title_sheet.clone(),
            drive_folder_id: self.drive_folder_id.clone(),
            openrouter_api_key: self.openrouter_api_key.clone(),
            openrouter_model: self.openrouter_model.clone(),
            classify_timeout_sec: self.classify_timeout_sec,
            max_files: self.max_files,
            max_file_size_mb: self.max_file_size_mb,
        }
    }
}

fn credentials(config: &AppConfig) -> ServiceAccountCredentials {
    ServiceAccountCredentials::from_env_values(
        config.service_account_email.as_deref().unwrap_or_default(),
        config.private_key.as_deref().unwrap_or_default(),
    )
}

fn make_sheets_client(config: &AppConfig, http: &reqwest::Client) -> Arc<dyn SheetsClient> {
    match config.sheets_backend {
        SheetsBackend::Google => {
            let auth = Arc::new(ServiceAccountAuth::new(
                http.clone(),
                credentials(config),
                &[SHEETS_SCOPE],
            ));
            Arc::new(GoogleSheetsClient::new(
                http.clone(),
                auth,
                config.spreadsheet_id.clone().unwrap_or_default(),
            ))
        }
        SheetsBackend::Memory => {
            info!("Using in-memory sheets, rows will not survive a restart");
            Arc::new(
                InMemorySpreadsheet::new()
                    .with_sheet(&config.sheet_names.creative)
                    .with_sheet(&config.sheet_names.title),
            )
        }
    }
}

fn make_preview_store(config: &AppConfig, http: &reqwest::Client) -> Arc<dyn PreviewStore> {
    if !config.previews_enabled() {
        info!("Preview upload disabled");
        return Arc::new(NoPreviewStore);
    }
    let auth = Arc::new(ServiceAccountAuth::new(
        http.clone(),
        credentials(config),
        DRIVE_SCOPES,
    ));
    Arc::new(DriveUploader::new(
        http.clone(),
        auth,
        config.drive_folder_id.clone(),
    ))
}

fn make_classifier(config: &AppConfig, http: &reqwest::Client) -> Arc<dyn CreativeClassifier> {
    let settings = &config.openrouter;
    let options = CompletionOptions {
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
        timeout: settings.timeout,
    };
    Arc::new(
        OpenRouterClassifier::new(
            http.clone(),
            settings.model.clone(),
            settings.api_key.clone().unwrap_or_default(),
            options,
        )
        .with_base_url(settings.base_url.clone()),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    for missing in config.missing_settings() {
        warn!("{}, uploads and edits will be refused", missing);
    }
    info!(
        "Schema revision {}, ID scan policy {:?}, sheets \"{}\" and \"{}\"",
        config.schema_revision,
        config.id_scan_policy,
        config.sheet_names.creative,
        config.sheet_names.title
    );

    let http = reqwest::Client::builder()
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        metrics_port: config.metrics_port,
        frontend_dir_path: config.frontend_dir_path.clone(),
    };
    let state = ServerState::new(
        server_config,
        &config,
        make_sheets_client(&config, &http),
        make_classifier(&config, &http),
        make_preview_store(&config, &http),
    )?;

    run_server(state).await
}
