mod file_config;

pub use file_config::{FileConfig, GoogleConfig, OpenRouterConfig, UploadConfig};

use crate::classifier::openrouter::{OPENROUTER_BASE_URL, DEFAULT_MODEL};
use crate::server::RequestsLoggingLevel;
use crate::sheets::{IdScanPolicy, SchemaRevision, SheetNames};
use crate::upload::UploadLimits;
use anyhow::{bail, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where rows are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SheetsBackend {
    /// Google Sheets through a service account.
    #[default]
    Google,
    /// Process memory; nothing survives a restart.
    Memory,
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub sheets_backend: SheetsBackend,
    pub schema_revision: SchemaRevision,
    pub id_scan_policy: IdScanPolicy,
    pub frontend_dir_path: Option<String>,
    pub service_account_email: Option<String>,
    pub private_key: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub creative_sheet: Option<String>,
    pub title_sheet: Option<String>,
    pub drive_folder_id: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: Option<String>,
    pub classify_timeout_sec: u64,
    pub max_files: usize,
    pub max_file_size_mb: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub sheets_backend: SheetsBackend,
    pub schema_revision: SchemaRevision,
    pub id_scan_policy: IdScanPolicy,
    pub frontend_dir_path: Option<String>,

    // Google
    pub service_account_email: Option<String>,
    pub private_key: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub sheet_names: SheetNames,
    pub drive_folder_id: Option<String>,

    pub openrouter: OpenRouterSettings,
    pub upload_limits: UploadLimits,
}

#[derive(Debug, Clone)]
pub struct OpenRouterSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Treats blank values, e.g. `GOOGLE_SPREADSHEET_ID=`, as unset.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_value::<RequestsLoggingLevel>(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let sheets_backend = match file.sheets_backend {
            Some(s) => parse_value(&s)
                .ok_or_else(|| anyhow::anyhow!("Unknown sheets_backend: {}", s))?,
            None => cli.sheets_backend,
        };
        let schema_revision = match file.schema_revision {
            Some(s) => parse_value(&s)
                .ok_or_else(|| anyhow::anyhow!("Unknown schema_revision: {}", s))?,
            None => cli.schema_revision,
        };
        let id_scan_policy = match file.id_scan_policy {
            Some(s) => parse_value(&s)
                .ok_or_else(|| anyhow::anyhow!("Unknown id_scan_policy: {}", s))?,
            None => cli.id_scan_policy,
        };

        let frontend_dir_path =
            non_blank(file.frontend_dir_path).or_else(|| non_blank(cli.frontend_dir_path.clone()));

        let google = file.google.unwrap_or_default();
        let defaults = SheetNames::default();
        let sheet_names = SheetNames {
            creative: non_blank(google.creative_sheet)
                .or_else(|| non_blank(cli.creative_sheet.clone()))
                .unwrap_or(defaults.creative),
            title: non_blank(google.title_sheet)
                .or_else(|| non_blank(cli.title_sheet.clone()))
                .unwrap_or(defaults.title),
        };
        if sheet_names.creative == sheet_names.title {
            bail!(
                "Creative and Title sheets must differ, both are \"{}\"",
                sheet_names.creative
            );
        }
        let spreadsheet_id =
            non_blank(google.spreadsheet_id).or_else(|| non_blank(cli.spreadsheet_id.clone()));
        let drive_folder_id =
            non_blank(google.drive_folder_id).or_else(|| non_blank(cli.drive_folder_id.clone()));

        let or_file = file.openrouter.unwrap_or_default();
        let timeout_sec = or_file.timeout_sec.unwrap_or(cli.classify_timeout_sec);
        if timeout_sec == 0 {
            bail!("Classification timeout must be positive");
        }
        let openrouter = OpenRouterSettings {
            api_key: non_blank(cli.openrouter_api_key.clone()),
            model: non_blank(or_file.model)
                .or_else(|| non_blank(cli.openrouter_model.clone()))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: non_blank(or_file.base_url)
                .unwrap_or_else(|| OPENROUTER_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_sec),
            max_tokens: or_file.max_tokens.unwrap_or(800),
            temperature: or_file.temperature.unwrap_or(0.1),
        };

        let upload_file = file.upload.unwrap_or_default();
        let max_file_size_mb = upload_file.max_file_size_mb.unwrap_or(cli.max_file_size_mb);
        let Some(max_file_size) = max_file_size_mb.checked_mul(1024 * 1024) else {
            bail!("Maximum file size of {} MiB is too large", max_file_size_mb);
        };
        let upload_limits = UploadLimits {
            max_files: upload_file.max_files.unwrap_or(cli.max_files),
            max_file_size,
        };
        if upload_limits.max_files == 0 || upload_limits.max_file_size == 0 {
            bail!("Upload limits must be positive");
        }

        Ok(Self {
            port,
            metrics_port,
            logging_level,
            sheets_backend,
            schema_revision,
            id_scan_policy,
            frontend_dir_path,
            service_account_email: non_blank(cli.service_account_email.clone()),
            private_key: non_blank(cli.private_key.clone()),
            spreadsheet_id,
            sheet_names,
            drive_folder_id,
            openrouter,
            upload_limits,
        })
    }

    /// Settings that must be present before any upload or edit can run.
    pub fn missing_settings(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.sheets_backend == SheetsBackend::Google {
            if self.service_account_email.is_none() {
                missing.push("GOOGLE_SERVICE_ACCOUNT_EMAIL is required".to_string());
            }
            if self.private_key.is_none() {
                missing.push("GOOGLE_PRIVATE_KEY is required".to_string());
            }
            if self.spreadsheet_id.is_none() {
                missing.push("GOOGLE_SPREADSHEET_ID is required".to_string());
            }
        }
        if self.openrouter.api_key.is_none() {
            missing.push("OPENROUTER_API_KEY is required".to_string());
        }
        missing
    }

    /// Previews need Drive access, which only the Google backend carries.
    pub fn previews_enabled(&self) -> bool {
        self.sheets_backend == SheetsBackend::Google && self.drive_folder_id.is_some()
    }
}

/// Parses a value through clap's ValueEnum, case-insensitively.
fn parse_value<T: ValueEnum>(s: &str) -> Option<T> {
    T::from_str(s, true).ok()
}
