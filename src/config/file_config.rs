use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Optional TOML configuration. Secrets are never read from here; they come
/// from the environment.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub sheets_backend: Option<String>,
    pub schema_revision: Option<String>,
    pub id_scan_policy: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Integrations
    pub google: Option<GoogleConfig>,
    pub openrouter: Option<OpenRouterConfig>,
    pub upload: Option<UploadConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct GoogleConfig {
    pub spreadsheet_id: Option<String>,
    pub creative_sheet: Option<String>,
    pub title_sheet: Option<String>,
    /// Drive folder receiving previews; previews are disabled when unset.
    pub drive_folder_id: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct OpenRouterConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_sec: Option<u64>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub max_files: Option<usize>,
    pub max_file_size_mb: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
