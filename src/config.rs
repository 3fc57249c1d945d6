//! Settings file handling.
use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const APP_DIR: &str = "luna-chat";
const SETTINGS_FILE: &str = "settings.json";
pub const URL_ENV: &str = "LUNA_CHAT_URL";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Unset means a hung request never fails, matching the browser client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    pub log_format: LogFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: None,
            log_format: LogFormat::default(),
            log_dir: None,
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs_next::config_dir()
        .ok_or_else(|| ClientError::Config("Failed to find config directory".to_string()))?;
    Ok(config_dir.join(APP_DIR).join(SETTINGS_FILE))
}

pub fn default_log_dir() -> Result<PathBuf> {
    let data_dir = dirs_next::data_dir()
        .ok_or_else(|| ClientError::Config("Failed to find data directory".to_string()))?;
    Ok(data_dir.join(APP_DIR).join("logs"))
}

impl ClientConfig {
    /// Reads `path`, writing the defaults there first if it does not exist yet.
    pub fn load_or_initialize(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            return serde_json::from_str(&content).map_err(|e| {
                ClientError::Config(format!("Failed to parse {}: {}", path.display(), e))
            });
        }

        let default_config = ClientConfig::default();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&default_config)?)?;
        info!(path = %path.display(), "Wrote default settings");
        Ok(default_config)
    }

    /// Applies an explicit backend URL override, e.g. from `LUNA_CHAT_URL`.
    pub fn with_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url;
        }
        self
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        match &self.log_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_log_dir(),
        }
    }
}
