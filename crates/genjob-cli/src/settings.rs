//! Persistent CLI settings.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use genjob_client::ApiConfig;

const SETTINGS_FILE: &str = "settings.json";

/// `<platform data dir>/genjob`, if the platform has one.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("genjob"))
}

/// Values remembered between invocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Settings {
    /// Load settings from `data_dir`. A missing file yields defaults.
    pub fn load(data_dir: &Path) -> io::Result<Self> {
        match std::fs::read_to_string(data_dir.join(SETTINGS_FILE)) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, data_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(data_dir.join(SETTINGS_FILE), raw)
    }

    /// Build the API config, preferring explicit values over saved ones.
    pub fn api_config(&self, api_key: Option<String>, base_url: Option<String>) -> ApiConfig {
        let mut config = ApiConfig::new(api_key.or_else(|| self.api_key.clone()).unwrap_or_default());
        if let Some(base_url) = base_url.or_else(|| self.base_url.clone()) {
            config = config.with_base_url(base_url);
        }
        config
    }
}

/// Show only the last four characters of a key.
pub fn mask(key: &str) -> String {
    let count = key.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
