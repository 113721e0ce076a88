use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

/// Application configuration, read once at startup from `config.json`.
///
/// `data_path` decides the storage backend: a local directory, a plain
/// HTTP(S) directory URL, or a SAS-qualified blob container URL.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub data_path: String,

    /// Blob container name; when absent it is derived from `data_path`.
    #[serde(default)]
    pub container_name: Option<String>,

    /// Local path or URL of the usage-guide markdown.
    #[serde(default)]
    pub guide_path: Option<String>,

    /// Fallback AI agent URL when a certification has none of its own.
    #[serde(default)]
    pub default_ai_agent_url: Option<String>,

    /// Hosts the supplementary-content fetcher may contact. Empty means
    /// the capability is disabled.
    #[serde(default)]
    pub supplement_hosts: Vec<String>,
}

impl AppConfig {
    /// Load the configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}
