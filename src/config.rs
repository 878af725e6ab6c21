use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

pub const TICKETMASTER_KEY_VAR: &str = "TICKETMASTER_API_KEY";
pub const LASTFM_KEY_VAR: &str = "LASTFM_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub ticketmaster_api_key: Option<String>,
    pub lastfm_api_key: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing credential: set {0}")]
    CredentialMissing(&'static str),
    #[error("unreadable config file {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

impl AppConfig {
    /// Reads the optional config file, then lets environment variables win.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(default_config_path);
        let config = match path {
            Some(path) => Self::read_file(&path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::Unreadable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        serde_json::from_str(&contents).map_err(|err| ConfigError::Unreadable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    fn with_overrides<F>(mut self, get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = get(TICKETMASTER_KEY_VAR).filter(|key| !key.trim().is_empty()) {
            self.ticketmaster_api_key = Some(key);
        }
        if let Some(key) = get(LASTFM_KEY_VAR).filter(|key| !key.trim().is_empty()) {
            self.lastfm_api_key = Some(key);
        }
        self
    }

    /// The events-API key is the one credential the application cannot run
    /// without.
    pub fn require_ticketmaster_key(&self) -> Result<&str, ConfigError> {
        self.ticketmaster_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::CredentialMissing(TICKETMASTER_KEY_VAR))
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("concert-finder").join("config.json"))
}
