//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, request timeout, an optional data
//! directory override and the last used username.
//!
//! Configuration is stored at `<config dir>/AvatarGallery/config.json`.
//! `AVATAR_GALLERY_API_URL` and `AVATAR_GALLERY_DATA_DIR` (also read from a
//! `.env` file) override the stored values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_BASE_URL;

/// Application name used for config/data directory paths
const APP_NAME: &str = "AvatarGallery";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_API_URL: &str = "AVATAR_GALLERY_API_URL";
const ENV_DATA_DIR: &str = "AVATAR_GALLERY_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub data_dir: Option<PathBuf>,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            data_dir: None,
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the standard location, then apply environment overrides
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_DATA_DIR).ok(),
        );
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_overrides(&mut self, api_url: Option<String>, data_dir: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(dir) = data_dir.filter(|d| !d.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir.trim()));
        }
    }

    /// Per-user directory holding the ID list, cache and saved login
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "https://api.vrchat.cloud/api/1");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.last_username.is_none());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            last_username: Some("alice".to_string()),
            request_timeout_secs: 10,
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"last_username": "bob"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.last_username.as_deref(), Some("bob"));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(Some("http://localhost:8080/api/1".to_string()), None);
        assert_eq!(config.api_base_url, "http://localhost:8080/api/1");
        assert!(config.data_dir.is_none());

        config.apply_overrides(Some("   ".to_string()), Some("/tmp/gallery".to_string()));
        assert_eq!(config.api_base_url, "http://localhost:8080/api/1");
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/gallery"));
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = Config {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
