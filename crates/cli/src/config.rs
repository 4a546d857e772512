//! Configuration management for the CLI
//!
//! Persists the API URL and the session token from the last login.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Used when neither a flag, the environment nor the config file sets one
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub api_url: Option<String>,
    /// Token from the last successful login
    pub session_token: Option<String>,
    pub username: Option<String>,
}

impl Config {
    /// Load the user config, or defaults when there is none
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        serde_json::from_str(&content).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Flag or env value first, then the saved URL, then the default
    pub fn resolve_api_url(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_string)
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn set_session(&mut self, username: &str, token: &str) {
        self.username = Some(username.to_string());
        self.session_token = Some(token.to_string());
    }

    pub fn clear_session(&mut self) {
        self.username = None;
        self.session_token = None;
    }

    fn config_path() -> Result<PathBuf> {
        let dir = dirs_next::config_dir().context("Could not determine config directory")?;
        Ok(dir.join("agm").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.resolve_api_url(None), DEFAULT_API_URL);
    }

    #[test]
    fn test_session_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agm").join("config.json");

        let mut config = Config {
            api_url: Some("http://market:5000".to_string()),
            ..Default::default()
        };
        config.set_session("farmer", "tok-1");
        config.save_to(&path).unwrap();

        let mut loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.session_token.as_deref(), Some("tok-1"));
        assert_eq!(loaded.resolve_api_url(None), "http://market:5000");
        assert_eq!(loaded.resolve_api_url(Some("http://other")), "http://other");

        loaded.clear_session();
        assert!(loaded.session_token.is_none());
        assert!(loaded.username.is_none());
    }
}
