// Configuration management for the scrobbler
// Handles loading/saving settings, with sensible defaults when config is missing

use crate::queue::DEFAULT_CAPACITY;
use crate::remote::Session;
use anyhow::{Context, Result};
use dirs::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub state_dir: PathBuf,
    pub session: SessionConfig,
    pub scrobbling: ScrobblingConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

/// Credentials from whatever signed the user in; we never log in ourselves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub username: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrobblingConfig {
    pub scrobble_media_player: bool,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub notifications: bool,
    pub notification_duration_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        let state_dir = data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scrobbler");

        Self {
            logging: LoggingConfig {
                directory: state_dir.join("logs"),
                filter: "info,scrobbler=debug".to_string(),
            },
            state_dir,
            session: SessionConfig::default(),
            scrobbling: ScrobblingConfig {
                scrobble_media_player: true,
                queue_capacity: DEFAULT_CAPACITY,
            },
            display: DisplayConfig {
                notifications: false,
                notification_duration_ms: 3000,
            },
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults there on first run
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content)?;

        Ok(())
    }

    /// Session to scrobble with, if a key has been configured
    pub fn session(&self) -> Option<Session> {
        self.session
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(|key| Session::new(key, self.session.username.clone()))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("scrobbler");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.scrobbling.scrobble_media_player);
        assert_eq!(config.scrobbling.queue_capacity, 200);
        assert!(config.session().is_none());
        assert!(config.state_dir.ends_with("scrobbler"));
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_session_from_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.session.username = Some("himokai".to_string());
        config.session.key = Some("abc123".to_string());
        config.save_to(&path).unwrap();

        let session = Config::load_from(&path).unwrap().session().unwrap();
        assert_eq!(session.key(), "abc123");
        assert_eq!(session.username(), Some("himokai"));

        config.session.key = Some(String::new());
        assert!(config.session().is_none());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "state_dir = [").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
