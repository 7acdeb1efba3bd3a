//! Engine configuration
//!
//! This module provides:
//! - Configuration structs for the daemon, the watched page, and the store
//! - TOML serialization with factory defaults
//! - A manager that loads the main config file, backing up corrupt files
//!   instead of failing

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Domain identity used for settings scoping
    pub domain: String,

    /// Sample rate for the shared processing context
    /// (0 = probe the default output device)
    pub sample_rate: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            domain: "local".to_string(),
            sample_rate: 0,
        }
    }
}

/// Watched page configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    /// Directory whose media files form the page
    pub media_dir: PathBuf,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("media"),
        }
    }
}

/// Settings store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON settings store
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("settings.json"),
        }
    }
}

/// Complete Auralift configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuraliftConfig {
    pub app: AppConfig,
    pub page: PageConfig,
    pub store: StoreConfig,
}

impl AuraliftConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Create factory default configuration
    pub fn factory_default() -> Self {
        Self::default()
    }
}

/// Configuration manager for the main Auralift config
///
/// Manages the main configuration file at `~/.config/auralift/config.toml`.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager rooted at a configuration directory
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");
        Self { config_path }
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/auralift` on Linux/Mac,
    /// `%APPDATA%\auralift` on Windows.
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("auralift"))
            .ok_or_else(|| {
                ConfigError::Invalid("Could not determine config directory".to_string())
            })
    }

    /// Get the config file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// If the config file doesn't exist, returns factory default and writes
    /// it for next time. If the config file is corrupt, backs it up and
    /// returns factory default.
    #[instrument(skip(self))]
    pub async fn load(&self) -> AuraliftConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = AuraliftConfig::factory_default();

            if let Err(e) = config.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }

            return config;
        }

        match AuraliftConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                // Backup the corrupt config
                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                AuraliftConfig::factory_default()
            }
        }
    }

    /// Save configuration to the managed path
    pub async fn save(&self, config: &AuraliftConfig) -> Result<()> {
        config.save_to_file(&self.config_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_factory_default() {
        let config = AuraliftConfig::factory_default();
        assert_eq!(config.app.domain, "local");
        assert_eq!(config.app.sample_rate, 0);
        assert_eq!(config.page.media_dir, PathBuf::from("media"));
        assert_eq!(config.store.path, PathBuf::from("settings.json"));
    }

    #[test]
    fn test_toml_sections() {
        let toml_str = toml::to_string_pretty(&AuraliftConfig::factory_default()).unwrap();
        assert!(toml_str.contains("[app]"));
        assert!(toml_str.contains("[page]"));
        assert!(toml_str.contains("[store]"));
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AuraliftConfig::factory_default();
        config.app.domain = "music.example.com".to_string();
        config.app.sample_rate = 44100;
        config.save_to_file(&path).await.unwrap();

        let loaded = AuraliftConfig::load_from_file(&path).await.unwrap();
        assert_eq!(loaded.app.domain, "music.example.com");
        assert_eq!(loaded.app.sample_rate, 44100);
    }

    #[tokio::test]
    async fn test_manager_creates_factory_default() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        let config = manager.load().await;
        assert_eq!(config.app.domain, "local");
        // Factory default was persisted for next time
        assert!(manager.config_path().exists());
    }

    #[tokio::test]
    async fn test_manager_backs_up_corrupt_config() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        tokio::fs::write(manager.config_path(), "not [valid toml")
            .await
            .unwrap();

        let config = manager.load().await;
        assert_eq!(config.app.domain, "local");

        let backup = manager.config_path().with_extension("toml.corrupt");
        assert!(backup.exists());
    }
}
