//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::AppError;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `KEYS_FILE` (optional): store file, defaults to `keys.json`
/// - `BACKUP_DIR` (optional): backup directory, defaults to `backups`
/// - `BACKUPS_ENABLED` (optional): snapshot before each save, defaults to true
/// - `EXPORT_DIR` (optional): where valid-key exports are written, defaults to `.`
/// - `DEFAULT_DURATION_HOURS` (optional): key lifetime, defaults to 24
/// - `AUTO_PUBLISH` (optional): commit and push after mutations, defaults to false
/// - `REPO_DIR` (optional): git working tree used for publishing, defaults to `.`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_keys_file")]
    pub keys_file: PathBuf,

    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    #[serde(default = "default_true")]
    pub backups_enabled: bool,

    #[serde(default = "default_current_dir")]
    pub export_dir: PathBuf,

    #[serde(default = "default_duration_hours")]
    pub default_duration_hours: u32,

    #[serde(default)]
    pub auto_publish: bool,

    #[serde(default = "default_current_dir")]
    pub repo_dir: PathBuf,
}

fn default_keys_file() -> PathBuf {
    PathBuf::from("keys.json")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_current_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_duration_hours() -> u32 {
    24
}

fn default_true() -> bool {
    true
}

/// The subset of configuration a [`KeyStore`](crate::services::key_store::KeyStore) needs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub keys_file: PathBuf,
    /// `None` disables backups.
    pub backup_dir: Option<PathBuf>,
    pub export_dir: PathBuf,
    pub default_duration_hours: u32,
}

impl StoreConfig {
    /// Store rooted in `dir`: `keys.json`, `backups/`, exports next to the store.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            keys_file: dir.join("keys.json"),
            backup_dir: Some(dir.join("backups")),
            export_dir: dir,
            default_duration_hours: default_duration_hours(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variable values cannot be parsed into
    /// expected types (e.g., `DEFAULT_DURATION_HOURS=abc`).
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: keys_file -> KEYS_FILE
        envy::from_env::<Config>()
    }

    /// Project the settings the key store needs.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the default duration is zero.
    pub fn store_config(&self) -> Result<StoreConfig, AppError> {
        if self.default_duration_hours == 0 {
            return Err(AppError::InvalidInput(
                "DEFAULT_DURATION_HOURS must be positive".to_string(),
            ));
        }

        Ok(StoreConfig {
            keys_file: self.keys_file.clone(),
            backup_dir: self.backups_enabled.then(|| self.backup_dir.clone()),
            export_dir: self.export_dir.clone(),
            default_duration_hours: self.default_duration_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        envy::from_iter::<_, Config>(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.keys_file, PathBuf::from("keys.json"));
        assert_eq!(config.backup_dir, PathBuf::from("backups"));
        assert!(config.backups_enabled);
        assert_eq!(config.default_duration_hours, 24);
        assert!(!config.auto_publish);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("KEYS_FILE", "/tmp/store.json"),
            ("DEFAULT_DURATION_HOURS", "48"),
            ("AUTO_PUBLISH", "true"),
            ("BACKUPS_ENABLED", "false"),
        ]);

        assert_eq!(config.keys_file, PathBuf::from("/tmp/store.json"));
        assert_eq!(config.default_duration_hours, 48);
        assert!(config.auto_publish);

        let store = config.store_config().unwrap();
        assert!(store.backup_dir.is_none());
    }

    #[test]
    fn test_non_numeric_duration_is_rejected() {
        let result = envy::from_iter::<_, Config>(vec![(
            "DEFAULT_DURATION_HOURS".to_string(),
            "abc".to_string(),
        )]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_duration_is_invalid() {
        let config = config_from(&[("DEFAULT_DURATION_HOURS", "0")]);
        assert!(matches!(
            config.store_config(),
            Err(AppError::InvalidInput(_))
        ));
    }
}
