use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variable overriding the data directory
pub const HOME_ENV: &str = "SHEETPILOT_HOME";

const CONFIG_FILE: &str = "config.json";
const USER_DB_FILE: &str = "user_data.db";
const AUDIT_DB_FILE: &str = "audit_log.db";

/// Persistent application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Abort a pipeline at the first failing step
    pub stop_on_error: bool,
    /// bcrypt work factor for new password hashes
    pub bcrypt_cost: u32,
    /// `env_logger` filter used when `SHEETPILOT_LOG` is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stop_on_error: false,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            log_filter: "info".to_string(),
        }
    }
}

/// Locates and persists [`AppConfig`] and the databases under one directory.
pub struct ConfigStore {
    home: PathBuf,
}

impl ConfigStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// `$SHEETPILOT_HOME`, else `~/.sheetpilot`, else `./.sheetpilot`.
    pub fn default_home() -> PathBuf {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sheetpilot")
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }

    pub fn user_db_path(&self) -> PathBuf {
        self.home.join(USER_DB_FILE)
    }

    pub fn audit_db_path(&self) -> PathBuf {
        self.home.join(AUDIT_DB_FILE)
    }

    /// Write a default config if none exists yet. Returns `true` when the
    /// file was created.
    pub async fn ensure_config_file(&self) -> Result<bool> {
        if self.config_path().exists() {
            return Ok(false);
        }
        fs::create_dir_all(&self.home)
            .await
            .context("Failed to create config directory")?;
        self.save(&AppConfig::default()).await?;
        Ok(true)
    }

    pub async fn load(&self) -> Result<AppConfig> {
        self.ensure_config_file().await?;

        let path = self.config_path();
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub async fn save(&self, config: &AppConfig) -> Result<()> {
        let path = self.config_path();
        let json = serde_json::to_string_pretty(config)?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)
            .await
            .context("Failed to write temporary config file")?;
        fs::rename(&temp_path, &path)
            .await
            .context("Failed to atomically update config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_creates_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("home"));

        let config = store.load().await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(store.config_path().exists());
    }

    #[tokio::test]
    async fn test_ensure_config_file_reports_creation() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested"));

        assert!(store.ensure_config_file().await.unwrap());
        assert!(!store.ensure_config_file().await.unwrap());
    }

    #[tokio::test]
    async fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());

        let config = AppConfig {
            stop_on_error: true,
            ..AppConfig::default()
        };
        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        std::fs::write(store.config_path(), r#"{"stop_on_error": true}"#).unwrap();

        let config = store.load().await.unwrap();
        assert!(config.stop_on_error);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
    }
}
