//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/microlend/config.toml)
//! 3. Environment variables (MICROLEND_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::collection::UpdateStrategy;
use crate::notifications::DEFAULT_CAPACITY;

/// Environment variable prefix
const ENV_PREFIX: &str = "MICROLEND";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for persisted state and the local backend
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum number of notifications kept in the queue
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,

    /// How collection stores apply updates locally
    #[serde(default)]
    pub update_strategy: UpdateStrategy,

    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Language used before any preference is saved
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            notification_capacity: default_notification_capacity(),
            update_strategy: UpdateStrategy::default(),
            log_level: default_log_level(),
            default_language: default_language(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (MICROLEND_DATA_DIR, MICROLEND_NOTIFICATION_CAPACITY,
    ///    MICROLEND_UPDATE_STRATEGY, MICROLEND_LOG_LEVEL)
    /// 2. Config file (~/.config/microlend/config.toml or MICROLEND_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_NOTIFICATION_CAPACITY", ENV_PREFIX)) {
            match val.parse() {
                Ok(capacity) => self.notification_capacity = capacity,
                Err(_) => warn!(value = %val, "Ignoring invalid notification capacity"),
            }
        }

        if let Ok(val) = std::env::var(format!("{}_UPDATE_STRATEGY", ENV_PREFIX)) {
            match val.parse() {
                Ok(strategy) => self.update_strategy = strategy,
                Err(e) => warn!(value = %val, "Ignoring update strategy: {}", e),
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with MICROLEND_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("microlend")
            .join("config.toml")
    }

    /// Directory of the persistence adapter (auth session, UI preferences)
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// Directory of the local document backend
    pub fn backend_dir(&self) -> PathBuf {
        self.data_dir.join("backend")
    }

    /// Notification capacity, never below one
    pub fn effective_notification_capacity(&self) -> usize {
        self.notification_capacity.max(1)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("microlend")
}

fn default_notification_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_language() -> String {
    "es".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|p| p.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "MICROLEND_DATA_DIR",
        "MICROLEND_NOTIFICATION_CAPACITY",
        "MICROLEND_UPDATE_STRATEGY",
        "MICROLEND_LOG_LEVEL",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.notification_capacity, 50);
        assert_eq!(config.update_strategy, UpdateStrategy::Confirmed);
        assert_eq!(config.log_level, "warn");
        assert!(config.data_dir.ends_with("microlend"));
    }

    #[test]
    fn test_derived_paths() {
        let config = Config {
            data_dir: PathBuf::from("/data/microlend"),
            ..Config::default()
        };

        assert_eq!(config.state_dir(), PathBuf::from("/data/microlend/state"));
        assert_eq!(config.backend_dir(), PathBuf::from("/data/microlend/backend"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("MICROLEND_DATA_DIR", "/tmp/microlend-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/microlend-test"));
    }

    #[test]
    fn test_env_override_capacity_and_strategy() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("MICROLEND_NOTIFICATION_CAPACITY", "10");
        env::set_var("MICROLEND_UPDATE_STRATEGY", "optimistic-rollback");
        config.apply_env_overrides();

        assert_eq!(config.notification_capacity, 10);
        assert_eq!(config.update_strategy, UpdateStrategy::OptimisticRollback);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("MICROLEND_NOTIFICATION_CAPACITY", "lots");
        env::set_var("MICROLEND_UPDATE_STRATEGY", "eventually");
        config.apply_env_overrides();

        assert_eq!(config.notification_capacity, 50);
        assert_eq!(config.update_strategy, UpdateStrategy::Confirmed);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            notification_capacity = 20
            update_strategy = "optimistic"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.notification_capacity, 20);
        assert_eq!(config.update_strategy, UpdateStrategy::Optimistic);
        assert_eq!(config.default_language, "es");
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let config = Config {
            notification_capacity: 0,
            ..Config::default()
        };
        assert_eq!(config.effective_notification_capacity(), 1);
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = Config {
            data_dir: temp_dir.path().join("data"),
            notification_capacity: 5,
            update_strategy: UpdateStrategy::OptimisticRollback,
            log_level: "debug".to_string(),
            default_language: "en".to_string(),
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(config.data_dir.exists());
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("MICROLEND_DATA_DIR", temp_dir.path().join("data"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.notification_capacity, 50);
    }
}
