//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use microlend_core::{Config, UpdateStrategy};

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "notification_capacity": config.notification_capacity,
                    "update_strategy": config.update_strategy,
                    "log_level": config.log_level,
                    "default_language": config.default_language
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:              {}", config.data_dir.display());
            println!("  notification_capacity: {}", config.notification_capacity);
            println!("  update_strategy:       {}", config.update_strategy);
            println!("  log_level:             {}", config.log_level);
            println!("  default_language:      {}", config.default_language);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "notification_capacity" => {
            let capacity: usize = value
                .parse()
                .context("Invalid value for notification_capacity. Use a positive number.")?;
            if capacity == 0 {
                bail!("notification_capacity must be at least 1");
            }
            config.notification_capacity = capacity;
        }
        "update_strategy" => {
            config.update_strategy = value
                .parse::<UpdateStrategy>()
                .map_err(anyhow::Error::msg)?;
        }
        "log_level" => {
            config.log_level = value.to_string();
        }
        "default_language" => {
            config.default_language = value.to_string();
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, notification_capacity, update_strategy, log_level, default_language",
                key
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "notification_capacity", "12").unwrap();
        apply(&mut config, "update_strategy", "optimistic_rollback").unwrap();
        apply(&mut config, "default_language", "en").unwrap();

        assert_eq!(config.notification_capacity, 12);
        assert_eq!(config.update_strategy, UpdateStrategy::OptimisticRollback);
        assert_eq!(config.default_language, "en");
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();

        assert!(apply(&mut config, "notification_capacity", "0").is_err());
        assert!(apply(&mut config, "notification_capacity", "many").is_err());
        assert!(apply(&mut config, "update_strategy", "lazy").is_err());
        assert!(apply(&mut config, "sync_url", "ws://x").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_set_writes_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            format!("data_dir = {:?}\n", temp_dir.path().join("data")),
        )
        .unwrap();
        let output = Output::new(OutputFormat::Quiet);

        set("log_level".into(), "debug".into(), Some(&path), &output).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("log_level = \"debug\""));
    }
}
