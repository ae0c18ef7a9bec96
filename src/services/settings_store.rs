use super::SettingsStore;
use crate::models::*;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Settings store backed by the monitor's `config.json`
pub struct JsonSettingsStore {
    config_path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load_config(&self) -> Result<UserConfig> {
        load_config(&self.config_path)
    }

    pub fn save_config(&self, config: &UserConfig) -> Result<()> {
        save_config(&self.config_path, config)
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get_manual_override(&self) -> Result<ManualOverride> {
        Ok(self.load_config()?.manual_override)
    }

    fn set_manual_override(&self, manual: &ManualOverride) -> Result<()> {
        let mut config = self.load_config()?;
        config.manual_override = manual.clone();
        self.save_config(&config)?;
        log::info!(
            "Manual plan override {}",
            match (&manual.enabled, &manual.tier) {
                (true, Some(tier)) => format!("set to {tier}"),
                _ => "cleared".to_string(),
            }
        );
        Ok(())
    }
}

/// Read the config, falling back to defaults when the file does not exist
pub fn load_config(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid config {}", path.display()))
}

pub fn save_config(path: &Path, config: &UserConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config {}", path.display()))?;
    Ok(())
}

/// Load the config, writing the defaults on first run
pub fn load_or_create_config(path: &Path) -> Result<UserConfig> {
    if path.exists() {
        load_config(path)
    } else {
        let config = UserConfig::default();
        save_config(path, &config)?;
        Ok(config)
    }
}
