//! Settings persistence
//!
//! The settings store is written as a single pretty-printed JSON record.
//! The gauge core never touches the file; only the front end loads and saves.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::settings::SettingsStore;
use crate::constants::config;

/// Default location: `<config dir>/jobgauge-adjust/settings.json`
pub fn default_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(config::APP_DIR);
    path.push(config::FILENAME);
    path
}

/// Load settings, falling back to defaults when the file does not exist yet
pub fn load(path: &Path) -> Result<SettingsStore> {
    if !path.exists() {
        info!(path = %path.display(), "Settings file not found, using defaults");
        return Ok(SettingsStore::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {:?}", path))?;
    let mut store: SettingsStore = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse settings from {:?}", path))?;
    store.validate_and_clamp();

    info!(path = %path.display(), jobs = store.jobs.len(), "Loaded settings");
    Ok(store)
}

/// Write the whole record, creating the config directory when needed
pub fn save(store: &SettingsStore, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let json = serde_json::to_string_pretty(store).context("Failed to serialize settings to JSON")?;
    fs::write(path, json).with_context(|| format!("Failed to write settings to {:?}", path))?;

    info!(path = %path.display(), "Saved settings");
    Ok(())
}
