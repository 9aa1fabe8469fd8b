mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

const APP_DIR: &str = "gyrocube";
const CONFIG_FILE: &str = "config.toml";

/// Returns the config directory: `<user config dir>/gyrocube/`
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join(APP_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Returns the config file path: `<user config dir>/gyrocube/config.toml`
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Load config from the default location. On first run the defaults are
/// written there so they can be edited.
pub fn load_config() -> Result<AppConfig> {
    load_or_create_from(&config_path()?)
}

/// Load and validate config from `path`. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        info!(?path, "No config found, using defaults");
        return Ok(AppConfig::default());
    }

    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| format!("Parsing {}", path.display()))?;
    config.validate()?;
    info!(?path, "Loaded config");
    Ok(config)
}

/// Like [`load_config_from`], but writes the defaults when `path` is missing.
/// An existing file is never rewritten, even if it fails to load.
pub fn load_or_create_from(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        return load_config_from(path);
    }
    let config = AppConfig::default();
    save_config_to(&config, path)?;
    Ok(config)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    info!(?path, "Saved config");
    Ok(())
}
