use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use lc_core::StreamConfig;

/// Loads the TOML config file, or falls back to defaults when it does not
/// exist. CLI overrides are applied by the caller on top of whatever this
/// returns.
pub fn load(path: &Path) -> Result<StreamConfig> {
    if !path.exists() {
        warn!("config file {} not found, using defaults", path.display());
        return Ok(StreamConfig::default());
    }

    info!("loading configuration from {}", path.display());
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let config: StreamConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;

    Ok(config)
}
