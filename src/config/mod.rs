pub mod models;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

pub use models::{LogRotation, OperationDefaults, ToolConfig};

/// Load the JSON configuration at `path`. No path, or a missing file, yields defaults.
pub fn load_config(path: Option<&Path>) -> Result<ToolConfig> {
    let Some(path) = path else {
        return Ok(ToolConfig::default());
    };

    if !path.exists() {
        debug!("Configuration file {} not found, using defaults", path.display());
        return Ok(ToolConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: ToolConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    Ok(config)
}
