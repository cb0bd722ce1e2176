use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::{CrossVolumePolicy, DeleteOptions, PropertiesOptions, TransferOptions};
use crate::observability::Rotation;

const DEFAULT_LOG_LEVEL: &str = "info";

#[inline]
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[inline]
fn default_true() -> bool {
    true
}

/// Tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional log file directory (if None, only console logging)
    #[serde(default)]
    pub log_directory: Option<PathBuf>,

    /// Log file rotation strategy
    #[serde(default)]
    pub log_rotation: LogRotation,

    /// Defaults applied to every operation
    #[serde(default)]
    pub defaults: OperationDefaults,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_directory: None,
            log_rotation: LogRotation::default(),
            defaults: OperationDefaults::default(),
        }
    }
}

/// Log file rotation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate daily
    #[default]
    Daily,
    /// Rotate hourly
    Hourly,
    /// Never rotate (single file)
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::Daily,
            LogRotation::Hourly => Rotation::Hourly,
            LogRotation::Never => Rotation::Never,
        }
    }
}

/// Behaviour switches shared by the tree operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationDefaults {
    /// Skip directories that cannot be listed instead of failing
    #[serde(default)]
    pub continue_on_access_error: bool,

    /// Copy access control and timestamps
    #[serde(default)]
    pub preserve_metadata: bool,

    /// Replace existing destinations
    #[serde(default)]
    pub overwrite: bool,

    /// Clear read-only attributes that block a delete
    #[serde(default = "default_true")]
    pub ignore_read_only: bool,

    /// Cross-volume move strategy
    #[serde(default)]
    pub cross_volume: CrossVolumePolicy,

    /// Whether `props` walks the whole tree
    #[serde(default)]
    pub recursive_properties: bool,
}

impl Default for OperationDefaults {
    fn default() -> Self {
        Self {
            continue_on_access_error: false,
            preserve_metadata: false,
            overwrite: false,
            ignore_read_only: true,
            cross_volume: CrossVolumePolicy::default(),
            recursive_properties: false,
        }
    }
}

impl OperationDefaults {
    pub fn delete_options(&self, recursive: bool) -> DeleteOptions {
        DeleteOptions {
            recursive,
            ignore_read_only: self.ignore_read_only,
            ..DeleteOptions::default()
        }
    }

    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            preserve_metadata: self.preserve_metadata,
            cross_volume: self.cross_volume,
            overwrite: self.overwrite,
            transaction: None,
        }
    }

    pub fn properties_options(&self) -> PropertiesOptions {
        PropertiesOptions {
            recursive: self.recursive_properties,
            continue_on_access_error: self.continue_on_access_error,
            transaction: None,
        }
    }
}
