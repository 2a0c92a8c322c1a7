//! Application Configuration
//!
//! Inspection settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::inspection::{FieldTable, LabelSelection};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Reference database settings
    pub store: StoreSettings,
    /// Field mapping settings
    pub fields: FieldSettings,
    /// Inspection settings
    pub inspection: InspectionSettings,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Reference database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite database path; the application data directory when unset
    pub database: Option<PathBuf>,
}

/// Field mapping settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    /// TOML mapping table; the built-in table when unset
    pub mapping: Option<PathBuf>,
}

impl FieldSettings {
    /// Load the configured mapping table
    pub fn load_table(&self) -> Result<FieldTable> {
        match &self.mapping {
            Some(path) => FieldTable::from_file(path),
            None => Ok(FieldTable::builtin()),
        }
    }
}

/// Inspection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionSettings {
    /// Label type used when none is given on the command line
    pub default_label_type: LabelSelection,
    /// Detector classes marking the label frame rather than a field
    pub frame_markers: Vec<String>,
}

impl Default for InspectionSettings {
    fn default() -> Self {
        Self {
            default_label_type: LabelSelection::Auto,
            frame_markers: vec!["inside".to_string(), "outside".to_string()],
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {:?}", path))?;
    Ok(config)
}

/// Save configuration to file, creating the parent directory when needed
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write config: {:?}", path))?;
    Ok(())
}
