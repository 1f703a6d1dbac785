use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::error::StorageSystemError;

type Result<T> = std::result::Result<T, StorageSystemError>;

/// Configuration formats supported by the settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Persisted plugin runtime settings.
///
/// Enablement overrides here are applied after the descriptors' own
/// defaults and before the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Searched for descriptors before any `-pluginpath`
    pub plugin_paths: Vec<PathBuf>,
    /// Plugins not to load even though they are enabled by default
    pub disabled_plugins: Vec<String>,
    /// Plugins to load even though they are disabled by default
    pub force_enabled_plugins: Vec<String>,
}

impl PluginSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads settings from `path`, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            StorageSystemError::UnsupportedConfigFormat {
                path: path.to_path_buf(),
            }
        })?;
        let data = fs::read_to_string(path).map_err(|source| StorageSystemError::Io {
            path: path.to_path_buf(),
            operation: "read_settings".to_string(),
            source,
        })?;
        let settings = Self::deserialize(&data, format).map_err(|source| {
            StorageSystemError::DeserializationError {
                path: path.to_path_buf(),
                format: format.extension().to_string(),
                source,
            }
        })?;
        log::debug!("Loaded plugin settings from {}", path.display());
        Ok(settings)
    }

    /// Writes settings to `path`, choosing the format by extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            StorageSystemError::UnsupportedConfigFormat {
                path: path.to_path_buf(),
            }
        })?;
        let data = self.serialize(format)?;
        fs::write(path, data).map_err(|source| StorageSystemError::Io {
            path: path.to_path_buf(),
            operation: "write_settings".to_string(),
            source,
        })
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        let serialization_error = |source: Box<dyn std::error::Error + Send + Sync>| {
            StorageSystemError::SerializationError {
                format: format.extension().to_string(),
                source,
            }
        };
        match format {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(self).map_err(|e| serialization_error(Box::new(e)))
            }
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => {
                serde_yaml::to_string(self).map_err(|e| serialization_error(Box::new(e)))
            }
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| serialization_error(Box::new(e)))
            }
        }
    }

    /// Deserialize from string based on format
    pub fn deserialize(
        data: &str,
        format: ConfigFormat,
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        match format {
            ConfigFormat::Json => Ok(serde_json::from_str(data)?),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => Ok(serde_yaml::from_str(data)?),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => Ok(toml::from_str(data)?),
        }
    }

    /// Whether the settings override the enablement of `name`, and how
    pub fn enablement_override(&self, name: &str) -> Option<bool> {
        if self.force_enabled_plugins.iter().any(|n| n == name) {
            Some(true)
        } else if self.disabled_plugins.iter().any(|n| n == name) {
            Some(false)
        } else {
            None
        }
    }
}
