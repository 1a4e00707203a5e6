//! Merge configuration from docmerge.toml

use crate::fuzzy::DEFAULT_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default name of the configuration file
pub const CONFIG_FILE_NAME: &str = "docmerge.toml";

/// Merge configuration
///
/// Every field is optional in the file; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Minimum fuzzy score (0-100) for a token to be mapped to a column
    pub threshold: u8,

    /// Text substituted for missing or empty values
    pub missing_value: String,

    /// Columns whose values name each output file, in order
    pub name_fields: Vec<String>,

    /// Explicit token → column assignments that bypass fuzzy matching
    pub overrides: BTreeMap<String, String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            missing_value: String::new(),
            name_fields: vec!["Product Name".to_string(), "Product Code".to_string()],
            overrides: BTreeMap::new(),
        }
    }
}

impl MergeConfig {
    /// Load configuration from a docmerge.toml file
    ///
    /// # Parameters
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(MergeConfig)` - Successfully loaded configuration
    /// * `Err(MergeConfigError)` - Error reading, parsing or validating the file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MergeConfigError> {
        let content = fs::read_to_string(&path).map_err(MergeConfigError::IoError)?;

        let config: MergeConfig =
            toml::from_str(&content).map_err(MergeConfigError::ParseError)?;
        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, MergeConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            log::debug!(
                "No configuration at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// Save configuration to a docmerge.toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MergeConfigError> {
        let content = toml::to_string_pretty(self).map_err(MergeConfigError::SerializeError)?;

        fs::write(&path, content).map_err(MergeConfigError::IoError)?;

        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), MergeConfigError> {
        if self.threshold > 100 {
            return Err(MergeConfigError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

/// Errors that can occur when loading or saving merge configuration
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum MergeConfigError {
    /// IO error when reading or writing file
    IoError(std::io::Error),

    /// Error parsing TOML
    ParseError(toml::de::Error),

    /// Error serializing to TOML
    SerializeError(toml::ser::Error),

    /// Threshold outside 0..=100
    InvalidThreshold(u8),
}

impl std::fmt::Display for MergeConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeConfigError::IoError(e) => write!(f, "IO error: {}", e),
            MergeConfigError::ParseError(e) => write!(f, "TOML parse error: {}", e),
            MergeConfigError::SerializeError(e) => write!(f, "TOML serialize error: {}", e),
            MergeConfigError::InvalidThreshold(t) => {
                write!(f, "Threshold must be between 0 and 100, got {}", t)
            }
        }
    }
}

impl std::error::Error for MergeConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MergeConfigError::IoError(e) => Some(e),
            MergeConfigError::ParseError(e) => Some(e),
            MergeConfigError::SerializeError(e) => Some(e),
            MergeConfigError::InvalidThreshold(_) => None,
        }
    }
}
