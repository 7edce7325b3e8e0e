//! Loading, validating and saving [`EngineSettings`].
//!
//! Saves are atomic: the document is written to a sibling temp file which is
//! then renamed over the target.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::settings::EngineSettings;

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl EngineSettings {
    /// Parse and validate settings from a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let settings: EngineSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to a TOML document.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load settings from a file.
    ///
    /// Returns error if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save settings to a file atomically, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = path.with_extension("toml.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Install the stderr log subscriber at the configured `[logging]` level.
    ///
    /// Returns `false` if a global subscriber was already installed.
    pub fn init_logging(&self) -> bool {
        crate::logging::init_tracing(self.logging.level)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.processing_sample_rate.is_finite() && self.processing_sample_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "processing_sample_rate must be positive, got {}",
                self.processing_sample_rate
            )));
        }

        let r = &self.resampler;
        if r.sinc_len == 0 {
            return Err(ConfigError::Invalid("resampler.sinc_len must be > 0".into()));
        }
        if !(r.f_cutoff > 0.0 && r.f_cutoff <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "resampler.f_cutoff must be in (0, 1], got {}",
                r.f_cutoff
            )));
        }
        if r.oversampling_factor == 0 {
            return Err(ConfigError::Invalid(
                "resampler.oversampling_factor must be > 0".into(),
            ));
        }
        Ok(())
    }
}
