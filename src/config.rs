//! Engine configuration
//!
//! Everything the engine would otherwise take from class-level constants
//! (sample rate, control cadence, documented filter defaults) lives in an
//! explicit [`EngineConfig`] that is handed to the graph at construction.
//!
//! ```toml
//! sample_rate = 48000.0
//! control_period = 32
//!
//! [band_reject]
//! center_frequency = 3000.0
//! bandwidth = 2000.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Default center frequency and bandwidth for a Butterworth filter family (Hz)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDefaults {
    pub center_frequency: f32,
    pub bandwidth: f32,
}

impl Default for FilterDefaults {
    fn default() -> Self {
        Self {
            center_frequency: 3000.0,
            bandwidth: 2000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz (e.g., 44100.0)
    pub sample_rate: f32,

    /// Ticks between control-rate refreshes for parameters bound without an
    /// explicit cadence
    pub control_period: u32,

    /// Capacity of the live command and garbage queues
    pub queue_capacity: usize,

    pub band_reject: FilterDefaults,
    pub band_pass: FilterDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            control_period: 64,
            queue_capacity: 64,
            band_reject: FilterDefaults::default(),
            band_pass: FilterDefaults::default(),
        }
    }
}

impl EngineConfig {
    /// Default configuration at a different sample rate
    pub fn with_sample_rate(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate * 0.5
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        debug!(?config, "parsed engine config");
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Check structural limits. Filter defaults are only checked for sign here;
    /// their relation to Nyquist is validated by the designer at refresh time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.control_period == 0 {
            return Err(ConfigError::Invalid("control_period must be at least 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".to_string()));
        }
        for (family, defaults) in [("band_reject", &self.band_reject), ("band_pass", &self.band_pass)] {
            if !(defaults.center_frequency > 0.0 && defaults.bandwidth > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{family} defaults must be positive, got {:?}",
                    defaults
                )));
            }
        }
        Ok(())
    }
}
