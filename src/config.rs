//! Node Configuration
//!
//! Load-time settings read from TOML. Every field has a default, so an empty
//! document is a valid configuration.
//!
//! ```toml
//! fins = "fins.json"
//!
//! [controller]
//! frequency = 50.0
//! max_servos = 24
//!
//! [controller.gain]
//! amplitude = 0.5
//!
//! [connection]
//! retry = 0.1
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::actuator::Commands;
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_controller_frequency() -> f64 {
    50.0
}
const fn default_max_servos() -> usize {
    24
}
const fn default_gain() -> f64 {
    0.9
}
const fn default_retry() -> f64 {
    0.1
}
const fn default_expected_frequency() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// GainConfig
// ---------------------------------------------------------------------------

/// Per-parameter smoothing gains given to every discovered servo \[1/s\]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainConfig {
    #[serde(default = "default_gain")]
    pub frequency: f64,
    #[serde(default = "default_gain")]
    pub amplitude: f64,
    #[serde(default = "default_gain")]
    pub phase: f64,
    #[serde(default = "default_gain")]
    pub offset: f64,
}

impl Default for GainConfig {
    fn default() -> Self {
        Self {
            frequency: default_gain(),
            amplitude: default_gain(),
            phase: default_gain(),
            offset: default_gain(),
        }
    }
}

impl GainConfig {
    pub fn to_commands(&self) -> Commands {
        Commands::new(self.frequency, self.amplitude, self.phase, self.offset)
    }
}

// ---------------------------------------------------------------------------
// ControllerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Tick rate in Hz (default: 50)
    #[serde(default = "default_controller_frequency")]
    pub frequency: f64,

    /// Upper bound on the number of servos taken from discovery
    #[serde(default = "default_max_servos")]
    pub max_servos: usize,

    #[serde(default)]
    pub gain: GainConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            frequency: default_controller_frequency(),
            max_servos: default_max_servos(),
            gain: GainConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Tick period in seconds
    pub fn period(&self) -> f64 {
        1.0 / self.frequency
    }
}

// ---------------------------------------------------------------------------
// ConnectionConfig / DispatchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Seconds between discovery attempts while no servo is known
    #[serde(default = "default_retry")]
    pub retry: f64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry: default_retry(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Nominal input sample rate in Hz
    #[serde(default = "default_expected_frequency")]
    pub expected_frequency: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            expected_frequency: default_expected_frequency(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Fin set loaded at start, relative paths resolve against the config file
    #[serde(default)]
    pub fins: Option<PathBuf>,
}

fn positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl Config {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !positive_finite(self.controller.frequency) {
            return Err(ConfigError::InvalidFrequency(self.controller.frequency));
        }
        if !positive_finite(self.connection.retry) {
            return Err(ConfigError::InvalidRetry(self.connection.retry));
        }
        if !positive_finite(self.dispatch.expected_frequency) {
            return Err(ConfigError::InvalidValue {
                field: "dispatch.expected_frequency".into(),
                message: format!("{} must be finite and > 0", self.dispatch.expected_frequency),
            });
        }

        let gain = &self.controller.gain;
        for (name, value) in [
            ("frequency", gain.frequency),
            ("amplitude", gain.amplitude),
            ("phase", gain.phase),
            ("offset", gain.offset),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: format!("controller.gain.{}", name),
                    message: format!("{} must be finite and >= 0", value),
                });
            }
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let (Some(fins), Some(dir)) = (config.fins.as_ref(), path.parent()) {
            if fins.is_relative() {
                config.fins = Some(dir.join(fins));
            }
        }
        Ok(config)
    }
}
