//! Error types
//!
//! Configuration-surface failures carry the human-readable warning that is
//! reported back to the caller. Every variant maps onto one [`ErrorKind`].

use thiserror::Error;

/// Coarse classification of a [`MixError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A fin, actuator, output channel, coefficient or servo id is out of range
    NotFound,
    /// A connection references an input channel beyond the current sample
    IndexOutOfRange,
    /// The downstream command sink or hardware-profile service failed
    DownstreamUnavailable,
}

/// Errors raised by the mixing network, the registries and the controller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MixError {
    #[error("Fin {0} does not exist.")]
    FinNotFound(i64),

    #[error("Actuator {actuator} does not exist for fin {fin}.")]
    ActuatorNotFound { fin: i64, actuator: i64 },

    #[error("Output channel {channel} does not exist for fin {fin}, actuator {actuator}.")]
    OutputChannelNotFound { fin: i64, actuator: i64, channel: i64 },

    #[error(
        "Coefficient {id} does not exist for fin {fin}, actuator {actuator}, output channel {channel}."
    )]
    CoefficientNotFound {
        fin: i64,
        actuator: i64,
        channel: i64,
        id: i64,
    },

    #[error("Servo {0} does not exist.")]
    ServoNotFound(i64),

    #[error("Input channel {index} is out of range for a sample of {len} input(s).")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Downstream service unavailable: {0}")]
    DownstreamUnavailable(String),
}

impl MixError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MixError::FinNotFound(_)
            | MixError::ActuatorNotFound { .. }
            | MixError::OutputChannelNotFound { .. }
            | MixError::CoefficientNotFound { .. }
            | MixError::ServoNotFound(_) => ErrorKind::NotFound,
            MixError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            MixError::DownstreamUnavailable(_) => ErrorKind::DownstreamUnavailable,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid controller frequency: {0} (must be finite and > 0)")]
    InvalidFrequency(f64),

    #[error("Invalid connection retry period: {0} (must be finite and > 0)")]
    InvalidRetry(f64),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_text() {
        let err = MixError::CoefficientNotFound {
            fin: 0,
            actuator: 1,
            channel: 3,
            id: 2,
        };
        assert_eq!(
            err.to_string(),
            "Coefficient 2 does not exist for fin 0, actuator 1, output channel 3."
        );
        assert_eq!(MixError::FinNotFound(4).to_string(), "Fin 4 does not exist.");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(MixError::ServoNotFound(9).kind(), ErrorKind::NotFound);
        assert_eq!(
            MixError::IndexOutOfRange { index: 3, len: 2 }.kind(),
            ErrorKind::IndexOutOfRange
        );
        assert_eq!(
            MixError::DownstreamUnavailable("usc".into()).kind(),
            ErrorKind::DownstreamUnavailable
        );
    }
}
