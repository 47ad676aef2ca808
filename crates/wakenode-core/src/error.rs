//! Error types for wakenode-core.
//!
//! Most failures in a wake cycle are not errors from the coordinator's point
//! of view: invalid sensor samples are retried, a missed reporting deadline
//! degrades to "skip this channel", and a connect failure simply means the
//! transport never reports ready. The variants here cover the calls that
//! can fail outright.
//!
//! # Recovery
//!
//! | Error Type | Coordinator response |
//! |------------|----------------------|
//! | [`Error::Driver`] | Logged, the read counts as pending, retried next attempt |
//! | [`Error::SensorNotInitialized`] | Programming error, channel skipped for this tick |
//! | [`Error::Transport`] | Logged, the channel counts as reported (no republish) |
//! | [`Error::Battery`] | Logged, battery report skipped for this cycle |
//! | [`Error::Power`] | Logged, power-down retried up to the configured attempts |
//! | [`Error::Settings`] | Returned by `try_load_settings`; `load_settings` logs and uses the default |
//! | [`Error::InvalidConfig`] | Returned from the builder, fix and restart |

use thiserror::Error;

use wakenode_types::SettingsError;

/// Errors raised by collaborators or by coordinator construction.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A read was attempted before the sensor finished its power-on step.
    #[error("Sensor on channel '{channel}' read before initialization")]
    SensorNotInitialized {
        /// Channel identifier.
        channel: String,
    },

    /// The sensor driver reported a bus-level failure.
    #[error("Sensor driver error on channel '{channel}': {message}")]
    Driver {
        /// Channel identifier.
        channel: String,
        /// Driver message.
        message: String,
    },

    /// The transport refused an operation.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The power controller refused to enter deep sleep.
    #[error("Power control error: {0}")]
    Power(String),

    /// The battery ADC could not be sampled.
    #[error("Battery input error: {0}")]
    Battery(String),

    /// A stored setting was rejected.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a driver error for a channel.
    pub fn driver(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Driver {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a power control error.
    pub fn power(message: impl Into<String>) -> Self {
        Self::Power(message.into())
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using wakenode-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::SensorNotInitialized {
            channel: "freezer".to_string(),
        };
        assert!(err.to_string().contains("freezer"));
        assert!(err.to_string().contains("before initialization"));

        let err = Error::driver("ambient", "checksum mismatch");
        assert_eq!(
            err.to_string(),
            "Sensor driver error on channel 'ambient': checksum mismatch"
        );

        let err = Error::transport("session closed");
        assert_eq!(err.to_string(), "Transport error: session closed");

        let err = Error::invalid_config("duplicate channel id");
        assert!(err.to_string().contains("duplicate channel id"));
    }

    #[test]
    fn test_settings_error_conversion() {
        let settings_err = wakenode_types::Settings::validate_deep_sleep(0).unwrap_err();
        let err: Error = settings_err.into();
        assert!(matches!(err, Error::Settings(_)));
        assert!(err.to_string().contains("deep_sleep_seconds"));
    }
}
