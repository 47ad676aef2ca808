//! Error types for settings validation in wakenode-types.

use thiserror::Error;

/// Errors raised when a stored setting cannot be used as-is.
///
/// This error type is platform-agnostic and does not include
/// collaborator failures (those belong in wakenode-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum SettingsError {
    /// The value is NaN or infinite.
    #[error("Setting '{name}' is not a finite number")]
    NotFinite {
        /// Setting name.
        name: &'static str,
    },

    /// The value lies outside the accepted range.
    #[error("Setting '{name}' = {value} is out of range ({min}..={max})")]
    OutOfRange {
        /// Setting name.
        name: &'static str,
        /// Rejected value.
        value: f64,
        /// Smallest accepted value.
        min: f64,
        /// Largest accepted value.
        max: f64,
    },
}

/// Result type alias using wakenode-types' SettingsError type.
pub type SettingsResult<T> = std::result::Result<T, SettingsError>;
