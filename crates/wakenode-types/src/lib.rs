//! Platform-agnostic types for wake-and-report sensor nodes.
//!
//! This crate provides the value types shared by the lifecycle core
//! (wakenode-core) and host tooling (wakenode-cli).
//!
//! # Features
//!
//! - Sensor readings and raw driver samples
//! - Heat index and unit conversion
//! - Battery voltage scaling
//! - Node settings with validation and defaults
//! - Published property names
//!
//! # Example
//!
//! ```
//! use wakenode_types::{RawSample, Reading};
//!
//! let sample = RawSample::from_celsius(25.0, 50.0);
//! let reading = Reading::from_sample(sample, true).unwrap();
//! assert!((reading.temperature_f - 77.0).abs() < 1e-4);
//! assert!(reading.heat_index.is_some());
//! ```

pub mod error;
pub mod properties;
pub mod types;

pub use error::{SettingsError, SettingsResult};
pub use types::{
    BatteryStatus, DEFAULT_DEEP_SLEEP_SECONDS, DEFAULT_VOLTAGE_COEFFICIENT, FirmwareInfo,
    LifecycleState, MAX_DEEP_SLEEP_SECONDS, RawSample, Reading, SensorModel, Settings,
    celsius_to_fahrenheit, heat_index_fahrenheit,
};
