//! Core types for wake-cycle sensor data.

use core::fmt;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SettingsError, SettingsResult};
use crate::properties::{DEEP_SLEEP_SECONDS_SETTING, VOLTAGE_COEFFICIENT_SETTING};

/// Family of single-wire temperature/humidity sensor on a channel.
///
/// The model only affects how the driver talks to the part; the reading
/// format is identical across models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[non_exhaustive]
pub enum SensorModel {
    /// DHT11 (1 °C / 1 % resolution).
    Dht11,
    /// DHT21 / AM2301.
    Dht21,
    /// DHT22 / AM2302.
    #[default]
    Dht22,
}

impl SensorModel {
    /// Minimum time between two conversions the part accepts.
    #[must_use]
    pub fn min_sample_interval(&self) -> Duration {
        match self {
            SensorModel::Dht11 => Duration::from_secs(1),
            SensorModel::Dht21 | SensorModel::Dht22 => Duration::from_secs(2),
        }
    }
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorModel::Dht11 => write!(f, "DHT11"),
            SensorModel::Dht21 => write!(f, "DHT21"),
            SensorModel::Dht22 => write!(f, "DHT22"),
        }
    }
}

/// Convert degrees Celsius to degrees Fahrenheit.
#[must_use]
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 1.8 + 32.0
}

/// Heat index in °F from a Fahrenheit temperature and relative humidity.
///
/// Uses the NWS algorithm: Steadman's simple formula when it yields 79 °F
/// or less, otherwise the Rothfusz regression with the low-humidity and
/// high-humidity adjustments. Returns `None` if either input is not finite.
///
/// # Examples
///
/// ```
/// use wakenode_types::heat_index_fahrenheit;
///
/// let hi = heat_index_fahrenheit(77.0, 50.0).unwrap();
/// assert!((hi - 76.75).abs() < 0.001);
/// assert!(heat_index_fahrenheit(f32::NAN, 50.0).is_none());
/// ```
#[must_use]
pub fn heat_index_fahrenheit(temperature_f: f32, humidity: f32) -> Option<f32> {
    if !temperature_f.is_finite() || !humidity.is_finite() {
        return None;
    }

    let t = f64::from(temperature_f);
    let rh = f64::from(humidity);

    let simple = 0.5 * (t + 61.0 + ((t - 68.0) * 1.2) + (rh * 0.094));
    if simple <= 79.0 {
        return Some(simple as f32);
    }

    let mut hi = -42.379 + 2.049_015_23 * t + 10.143_331_27 * rh
        - 0.224_755_41 * t * rh
        - 0.006_837_83 * t * t
        - 0.054_817_17 * rh * rh
        + 0.001_228_74 * t * t * rh
        + 0.000_852_82 * t * rh * rh
        - 0.000_001_99 * t * t * rh * rh;

    if rh < 13.0 && (80.0..=112.0).contains(&t) {
        hi -= ((13.0 - rh) * 0.25) * ((17.0 - (t - 95.0).abs()) * 0.058_82).sqrt();
    } else if rh > 85.0 && (80.0..=87.0).contains(&t) {
        hi += ((rh - 85.0) * 0.1) * ((87.0 - t) * 0.2);
    }

    Some(hi as f32)
}

/// One raw conversion as returned by a sensor driver.
///
/// Drivers report NaN (or clear `is_valid`) when the bus transaction missed
/// its timing window or the checksum failed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawSample {
    /// Temperature in degrees Celsius.
    pub temperature_c: f32,
    /// Temperature in degrees Fahrenheit.
    pub temperature_f: f32,
    /// Relative humidity percentage.
    pub humidity: f32,
    /// Driver-level validity flag (checksum and timing).
    pub is_valid: bool,
}

impl RawSample {
    /// Build a valid sample from Celsius and humidity, deriving Fahrenheit.
    #[must_use]
    pub fn from_celsius(temperature_c: f32, humidity: f32) -> Self {
        Self {
            temperature_c,
            temperature_f: celsius_to_fahrenheit(temperature_c),
            humidity,
            is_valid: true,
        }
    }

    /// A sample for a failed bus transaction.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            temperature_c: f32::NAN,
            temperature_f: f32::NAN,
            humidity: f32::NAN,
            is_valid: false,
        }
    }

    /// Whether every field is usable.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.is_valid
            && self.temperature_c.is_finite()
            && self.temperature_f.is_finite()
            && self.humidity.is_finite()
    }
}

/// A validated temperature/humidity reading.
///
/// Only [`Reading::from_sample`] builds one from driver output, and it
/// refuses unusable samples, so a `Reading` in hand is always valid.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Temperature in degrees Celsius.
    pub temperature_c: f32,
    /// Temperature in degrees Fahrenheit.
    pub temperature_f: f32,
    /// Relative humidity percentage.
    pub humidity: f32,
    /// Derived heat index in °F, if requested.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub heat_index: Option<f32>,
}

impl Reading {
    /// Validate a raw sample and optionally derive the heat index.
    ///
    /// Returns `None` if the sample is not usable.
    #[must_use]
    pub fn from_sample(sample: RawSample, with_heat_index: bool) -> Option<Self> {
        if !sample.is_usable() {
            return None;
        }

        let heat_index = if with_heat_index {
            heat_index_fahrenheit(sample.temperature_f, sample.humidity)
        } else {
            None
        };

        Some(Self {
            temperature_c: sample.temperature_c,
            temperature_f: sample.temperature_f,
            humidity: sample.humidity,
            heat_index,
        })
    }

    /// Whether all measured fields are finite numbers.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.temperature_c.is_finite() && self.temperature_f.is_finite() && self.humidity.is_finite()
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} °C / {:.2} °F, {:.2} %RH",
            self.temperature_c, self.temperature_f, self.humidity
        )?;
        if let Some(hi) = self.heat_index {
            write!(f, ", heat index {:.2} °F", hi)?;
        }
        Ok(())
    }
}

/// Battery voltage sampled once per wake cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatteryStatus {
    /// Raw ADC count.
    pub raw_sample: u16,
    /// Volts per ADC count.
    pub coefficient: f32,
    /// Scaled voltage.
    pub voltage: f32,
}

impl BatteryStatus {
    /// Scale a raw ADC count by the divider coefficient.
    ///
    /// # Examples
    ///
    /// ```
    /// use wakenode_types::BatteryStatus;
    ///
    /// let status = BatteryStatus::from_raw(600, 0.0055);
    /// assert!((status.voltage - 3.3).abs() < 1e-4);
    /// ```
    #[must_use]
    pub fn from_raw(raw_sample: u16, coefficient: f32) -> Self {
        Self {
            raw_sample,
            coefficient,
            voltage: f32::from(raw_sample) * coefficient,
        }
    }
}

/// Default ADC-to-volts coefficient: a 415K/100K divider on a 10-bit, 1 V ADC.
pub const DEFAULT_VOLTAGE_COEFFICIENT: f32 = 0.0055;

/// Default sleep between wake cycles.
pub const DEFAULT_DEEP_SLEEP_SECONDS: u32 = 300;

/// Longest sleep the power timer can be programmed for (about 3.5 hours).
pub const MAX_DEEP_SLEEP_SECONDS: u32 = 12_600;

/// Node settings read once per wake cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Settings {
    /// Volts per battery ADC count.
    pub voltage_coefficient: f32,
    /// Duration of the next deep sleep.
    pub deep_sleep_seconds: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            voltage_coefficient: DEFAULT_VOLTAGE_COEFFICIENT,
            deep_sleep_seconds: DEFAULT_DEEP_SLEEP_SECONDS,
        }
    }
}

impl Settings {
    /// Check a stored coefficient value.
    pub fn validate_coefficient(value: f64) -> SettingsResult<f32> {
        const MIN: f64 = 0.000_001;
        const MAX: f64 = 1.0;

        if !value.is_finite() {
            return Err(SettingsError::NotFinite {
                name: VOLTAGE_COEFFICIENT_SETTING,
            });
        }
        if !(MIN..=MAX).contains(&value) {
            return Err(SettingsError::OutOfRange {
                name: VOLTAGE_COEFFICIENT_SETTING,
                value,
                min: MIN,
                max: MAX,
            });
        }
        Ok(value as f32)
    }

    /// Check a stored sleep duration.
    pub fn validate_deep_sleep(value: i64) -> SettingsResult<u32> {
        let max = i64::from(MAX_DEEP_SLEEP_SECONDS);
        if !(1..=max).contains(&value) {
            return Err(SettingsError::OutOfRange {
                name: DEEP_SLEEP_SECONDS_SETTING,
                value: value as f64,
                min: 1.0,
                max: max as f64,
            });
        }
        Ok(value as u32)
    }

    /// Sleep duration as a [`Duration`].
    #[must_use]
    pub fn deep_sleep(&self) -> Duration {
        Duration::from_secs(u64::from(self.deep_sleep_seconds))
    }

    /// Sleep duration in microseconds, as the power controller expects it.
    #[must_use]
    pub fn deep_sleep_micros(&self) -> u64 {
        u64::from(self.deep_sleep_seconds) * 1_000_000
    }
}

/// Wake-cycle lifecycle state.
///
/// States only move forward; `Sleeping` is terminal for a process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LifecycleState {
    /// Transport is establishing its session.
    Connecting,
    /// Transport is usable; one-time setup runs here.
    Ready,
    /// Waiting for every channel to publish.
    Reporting,
    /// Shutdown requested; waiting for the transport to confirm the flush.
    AwaitingShutdownConfirm,
    /// Power-down issued.
    Sleeping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Connecting => write!(f, "connecting"),
            LifecycleState::Ready => write!(f, "ready"),
            LifecycleState::Reporting => write!(f, "reporting"),
            LifecycleState::AwaitingShutdownConfirm => write!(f, "awaiting shutdown confirm"),
            LifecycleState::Sleeping => write!(f, "sleeping"),
        }
    }
}

/// Firmware identity announced to the transport at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FirmwareInfo {
    /// Firmware name.
    pub name: String,
    /// Firmware version.
    pub version: String,
    /// Brand prefix used by the transport's topic layout.
    pub brand: String,
}

impl Default for FirmwareInfo {
    fn default() -> Self {
        Self {
            name: "tempsensor".to_string(),
            version: "1.0.0".to_string(),
            brand: "clough42".to_string(),
        }
    }
}

impl fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} v{}", self.brand, self.name, self.version)
    }
}
