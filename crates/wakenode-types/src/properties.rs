//! Published property namespace.
//!
//! Every value a node publishes lands under `<device_id>/<channel_id>/<key>`.
//! Sensor channels carry the four measurement keys; the battery and
//! diagnostics channels have fixed names.

// --- Sensor channel keys ---

/// Temperature in degrees Celsius.
pub const TEMP_C: &str = "tempC";

/// Temperature in degrees Fahrenheit.
pub const TEMP_F: &str = "tempF";

/// Relative humidity percentage.
pub const HUMIDITY: &str = "humidity";

/// Derived heat index in degrees Fahrenheit.
pub const HEAT_INDEX: &str = "heatIndex";

// --- Battery channel ---

/// Channel name for the battery input.
pub const BATTERY_CHANNEL: &str = "battery";

/// Battery voltage in volts.
pub const VOLTAGE: &str = "voltage";

// --- Diagnostics channel ---

/// Channel name for cycle diagnostics.
pub const DIAGNOSTICS_CHANNEL: &str = "diagnostics";

/// Comma-separated list of channels that never produced a valid reading.
pub const UNREPORTED: &str = "unreported";

// --- Settings names ---

/// Settings key for the ADC-to-volts scale factor.
pub const VOLTAGE_COEFFICIENT_SETTING: &str = "voltage_coefficient";

/// Settings key for the next sleep duration.
pub const DEEP_SLEEP_SECONDS_SETTING: &str = "deep_sleep_seconds";

/// Format a measurement the way it goes over the wire (two decimals).
///
/// # Examples
///
/// ```
/// use wakenode_types::properties::format_value;
///
/// assert_eq!(format_value(3.3), "3.30");
/// assert_eq!(format_value(-18.25), "-18.25");
/// ```
#[must_use]
pub fn format_value(value: f32) -> String {
    format!("{:.2}", value)
}
