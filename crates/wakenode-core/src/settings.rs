//! Loading node settings from a [`SettingsStore`].
//!
//! The coordinator only ever reads two values. Missing values fall back to
//! the compiled-in defaults; values that fail validation are logged and
//! replaced by the default too, so a bad setting never keeps the node awake.
//! [`try_load_settings`] is the strict variant for provisioning tools that
//! would rather reject a bad store than ship it.

use std::collections::HashMap;

use tracing::{debug, warn};

use wakenode_types::properties::{DEEP_SLEEP_SECONDS_SETTING, VOLTAGE_COEFFICIENT_SETTING};
use wakenode_types::{Settings, SettingsResult};

use crate::error::Result;
use crate::traits::SettingsStore;

/// Read and validate [`Settings`] from `store`.
pub fn load_settings<S: SettingsStore + ?Sized>(store: &S) -> Settings {
    let defaults = Settings::default();

    let voltage_coefficient = resolve(
        VOLTAGE_COEFFICIENT_SETTING,
        store.get_float(VOLTAGE_COEFFICIENT_SETTING),
        Settings::validate_coefficient,
        defaults.voltage_coefficient,
    );
    let deep_sleep_seconds = resolve(
        DEEP_SLEEP_SECONDS_SETTING,
        store.get_int(DEEP_SLEEP_SECONDS_SETTING),
        Settings::validate_deep_sleep,
        defaults.deep_sleep_seconds,
    );

    Settings {
        voltage_coefficient,
        deep_sleep_seconds,
    }
}

/// Read [`Settings`] from `store`, failing on the first invalid value.
///
/// Missing values still take their defaults.
pub fn try_load_settings<S: SettingsStore + ?Sized>(store: &S) -> Result<Settings> {
    let defaults = Settings::default();

    let voltage_coefficient = match store.get_float(VOLTAGE_COEFFICIENT_SETTING) {
        Some(value) => Settings::validate_coefficient(value)?,
        None => defaults.voltage_coefficient,
    };
    let deep_sleep_seconds = match store.get_int(DEEP_SLEEP_SECONDS_SETTING) {
        Some(value) => Settings::validate_deep_sleep(value)?,
        None => defaults.deep_sleep_seconds,
    };

    Ok(Settings {
        voltage_coefficient,
        deep_sleep_seconds,
    })
}

fn resolve<V, T>(
    name: &str,
    stored: Option<V>,
    validate: impl Fn(V) -> SettingsResult<T>,
    default: T,
) -> T
where
    T: Copy + std::fmt::Debug,
{
    match stored {
        None => {
            debug!(setting = name, "not set, using default {:?}", default);
            default
        }
        Some(value) => match validate(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(setting = name, "{}; using default {:?}", e, default);
                default
            }
        },
    }
}

/// A stored setting value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    /// Floating-point value.
    Float(f64),
    /// Integer value.
    Int(i64),
}

/// In-memory [`SettingsStore`].
#[derive(Debug, Clone, Default)]
pub struct MapSettings {
    values: HashMap<String, SettingValue>,
}

impl MapSettings {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a floating-point value.
    #[must_use]
    pub fn with_float(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), SettingValue::Float(value));
        self
    }

    /// Set an integer value.
    #[must_use]
    pub fn with_int(mut self, name: impl Into<String>, value: i64) -> Self {
        self.values.insert(name.into(), SettingValue::Int(value));
        self
    }

    /// Remove a value.
    pub fn remove(&mut self, name: &str) -> Option<SettingValue> {
        self.values.remove(name)
    }
}

impl SettingsStore for MapSettings {
    fn get_float(&self, name: &str) -> Option<f64> {
        match self.values.get(name)? {
            SettingValue::Float(v) => Some(*v),
            SettingValue::Int(v) => Some(*v as f64),
        }
    }

    fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            SettingValue::Int(v) => Some(*v),
            SettingValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            SettingValue::Float(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let settings = load_settings(&MapSettings::new());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_stored_values_used() {
        let store = MapSettings::new()
            .with_float(VOLTAGE_COEFFICIENT_SETTING, 0.006)
            .with_int(DEEP_SLEEP_SECONDS_SETTING, 600);
        let settings = load_settings(&store);
        assert!((settings.voltage_coefficient - 0.006).abs() < 1e-7);
        assert_eq!(settings.deep_sleep_seconds, 600);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let store = MapSettings::new()
            .with_float(VOLTAGE_COEFFICIENT_SETTING, f64::NAN)
            .with_int(DEEP_SLEEP_SECONDS_SETTING, -1);
        let settings = load_settings(&store);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_strict_loader_rejects_invalid() {
        let store = MapSettings::new()
            .with_float(VOLTAGE_COEFFICIENT_SETTING, 0.006)
            .with_int(DEEP_SLEEP_SECONDS_SETTING, -1);
        let err = try_load_settings(&store).unwrap_err();
        assert!(matches!(err, crate::Error::Settings(_)));
        assert!(err.to_string().contains(DEEP_SLEEP_SECONDS_SETTING));
    }

    #[test]
    fn test_strict_loader_accepts_valid_and_missing() {
        let store = MapSettings::new().with_int(DEEP_SLEEP_SECONDS_SETTING, 600);
        let settings = try_load_settings(&store).unwrap();
        assert_eq!(settings.deep_sleep_seconds, 600);
        assert_eq!(
            settings.voltage_coefficient,
            Settings::default().voltage_coefficient
        );
        assert_eq!(try_load_settings(&store).unwrap(), load_settings(&store));
    }

    #[test]
    fn test_int_float_coercion() {
        let store = MapSettings::new()
            .with_int("a", 3)
            .with_float("b", 120.0)
            .with_float("c", 1.5);
        assert_eq!(store.get_float("a"), Some(3.0));
        assert_eq!(store.get_int("b"), Some(120));
        assert_eq!(store.get_int("c"), None);
        assert_eq!(store.get_int("missing"), None);
    }

    #[test]
    fn test_remove() {
        let mut store = MapSettings::new().with_int(DEEP_SLEEP_SECONDS_SETTING, 60);
        assert_eq!(
            store.remove(DEEP_SLEEP_SECONDS_SETTING),
            Some(SettingValue::Int(60))
        );
        assert_eq!(load_settings(&store).deep_sleep_seconds, 300);
    }
}
