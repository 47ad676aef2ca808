//! Simulator configuration file.
//!
//! Every section and field is optional; anything missing takes the value
//! from [`Config::default`], which describes the two-sensor
//! freezer/refrigerator node.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use wakenode_core::properties::{DEEP_SLEEP_SECONDS_SETTING, VOLTAGE_COEFFICIENT_SETTING};
use wakenode_core::{Acquisition, MapSettings, ReadMode, SensorModel, try_load_settings};

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed for simulated sensor noise. Random when unset.
    pub seed: Option<u64>,

    /// Node identity and lifecycle tunables
    pub node: NodeConfig,

    /// Sensor retry policy
    pub read_mode: ReadModeConfig,

    /// Values served from the simulated settings store
    pub settings: SettingsConfig,

    /// Simulated battery input
    pub battery: BatteryConfig,

    /// Simulated sensor channels
    pub channels: Vec<ChannelConfig>,

    /// Simulated transport timing
    pub transport: TransportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            node: NodeConfig::default(),
            read_mode: ReadModeConfig::default(),
            settings: SettingsConfig::default(),
            battery: BatteryConfig::default(),
            channels: vec![
                ChannelConfig {
                    id: "freezer".to_string(),
                    pin: 2,
                    temperature_c: -18.0,
                    humidity: 60.0,
                    ..ChannelConfig::default()
                },
                ChannelConfig {
                    id: "refrigerator".to_string(),
                    pin: 0,
                    temperature_c: 4.0,
                    humidity: 75.0,
                    failures_before_valid: 1,
                    ..ChannelConfig::default()
                },
            ],
            transport: TransportConfig::default(),
        }
    }
}

/// `[node]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Logical device id
    pub device_id: String,

    /// When sensors are first read: "after-connect" or "before-connect"
    pub acquisition: Acquisition,

    /// Reporting timeout in seconds. Derived from the sleep interval when unset.
    pub reporting_timeout_secs: Option<u64>,

    /// Publish `diagnostics/unreported` when the reporting timeout fires
    pub publish_diagnostics: bool,

    /// Power-down calls before giving up
    pub power_down_attempts: u32,

    /// Wait after each power-down call, in milliseconds
    pub power_down_grace_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: "tempsensor".to_string(),
            acquisition: Acquisition::AfterConnect,
            reporting_timeout_secs: None,
            publish_diagnostics: true,
            power_down_attempts: 3,
            power_down_grace_ms: 1000,
        }
    }
}

/// Retry policy kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    /// Retry inside one tick until valid
    #[default]
    Blocking,
    /// One attempt per tick
    Poll,
}

/// `[read_mode]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadModeConfig {
    /// "blocking" or "poll"
    pub mode: ModeKind,

    /// Delay between blocking attempts, in milliseconds
    pub retry_interval_ms: u64,

    /// Attempt limit per blocking read. Unbounded when unset.
    pub max_attempts: Option<u32>,
}

impl Default for ReadModeConfig {
    fn default() -> Self {
        Self {
            mode: ModeKind::Blocking,
            retry_interval_ms: 2000,
            max_attempts: None,
        }
    }
}

impl ReadModeConfig {
    /// The retry policy this section describes.
    pub fn to_read_mode(&self) -> ReadMode {
        match self.mode {
            ModeKind::Poll => ReadMode::Poll,
            ModeKind::Blocking => {
                let mode = ReadMode::blocking()
                    .retry_interval(Duration::from_millis(self.retry_interval_ms));
                match self.max_attempts {
                    Some(max) => mode.max_attempts(max),
                    None => mode,
                }
            }
        }
    }
}

/// `[settings]` section.
///
/// Values are deliberately loose types so an out-of-range entry reaches the
/// node's own validation, which falls back to the default. With `strict`
/// the file is rejected instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Volts per ADC count
    pub voltage_coefficient: Option<f64>,

    /// Sleep interval in seconds
    pub deep_sleep_seconds: Option<i64>,

    /// Reject out-of-range values instead of falling back to defaults
    pub strict: bool,
}

impl SettingsConfig {
    /// Build the settings store the node reads at wake.
    pub fn to_store(&self) -> MapSettings {
        let mut store = MapSettings::new();
        if let Some(value) = self.voltage_coefficient {
            store = store.with_float(VOLTAGE_COEFFICIENT_SETTING, value);
        }
        if let Some(value) = self.deep_sleep_seconds {
            store = store.with_int(DEEP_SLEEP_SECONDS_SETTING, value);
        }
        store
    }
}

/// `[battery]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    /// Raw ADC count the simulated divider returns
    pub raw_sample: u16,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self { raw_sample: 600 }
    }
}

/// One `[[channels]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Logical channel name
    pub id: String,

    /// Data pin
    pub pin: u8,

    /// Sensor model
    pub model: SensorModel,

    /// Derive and publish the heat index
    pub heat_index: bool,

    /// Invalid reads before the first valid one
    pub failures_before_valid: u32,

    /// Probability that any later read is invalid (0.0 to 1.0)
    pub failure_rate: f64,

    /// Simulated temperature in °C
    pub temperature_c: f32,

    /// Simulated relative humidity
    pub humidity: f32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            pin: 0,
            model: SensorModel::Dht22,
            heat_index: true,
            failures_before_valid: 0,
            failure_rate: 0.0,
            temperature_c: 20.0,
            humidity: 50.0,
        }
    }
}

/// `[transport]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Loop iterations between `connect` and `ConnectedReady`
    pub connect_ticks: u32,

    /// Loop iterations between the shutdown request and `ShutdownConfirmed`
    pub flush_ticks: u32,

    /// Loop period in milliseconds
    pub tick_ms: u64,

    /// Give up on a cycle after this many loop iterations
    pub max_ticks: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_ticks: 3,
            flush_ticks: 2,
            tick_ms: 100,
            max_ticks: 10_000,
        }
    }
}

impl TransportConfig {
    /// Loop period.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Config {
    /// Get the user config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wakenode")
            .join("config.toml")
    }

    /// Parse a config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Load an explicit config file, or the user config if it exists, or the
    /// built-in default.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let path = Self::path();
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            return Self::load_from(&path);
        }
        Ok(Self::default())
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Check values the node itself would not catch.
    pub fn validate(&self) -> Result<()> {
        for channel in &self.channels {
            if !(0.0..=1.0).contains(&channel.failure_rate) {
                bail!(
                    "channel '{}': failure_rate must be between 0 and 1, got {}",
                    channel.id,
                    channel.failure_rate
                );
            }
        }
        if self.settings.strict {
            try_load_settings(&self.settings.to_store()).context("Invalid [settings]")?;
        }
        if self.transport.tick_ms == 0 {
            bail!("transport.tick_ms must be at least 1");
        }
        if self.transport.max_ticks == 0 {
            bail!("transport.max_ticks must be at least 1");
        }
        Ok(())
    }
}
