//! Sensor channels and the retrying reader behind them.
//!
//! A [`SensorChannel`] is one physical temperature/humidity sensor with a
//! logical name ("freezer", "ambient", ...). It owns a [`SensorReader`],
//! which wraps the driver and applies the configured [`ReadMode`], plus the
//! per-cycle bookkeeping the coordinator needs: the last valid reading and
//! whether it has been published.

use std::fmt;
use std::time::Duration;

use tracing::{debug, warn};

use wakenode_types::{RawSample, Reading, SensorModel};

use crate::error::{Error, Result};
use crate::retry::ReadMode;
use crate::traits::{Clock, SensorDriver};

/// Result of one read call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadOutcome {
    /// The sensor produced a valid reading.
    Valid(Reading),
    /// No valid sample yet; try again later.
    Pending,
}

impl ReadOutcome {
    /// The reading, if valid.
    pub fn reading(&self) -> Option<Reading> {
        match self {
            ReadOutcome::Valid(reading) => Some(*reading),
            ReadOutcome::Pending => None,
        }
    }
}

/// Driver wrapper that validates samples and applies the retry policy.
pub struct SensorReader {
    driver: Box<dyn SensorDriver>,
    model: SensorModel,
    heat_index: bool,
    initialized: bool,
    attempts: u32,
}

impl fmt::Debug for SensorReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorReader")
            .field("model", &self.model)
            .field("heat_index", &self.heat_index)
            .field("initialized", &self.initialized)
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl SensorReader {
    /// Wrap a driver. Heat index is derived by default.
    pub fn new(driver: impl SensorDriver + 'static) -> Self {
        Self {
            driver: Box::new(driver),
            model: SensorModel::default(),
            heat_index: true,
            initialized: false,
            attempts: 0,
        }
    }

    /// Whether `initialize` has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Total bus transactions attempted so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Power on the sensor. Subsequent calls are no-ops.
    pub fn initialize(&mut self, channel: &str, pin: u8) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        debug!(channel, pin, model = %self.model, "initializing sensor");
        self.driver.initialize(pin)?;
        self.initialized = true;
        Ok(())
    }

    /// Make exactly one bus transaction.
    ///
    /// Driver errors are treated like an invalid sample: logged and reported
    /// as [`ReadOutcome::Pending`].
    pub fn attempt_read(&mut self, channel: &str) -> Result<ReadOutcome> {
        if !self.initialized {
            return Err(Error::SensorNotInitialized {
                channel: channel.to_string(),
            });
        }

        self.attempts += 1;
        let sample = match self.driver.read_raw() {
            Ok(sample) => sample,
            Err(e) => {
                warn!(channel, attempt = self.attempts, "sensor read failed: {}", e);
                RawSample::invalid()
            }
        };

        debug!(channel, "tempC {}", sample.temperature_c);
        debug!(channel, "tempF {}", sample.temperature_f);
        debug!(channel, "humidity {}", sample.humidity);

        Ok(match Reading::from_sample(sample, self.heat_index) {
            Some(reading) => ReadOutcome::Valid(reading),
            None => ReadOutcome::Pending,
        })
    }

    /// Read according to `mode`.
    ///
    /// In [`ReadMode::Blocking`] this retries until a valid sample arrives,
    /// the attempt limit is reached, or `clock.now()` passes `deadline`.
    /// Retries are never spaced closer than the model's minimum sample
    /// interval.
    /// In [`ReadMode::Poll`] it makes a single attempt.
    pub fn read<C: Clock>(
        &mut self,
        channel: &str,
        mode: ReadMode,
        clock: &mut C,
        deadline: Option<Duration>,
    ) -> Result<ReadOutcome> {
        let (retry_interval, max_attempts) = match mode {
            ReadMode::Poll => return self.attempt_read(channel),
            ReadMode::Blocking {
                retry_interval,
                max_attempts,
            } => (retry_interval, max_attempts),
        };
        let min_interval = self.model.min_sample_interval();
        if retry_interval < min_interval {
            debug!(
                channel,
                model = %self.model,
                "retry interval {:?} below sensor minimum, using {:?}",
                retry_interval,
                min_interval
            );
        }
        let retry_interval = retry_interval.max(min_interval);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if let ReadOutcome::Valid(reading) = self.attempt_read(channel)? {
                if attempt > 1 {
                    debug!(channel, "valid sample after {} attempts", attempt);
                }
                return Ok(ReadOutcome::Valid(reading));
            }

            if max_attempts.is_some_and(|max| attempt >= max) {
                warn!(channel, "no valid sample after {} attempts", attempt);
                return Ok(ReadOutcome::Pending);
            }
            if deadline.is_some_and(|limit| clock.now() >= limit) {
                warn!(channel, "read deadline passed after {} attempts", attempt);
                return Ok(ReadOutcome::Pending);
            }

            debug!(channel, "waiting for data...");
            clock.sleep(retry_interval);
        }
    }
}

/// One configured sensor and its per-cycle state.
#[derive(Debug)]
pub struct SensorChannel {
    id: String,
    pin: u8,
    reader: SensorReader,
    last_reading: Option<Reading>,
    reported: bool,
}

impl SensorChannel {
    /// Create a channel named `id` on `pin`.
    pub fn new(id: impl Into<String>, pin: u8, driver: impl SensorDriver + 'static) -> Self {
        Self {
            id: id.into(),
            pin,
            reader: SensorReader::new(driver),
            last_reading: None,
            reported: false,
        }
    }

    /// Set the sensor model.
    #[must_use]
    pub fn with_model(mut self, model: SensorModel) -> Self {
        self.reader.model = model;
        self
    }

    /// Enable or disable heat-index derivation.
    #[must_use]
    pub fn with_heat_index(mut self, enabled: bool) -> Self {
        self.reader.heat_index = enabled;
        self
    }

    /// Logical channel name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sensor data pin.
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Sensor model.
    pub fn model(&self) -> SensorModel {
        self.reader.model
    }

    /// The reader behind this channel.
    pub fn reader(&self) -> &SensorReader {
        &self.reader
    }

    /// Last valid reading this cycle.
    pub fn last_reading(&self) -> Option<Reading> {
        self.last_reading
    }

    /// Whether this channel's reading has been handed to the publisher.
    pub fn is_reported(&self) -> bool {
        self.reported
    }

    pub(crate) fn mark_reported(&mut self) {
        self.reported = true;
    }

    /// Power on the sensor.
    pub fn initialize(&mut self) -> Result<()> {
        self.reader.initialize(&self.id, self.pin)
    }

    /// Whether the sensor has been powered on.
    pub fn is_initialized(&self) -> bool {
        self.reader.is_initialized()
    }

    /// Obtain a reading if the channel does not have one yet.
    ///
    /// Once a valid reading is held it is returned without touching the bus.
    pub fn ensure_reading<C: Clock>(
        &mut self,
        mode: ReadMode,
        clock: &mut C,
        deadline: Option<Duration>,
    ) -> Result<Option<Reading>> {
        if let Some(reading) = self.last_reading {
            return Ok(Some(reading));
        }

        let outcome = self.reader.read(&self.id, mode, clock, deadline)?;
        if let ReadOutcome::Valid(reading) = outcome {
            debug!(channel = %self.id, "read {}", reading);
            self.last_reading = Some(reading);
        }
        Ok(outcome.reading())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockClock, MockSensor};

    fn channel(sensor: MockSensor) -> SensorChannel {
        SensorChannel::new("ambient", 4, sensor)
    }

    #[test]
    fn test_read_before_initialize_fails() {
        let mut ch = channel(MockSensor::valid(20.0, 40.0));
        let mut clock = MockClock::new();
        let result = ch.ensure_reading(ReadMode::Poll, &mut clock, None);
        assert!(matches!(result, Err(Error::SensorNotInitialized { .. })));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let sensor = MockSensor::valid(20.0, 40.0);
        let handle = sensor.handle();
        let mut ch = channel(sensor);
        ch.initialize().unwrap();
        ch.initialize().unwrap();
        assert_eq!(handle.init_count(), 1);
        assert_eq!(handle.initialized_pin(), Some(4));
    }

    #[test]
    fn test_poll_mode_single_attempt() {
        let sensor = MockSensor::failing_then_valid(2, 20.0, 40.0);
        let handle = sensor.handle();
        let mut ch = channel(sensor);
        let mut clock = MockClock::new();
        ch.initialize().unwrap();

        assert_eq!(ch.ensure_reading(ReadMode::Poll, &mut clock, None).unwrap(), None);
        assert_eq!(ch.ensure_reading(ReadMode::Poll, &mut clock, None).unwrap(), None);
        let reading = ch
            .ensure_reading(ReadMode::Poll, &mut clock, None)
            .unwrap()
            .unwrap();
        assert!((reading.temperature_c - 20.0).abs() < 1e-4);
        assert_eq!(handle.read_count(), 3);
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn test_blocking_mode_sleeps_between_attempts() {
        let sensor = MockSensor::failing_then_valid(3, 5.0, 60.0);
        let handle = sensor.handle();
        let mut ch = channel(sensor);
        let mut clock = MockClock::new();
        ch.initialize().unwrap();

        let reading = ch
            .ensure_reading(ReadMode::blocking(), &mut clock, None)
            .unwrap();
        assert!(reading.is_some());
        assert_eq!(handle.read_count(), 4);
        assert_eq!(clock.now(), Duration::from_secs(6));
        assert_eq!(clock.sleep_count(), 3);
    }

    #[test]
    fn test_blocking_mode_respects_attempt_limit() {
        let sensor = MockSensor::never_valid();
        let handle = sensor.handle();
        let mut ch = channel(sensor);
        let mut clock = MockClock::new();
        ch.initialize().unwrap();

        let mode = ReadMode::blocking()
            .retry_interval(Duration::from_secs(3))
            .max_attempts(3);
        assert_eq!(ch.ensure_reading(mode, &mut clock, None).unwrap(), None);
        assert_eq!(handle.read_count(), 3);
        assert_eq!(clock.now(), Duration::from_secs(6));
    }

    #[test]
    fn test_blocking_interval_floored_by_model() {
        let mode = ReadMode::blocking()
            .retry_interval(Duration::from_millis(100))
            .max_attempts(3);

        let mut ch = channel(MockSensor::never_valid());
        let mut clock = MockClock::new();
        ch.initialize().unwrap();
        assert_eq!(ch.ensure_reading(mode, &mut clock, None).unwrap(), None);
        assert_eq!(clock.now(), Duration::from_secs(4));

        let mut ch = channel(MockSensor::never_valid()).with_model(SensorModel::Dht11);
        let mut clock = MockClock::new();
        ch.initialize().unwrap();
        assert_eq!(ch.ensure_reading(mode, &mut clock, None).unwrap(), None);
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_blocking_mode_respects_deadline() {
        let sensor = MockSensor::never_valid();
        let handle = sensor.handle();
        let mut ch = channel(sensor);
        let mut clock = MockClock::new();
        ch.initialize().unwrap();

        let deadline = Some(Duration::from_secs(5));
        assert_eq!(
            ch.ensure_reading(ReadMode::blocking(), &mut clock, deadline)
                .unwrap(),
            None
        );
        // attempts at t=0, 2, 4, 6 -> deadline seen after the fourth
        assert_eq!(handle.read_count(), 4);
        assert_eq!(clock.now(), Duration::from_secs(6));
    }

    #[test]
    fn test_driver_error_counts_as_pending() {
        let sensor = MockSensor::valid(20.0, 40.0);
        let handle = sensor.handle();
        handle.fail_next_reads(1);
        let mut ch = channel(sensor);
        let mut clock = MockClock::new();
        ch.initialize().unwrap();

        assert_eq!(ch.ensure_reading(ReadMode::Poll, &mut clock, None).unwrap(), None);
        assert!(
            ch.ensure_reading(ReadMode::Poll, &mut clock, None)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_reading_cached_after_success() {
        let sensor = MockSensor::valid(20.0, 40.0);
        let handle = sensor.handle();
        let mut ch = channel(sensor);
        let mut clock = MockClock::new();
        ch.initialize().unwrap();

        ch.ensure_reading(ReadMode::Poll, &mut clock, None).unwrap();
        ch.ensure_reading(ReadMode::Poll, &mut clock, None).unwrap();
        assert_eq!(handle.read_count(), 1);
        assert!(ch.last_reading().is_some());
        assert_eq!(ch.reader().attempts(), 1);
    }

    #[test]
    fn test_heat_index_disabled() {
        let mut ch = channel(MockSensor::valid(30.0, 70.0)).with_heat_index(false);
        let mut clock = MockClock::new();
        ch.initialize().unwrap();
        let reading = ch
            .ensure_reading(ReadMode::Poll, &mut clock, None)
            .unwrap()
            .unwrap();
        assert!(reading.heat_index.is_none());
    }

    #[test]
    fn test_channel_accessors() {
        let ch = channel(MockSensor::valid(20.0, 40.0)).with_model(SensorModel::Dht11);
        assert_eq!(ch.id(), "ambient");
        assert_eq!(ch.pin(), 4);
        assert_eq!(ch.model(), SensorModel::Dht11);
        assert!(!ch.is_reported());
        assert!(!ch.is_initialized());
    }
}
