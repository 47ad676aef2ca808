//! Mock collaborators for testing.
//!
//! This module provides in-memory stand-ins for every collaborator trait so
//! a whole wake cycle can run without hardware, a network, or wall-clock
//! delay.
//!
//! # Features
//!
//! - **Failure injection**: sensors that stay invalid for N reads, drivers
//!   that error on read or power-up, transports that refuse publishes, power
//!   controllers that refuse to sleep
//! - **Call recording**: every transport and power call is kept for assertions
//! - **Virtual time**: [`MockClock`] advances only when slept on or told to

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use wakenode_types::{FirmwareInfo, RawSample};

use crate::error::{Error, Result};
use crate::traits::{BatteryInput, Clock, PowerControl, SensorDriver, Transport};

const NO_PIN: u32 = u32::MAX;

#[derive(Debug)]
struct SensorState {
    sample: Mutex<RawSample>,
    invalid_reads: AtomicU32,
    failing_reads: AtomicU32,
    failing_inits: AtomicU32,
    read_count: AtomicU32,
    init_count: AtomicU32,
    pin: AtomicU32,
}

/// A mock temperature/humidity sensor.
///
/// The sensor returns invalid samples for a configurable number of reads
/// before settling on its configured value.
///
/// # Example
///
/// ```
/// use wakenode_core::mock::MockSensor;
/// use wakenode_core::traits::SensorDriver;
///
/// let mut sensor = MockSensor::failing_then_valid(1, 21.0, 45.0);
/// let handle = sensor.handle();
/// sensor.initialize(4).unwrap();
/// assert!(!sensor.read_raw().unwrap().is_valid);
/// assert!(sensor.read_raw().unwrap().is_valid);
/// assert_eq!(handle.read_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockSensor {
    state: Arc<SensorState>,
}

/// Shared view of a [`MockSensor`] that stays usable after the sensor has
/// been moved into a channel.
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    state: Arc<SensorState>,
}

impl MockSensor {
    /// A sensor that is valid on every read.
    pub fn valid(temperature_c: f32, humidity: f32) -> Self {
        Self::failing_then_valid(0, temperature_c, humidity)
    }

    /// A sensor whose first `invalid_reads` reads are invalid.
    pub fn failing_then_valid(invalid_reads: u32, temperature_c: f32, humidity: f32) -> Self {
        Self {
            state: Arc::new(SensorState {
                sample: Mutex::new(RawSample::from_celsius(temperature_c, humidity)),
                invalid_reads: AtomicU32::new(invalid_reads),
                failing_reads: AtomicU32::new(0),
                failing_inits: AtomicU32::new(0),
                read_count: AtomicU32::new(0),
                init_count: AtomicU32::new(0),
                pin: AtomicU32::new(NO_PIN),
            }),
        }
    }

    /// A sensor that never produces a valid sample.
    pub fn never_valid() -> Self {
        Self::failing_then_valid(u32::MAX, 0.0, 0.0)
    }

    /// A handle for inspecting and steering the sensor later.
    pub fn handle(&self) -> MockSensorHandle {
        MockSensorHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl MockSensorHandle {
    /// Number of `read_raw` calls so far.
    pub fn read_count(&self) -> u32 {
        self.state.read_count.load(Ordering::Relaxed)
    }

    /// Number of `initialize` calls so far.
    pub fn init_count(&self) -> u32 {
        self.state.init_count.load(Ordering::Relaxed)
    }

    /// Pin passed to the last `initialize` call.
    pub fn initialized_pin(&self) -> Option<u8> {
        match self.state.pin.load(Ordering::Relaxed) {
            NO_PIN => None,
            pin => u8::try_from(pin).ok(),
        }
    }

    /// Make the next `count` reads return a driver error.
    pub fn fail_next_reads(&self, count: u32) {
        self.state.failing_reads.store(count, Ordering::Relaxed);
    }

    /// Make the next `count` initializations return a driver error.
    pub fn fail_next_inits(&self, count: u32) {
        self.state.failing_inits.store(count, Ordering::Relaxed);
    }

    /// Change the value returned once the sensor is valid.
    pub fn set_sample(&self, temperature_c: f32, humidity: f32) {
        let mut sample = self
            .state
            .sample
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *sample = RawSample::from_celsius(temperature_c, humidity);
    }
}

/// Decrement `counter` if non-zero; returns whether it was.
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok()
}

impl SensorDriver for MockSensor {
    fn initialize(&mut self, pin: u8) -> Result<()> {
        self.state.init_count.fetch_add(1, Ordering::Relaxed);
        if take_one(&self.state.failing_inits) {
            return Err(Error::driver("mock", "no response on power-up"));
        }
        self.state.pin.store(u32::from(pin), Ordering::Relaxed);
        Ok(())
    }

    fn read_raw(&mut self) -> Result<RawSample> {
        self.state.read_count.fetch_add(1, Ordering::Relaxed);

        if take_one(&self.state.failing_reads) {
            return Err(Error::driver("mock", "bus timeout"));
        }
        if take_one(&self.state.invalid_reads) {
            return Ok(RawSample::invalid());
        }

        Ok(*self
            .state
            .sample
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }
}

/// A call made on a [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `connect` with the announced firmware.
    Connect(FirmwareInfo),
    /// A successful `publish_property`.
    Publish {
        /// Logical device.
        device_id: String,
        /// Channel.
        channel_id: String,
        /// Property key.
        key: String,
        /// Formatted value.
        value: String,
    },
    /// `request_shutdown`.
    RequestShutdown,
}

/// A recording transport.
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: Vec<TransportCall>,
    fail_publishes: bool,
    fail_connect: bool,
    publish_attempts: u32,
}

impl MockTransport {
    /// Create a transport that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail.
    pub fn fail_publishes(&mut self, fail: bool) {
        self.fail_publishes = fail;
    }

    /// Make `connect` fail.
    pub fn fail_connect(&mut self, fail: bool) {
        self.fail_connect = fail;
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> &[TransportCall] {
        &self.calls
    }

    /// Successful publishes as `(device, channel, key, value)`.
    pub fn published(&self) -> Vec<(&str, &str, &str, &str)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Publish {
                    device_id,
                    channel_id,
                    key,
                    value,
                } => Some((
                    device_id.as_str(),
                    channel_id.as_str(),
                    key.as_str(),
                    value.as_str(),
                )),
                _ => None,
            })
            .collect()
    }

    /// Successful publishes for one channel as `(key, value)`.
    pub fn published_for(&self, channel_id: &str) -> Vec<(&str, &str)> {
        self.published()
            .into_iter()
            .filter(|(_, channel, _, _)| *channel == channel_id)
            .map(|(_, _, key, value)| (key, value))
            .collect()
    }

    /// Number of publish attempts, including failed ones.
    pub fn publish_attempts(&self) -> u32 {
        self.publish_attempts
    }

    /// Number of `request_shutdown` calls.
    pub fn shutdown_requests(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, TransportCall::RequestShutdown))
            .count()
    }

    /// Whether `connect` was called.
    pub fn connected(&self) -> bool {
        self.calls
            .iter()
            .any(|call| matches!(call, TransportCall::Connect(_)))
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, firmware: &FirmwareInfo) -> Result<()> {
        if self.fail_connect {
            return Err(Error::transport("mock connect failure"));
        }
        self.calls.push(TransportCall::Connect(firmware.clone()));
        Ok(())
    }

    fn publish_property(
        &mut self,
        device_id: &str,
        channel_id: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.publish_attempts += 1;
        if self.fail_publishes {
            return Err(Error::transport("mock publish failure"));
        }
        self.calls.push(TransportCall::Publish {
            device_id: device_id.to_string(),
            channel_id: channel_id.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn request_shutdown(&mut self) -> Result<()> {
        self.calls.push(TransportCall::RequestShutdown);
        Ok(())
    }
}

/// A power controller that records sleep requests and returns.
#[derive(Debug, Default)]
pub struct MockPower {
    requests: Vec<u64>,
    refusals: u32,
    sleeps: bool,
}

impl MockPower {
    /// Create a power controller that accepts every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `count` requests with an error.
    pub fn refuse_next(&mut self, count: u32) {
        self.refusals = count;
    }

    /// Report accepted requests as having powered the node down.
    #[must_use]
    pub fn sleeping(mut self) -> Self {
        self.sleeps = true;
        self
    }

    /// Durations of accepted requests, in microseconds.
    pub fn requests(&self) -> &[u64] {
        &self.requests
    }
}

impl PowerControl for MockPower {
    fn enter_deep_sleep(&mut self, duration_us: u64) -> Result<()> {
        if self.refusals > 0 {
            self.refusals -= 1;
            return Err(Error::power("mock refusal"));
        }
        self.requests.push(duration_us);
        Ok(())
    }

    fn powered_down(&self) -> bool {
        self.sleeps && !self.requests.is_empty()
    }
}

/// A battery input returning a fixed ADC count.
#[derive(Debug, Clone)]
pub struct MockBattery {
    raw: u16,
    fail: bool,
    reads: u32,
}

impl MockBattery {
    /// A battery that always reads `raw`.
    pub fn new(raw: u16) -> Self {
        Self {
            raw,
            fail: false,
            reads: 0,
        }
    }

    /// A battery input that always errors.
    pub fn failing() -> Self {
        Self {
            raw: 0,
            fail: true,
            reads: 0,
        }
    }

    /// Number of samples taken.
    pub fn reads(&self) -> u32 {
        self.reads
    }
}

impl BatteryInput for MockBattery {
    fn read_raw(&mut self) -> Result<u16> {
        self.reads += 1;
        if self.fail {
            return Err(Error::Battery("mock ADC failure".to_string()));
        }
        Ok(self.raw)
    }
}

/// Virtual clock. Sleeping advances it instantly.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl MockClock {
    /// A clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
    }

    /// Number of `sleep` calls.
    pub fn sleep_count(&self) -> usize {
        self.sleeps.len()
    }

    /// Every `sleep` duration, in order.
    pub fn sleeps(&self) -> &[Duration] {
        &self.sleeps
    }
}

impl Clock for MockClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        self.now += duration;
    }
}
