//! The wake-lifecycle state machine.
//!
//! One [`LifecycleCoordinator`] exists per wake cycle. It is driven entirely
//! from outside: the transport's event loop calls [`tick`] once per
//! iteration and [`handle_event`] whenever the session changes state.
//!
//! ```text
//!  Connecting ──ConnectedReady──▶ Ready ──setup──▶ Reporting
//!                                                     │ all channels reported
//!                                                     │ (or reporting timeout)
//!                                                     ▼
//!  Sleeping ◀──ShutdownConfirmed── AwaitingShutdownConfirm
//! ```
//!
//! Shutdown is two-phase. When reporting finishes the coordinator only
//! *requests* shutdown; the power-down call waits for the transport to
//! confirm that outbound messages were flushed.
//!
//! [`tick`]: LifecycleCoordinator::tick
//! [`handle_event`]: LifecycleCoordinator::handle_event

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use wakenode_types::properties::UNREPORTED;
use wakenode_types::{BatteryStatus, FirmwareInfo, LifecycleState, Settings};

use crate::error::{Error, Result};
use crate::events::LifecycleEvent;
use crate::publisher::ReadingPublisher;
use crate::retry::ReadMode;
use crate::sensor::SensorChannel;
use crate::settings::load_settings;
use crate::stats::{CycleStats, StateTransition};
use crate::traits::{BatteryInput, Clock, PowerControl, SettingsStore, Transport};

/// Floor for the derived reporting timeout.
pub const MIN_REPORTING_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wait after a power-down call before declaring it ineffective.
pub const DEFAULT_POWER_DOWN_GRACE: Duration = Duration::from_secs(1);

/// Default number of power-down calls before giving up.
pub const DEFAULT_POWER_DOWN_ATTEMPTS: u32 = 3;

/// When sensors are first read relative to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acquisition {
    /// Initialize and read sensors once the transport is ready.
    #[default]
    AfterConnect,
    /// Read sensors before connecting, overlapping sensor latency with
    /// session setup.
    BeforeConnect,
}

/// Tunables that do not come from the settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Logical device id properties are published under.
    pub device_id: String,
    /// Sensor retry policy.
    pub read_mode: ReadMode,
    /// Sensor acquisition timing.
    pub acquisition: Acquisition,
    /// Maximum time in `Reporting` before shutting down anyway.
    /// `None` derives it from the sleep interval.
    pub reporting_timeout: Option<Duration>,
    /// Wait after each power-down call.
    pub power_down_grace: Duration,
    /// Power-down calls before giving up.
    pub power_down_attempts: u32,
    /// Publish the list of abandoned channels when the timeout fires.
    pub publish_diagnostics: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            device_id: "wakenode".to_string(),
            read_mode: ReadMode::default(),
            acquisition: Acquisition::default(),
            reporting_timeout: None,
            power_down_grace: DEFAULT_POWER_DOWN_GRACE,
            power_down_attempts: DEFAULT_POWER_DOWN_ATTEMPTS,
            publish_diagnostics: true,
        }
    }
}

/// Builder for [`LifecycleCoordinator`].
#[derive(Debug)]
pub struct CoordinatorBuilder<T, B, P, C> {
    transport: T,
    battery: B,
    power: P,
    clock: C,
    channels: Vec<SensorChannel>,
    config: CoordinatorConfig,
    settings: Settings,
    firmware: FirmwareInfo,
}

impl<T, B, P, C> CoordinatorBuilder<T, B, P, C>
where
    T: Transport,
    B: BatteryInput,
    P: PowerControl,
    C: Clock,
{
    /// Add a sensor channel.
    #[must_use]
    pub fn channel(mut self, channel: SensorChannel) -> Self {
        self.channels.push(channel);
        self
    }

    /// Add several sensor channels.
    #[must_use]
    pub fn channels(mut self, channels: impl IntoIterator<Item = SensorChannel>) -> Self {
        self.channels.extend(channels);
        self
    }

    /// Set the logical device id.
    #[must_use]
    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.config.device_id = device_id.into();
        self
    }

    /// Set the sensor retry policy.
    #[must_use]
    pub fn read_mode(mut self, mode: ReadMode) -> Self {
        self.config.read_mode = mode;
        self
    }

    /// Set the acquisition timing.
    #[must_use]
    pub fn acquisition(mut self, acquisition: Acquisition) -> Self {
        self.config.acquisition = acquisition;
        self
    }

    /// Override the reporting timeout.
    ///
    /// `Duration::MAX` waits for every channel indefinitely.
    #[must_use]
    pub fn reporting_timeout(mut self, timeout: Duration) -> Self {
        self.config.reporting_timeout = Some(timeout);
        self
    }

    /// Set the wait after each power-down call.
    #[must_use]
    pub fn power_down_grace(mut self, grace: Duration) -> Self {
        self.config.power_down_grace = grace;
        self
    }

    /// Set how many power-down calls to make before giving up.
    #[must_use]
    pub fn power_down_attempts(mut self, attempts: u32) -> Self {
        self.config.power_down_attempts = attempts;
        self
    }

    /// Enable or disable the timeout diagnostic property.
    #[must_use]
    pub fn publish_diagnostics(mut self, enabled: bool) -> Self {
        self.config.publish_diagnostics = enabled;
        self
    }

    /// Replace all tunables at once.
    #[must_use]
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use explicit settings.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Load settings from a store, falling back to defaults.
    #[must_use]
    pub fn settings_from<S: SettingsStore + ?Sized>(mut self, store: &S) -> Self {
        self.settings = load_settings(store);
        self
    }

    /// Set the firmware identity announced at connect.
    #[must_use]
    pub fn firmware(mut self, firmware: FirmwareInfo) -> Self {
        self.firmware = firmware;
        self
    }

    /// Validate the configuration and build the coordinator.
    pub fn build(self) -> Result<LifecycleCoordinator<T, B, P, C>> {
        if self.config.device_id.trim().is_empty() {
            return Err(Error::invalid_config("device id must not be empty"));
        }
        if self.config.power_down_attempts == 0 {
            return Err(Error::invalid_config(
                "power_down_attempts must be at least 1",
            ));
        }
        if self.config.reporting_timeout == Some(Duration::ZERO) {
            return Err(Error::invalid_config("reporting timeout must be non-zero"));
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.id().trim().is_empty() {
                return Err(Error::invalid_config("channel id must not be empty"));
            }
            if !seen.insert(channel.id()) {
                return Err(Error::invalid_config(format!(
                    "duplicate channel id '{}'",
                    channel.id()
                )));
            }
        }

        Ok(LifecycleCoordinator {
            publisher: ReadingPublisher::new(self.config.device_id.clone()),
            transport: self.transport,
            battery: self.battery,
            power: self.power,
            clock: self.clock,
            channels: self.channels,
            config: self.config,
            settings: self.settings,
            firmware: self.firmware,
            state: LifecycleState::Connecting,
            started: false,
            setup_done: false,
            shutdown_requested: false,
            reporting_started_at: None,
            stats: CycleStats::default(),
        })
    }
}

/// Wake-cycle state machine.
///
/// Owns its collaborators and all per-cycle state. Nothing is shared and
/// nothing survives sleep: a new coordinator is built on every wake.
pub struct LifecycleCoordinator<T, B, P, C> {
    transport: T,
    battery: B,
    power: P,
    clock: C,
    channels: Vec<SensorChannel>,
    publisher: ReadingPublisher,
    config: CoordinatorConfig,
    settings: Settings,
    firmware: FirmwareInfo,
    state: LifecycleState,
    started: bool,
    setup_done: bool,
    shutdown_requested: bool,
    reporting_started_at: Option<Duration>,
    stats: CycleStats,
}

impl<T, B, P, C> std::fmt::Debug for LifecycleCoordinator<T, B, P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("state", &self.state)
            .field("channels", &self.channels.len())
            .field("config", &self.config)
            .field("settings", &self.settings)
            .finish()
    }
}

impl<T, B, P, C> LifecycleCoordinator<T, B, P, C>
where
    T: Transport,
    B: BatteryInput,
    P: PowerControl,
    C: Clock,
{
    /// Start building a coordinator around its collaborators.
    pub fn builder(transport: T, battery: B, power: P, clock: C) -> CoordinatorBuilder<T, B, P, C> {
        CoordinatorBuilder {
            transport,
            battery,
            power,
            clock,
            channels: Vec::new(),
            config: CoordinatorConfig::default(),
            settings: Settings::default(),
            firmware: FirmwareInfo::default(),
        }
    }

    // --- Accessors ---

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Statistics for this cycle so far.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Configured channels.
    pub fn channels(&self) -> &[SensorChannel] {
        &self.channels
    }

    /// Effective settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Tunables.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably (for event loops that pump it).
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The power controller.
    pub fn power(&self) -> &P {
        &self.power
    }

    /// The battery input.
    pub fn battery(&self) -> &B {
        &self.battery
    }

    /// The clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The clock, mutably.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Reporting timeout in effect for this cycle.
    pub fn reporting_timeout(&self) -> Duration {
        self.config.reporting_timeout.unwrap_or_else(|| {
            (self.settings.deep_sleep() / 10).max(MIN_REPORTING_TIMEOUT)
        })
    }

    /// Whether every channel has reported.
    pub fn all_reported(&self) -> bool {
        self.channels.iter().all(SensorChannel::is_reported)
    }

    // --- Driving the state machine ---

    /// Begin the wake cycle and ask the transport to connect.
    ///
    /// With [`Acquisition::BeforeConnect`] the sensors are initialized and
    /// read once before the connect call. Calling `start` twice is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.record(LifecycleState::Connecting);

        info!(
            firmware = %self.firmware,
            device = %self.config.device_id,
            channels = self.channels.len(),
            "wake cycle started"
        );

        if self.config.acquisition == Acquisition::BeforeConnect {
            self.setup_sensors();
            let deadline = self.deadline_from(self.clock.now());
            self.acquire_pending(deadline);
        }

        self.transport.connect(&self.firmware).inspect_err(|e| {
            error!("transport connect failed: {}", e);
        })
    }

    /// Process one scheduler tick.
    pub fn tick(&mut self) {
        self.stats.ticks += 1;

        match self.state {
            LifecycleState::Connecting => {
                if self.config.acquisition == Acquisition::BeforeConnect
                    && !self.config.read_mode.is_blocking()
                {
                    self.setup_sensors();
                    let deadline = self.deadline_from(self.clock.now());
                    self.acquire_pending(deadline);
                }
            }
            LifecycleState::Ready | LifecycleState::Reporting => self.report(),
            LifecycleState::AwaitingShutdownConfirm => {
                trace!("waiting for shutdown confirmation");
            }
            LifecycleState::Sleeping => {
                trace!("tick after power-down");
            }
        }
    }

    /// React to a transport lifecycle event.
    pub fn handle_event(&mut self, event: LifecycleEvent) {
        debug!(%event, state = %self.state, "lifecycle event");

        match event {
            LifecycleEvent::ConnectedReady => match self.state {
                LifecycleState::Connecting => self.on_ready(),
                state => debug!(%state, "transport ready again, setup already done"),
            },
            LifecycleEvent::ShutdownConfirmed => match self.state {
                LifecycleState::AwaitingShutdownConfirm => self.enter_sleep(),
                LifecycleState::Sleeping => debug!("duplicate shutdown confirmation"),
                state => warn!(%state, "ignoring shutdown confirmation that was never requested"),
            },
        }
    }

    // --- Internals ---

    fn record(&mut self, state: LifecycleState) {
        if self.stats.transitions.last().map(|t| t.state) == Some(state) {
            return;
        }
        debug!(from = %self.state, to = %state, tick = self.stats.ticks, "transition");
        self.state = state;
        self.stats.transitions.push(StateTransition {
            state,
            tick: self.stats.ticks,
        });
    }

    fn setup_sensors(&mut self) {
        for channel in self.channels.iter_mut().filter(|c| !c.is_initialized()) {
            if let Err(e) = channel.initialize() {
                warn!(channel = %channel.id(), "sensor initialization failed: {}", e);
            }
        }
    }

    /// Read every channel that has no reading yet, without publishing.
    fn acquire_pending(&mut self, deadline: Duration) {
        let mode = self.config.read_mode;
        for channel in self.channels.iter_mut().filter(|c| c.last_reading().is_none()) {
            if !channel.is_initialized() {
                continue;
            }
            match channel.ensure_reading(mode, &mut self.clock, Some(deadline)) {
                Ok(Some(_)) => debug!(channel = %channel.id(), "reading acquired before connect"),
                Ok(None) => debug!(channel = %channel.id(), "no valid reading yet"),
                Err(e) => warn!(channel = %channel.id(), "read failed: {}", e),
            }
        }
    }

    fn on_ready(&mut self) {
        self.record(LifecycleState::Ready);
        info!("transport ready");

        if !self.setup_done {
            self.setup_sensors();
            self.report_battery();
            self.setup_done = true;
        }

        self.reporting_started_at = Some(self.clock.now());
        self.record(LifecycleState::Reporting);
    }

    fn report_battery(&mut self) {
        let raw = match self.battery.read_raw() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("battery sample failed, skipping voltage report: {}", e);
                return;
            }
        };

        let status = BatteryStatus::from_raw(raw, self.settings.voltage_coefficient);
        info!(raw, voltage = status.voltage, "battery");

        match self.publisher.publish_battery(&mut self.transport, &status) {
            Ok(()) => self.stats.properties_sent += 1,
            Err(e) => warn!("battery publish failed: {}", e),
        }
        self.stats.battery = Some(status);
    }

    fn deadline_from(&self, start: Duration) -> Duration {
        start.saturating_add(self.reporting_timeout())
    }

    fn reporting_deadline(&self) -> Duration {
        self.deadline_from(self.reporting_started_at.unwrap_or_else(|| self.clock.now()))
    }

    /// One pass of the `Reporting` state.
    fn report(&mut self) {
        if self.shutdown_requested {
            return;
        }

        // a sensor that missed its power-up gets another try every tick
        self.setup_sensors();

        let deadline = self.reporting_deadline();
        let mode = self.config.read_mode;

        for channel in self.channels.iter_mut().filter(|c| !c.is_reported()) {
            if !channel.is_initialized() {
                continue;
            }
            let reading = match channel.ensure_reading(mode, &mut self.clock, Some(deadline)) {
                Ok(Some(reading)) => reading,
                Ok(None) => {
                    debug!(channel = %channel.id(), "waiting for valid reading");
                    continue;
                }
                Err(e) => {
                    warn!(channel = %channel.id(), "read failed: {}", e);
                    continue;
                }
            };

            match self
                .publisher
                .publish(&mut self.transport, channel.id(), &reading)
            {
                Ok(sent) => {
                    self.stats.properties_sent += sent as u32;
                    info!(channel = %channel.id(), "reported {}", reading);
                }
                Err(e) => {
                    warn!(channel = %channel.id(), "report incomplete, not retrying: {}", e);
                }
            }
            channel.mark_reported();
            self.stats.published.push(channel.id().to_string());
        }

        if self.all_reported() {
            info!("all channels reported, requesting shutdown");
            self.request_shutdown();
        } else if self.clock.now() >= deadline {
            self.on_reporting_timeout();
        }
    }

    fn on_reporting_timeout(&mut self) {
        let unreported: Vec<String> = self
            .channels
            .iter()
            .filter(|c| !c.is_reported())
            .map(|c| c.id().to_string())
            .collect();

        warn!(
            channels = ?unreported,
            timeout = ?self.reporting_timeout(),
            "reporting timeout exceeded, shutting down without their data"
        );

        if self.config.publish_diagnostics {
            match self.publisher.publish_diagnostic(
                &mut self.transport,
                UNREPORTED,
                &unreported.join(","),
            ) {
                Ok(()) => self.stats.properties_sent += 1,
                Err(e) => warn!("diagnostic publish failed: {}", e),
            }
        }

        self.stats.timed_out = unreported;
        self.request_shutdown();
    }

    fn request_shutdown(&mut self) {
        if self.shutdown_requested {
            return;
        }
        self.shutdown_requested = true;
        self.stats.shutdown_tick = Some(self.stats.ticks);

        if let Err(e) = self.transport.request_shutdown() {
            warn!("shutdown request failed: {}", e);
        }
        self.record(LifecycleState::AwaitingShutdownConfirm);
    }

    fn enter_sleep(&mut self) {
        self.record(LifecycleState::Sleeping);

        let duration_us = self.settings.deep_sleep_micros();
        let grace = self.config.power_down_grace;
        self.stats.sleep_duration_us = Some(duration_us);
        info!(seconds = self.settings.deep_sleep_seconds, "entering deep sleep");

        for attempt in 1..=self.config.power_down_attempts {
            self.stats.power_down_attempts = attempt;
            if let Err(e) = self.power.enter_deep_sleep(duration_us) {
                warn!(attempt, "power-down refused: {}", e);
                continue;
            }
            if self.power.powered_down() {
                debug!(attempt, "power-down accepted");
                return;
            }
            self.clock.sleep(grace);
            warn!(attempt, "still awake {:?} after power-down", grace);
        }

        error!(
            attempts = self.config.power_down_attempts,
            "device did not enter deep sleep"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBattery, MockClock, MockPower, MockSensor, MockTransport};

    type TestCoordinator = LifecycleCoordinator<MockTransport, MockBattery, MockPower, MockClock>;

    fn builder() -> CoordinatorBuilder<MockTransport, MockBattery, MockPower, MockClock> {
        LifecycleCoordinator::builder(
            MockTransport::new(),
            MockBattery::new(600),
            MockPower::new(),
            MockClock::new(),
        )
        .device_id("node")
        .power_down_attempts(1)
    }

    fn ready(mut coordinator: TestCoordinator) -> TestCoordinator {
        coordinator.start().unwrap();
        coordinator.handle_event(LifecycleEvent::ConnectedReady);
        coordinator
    }

    #[test]
    fn test_initial_state() {
        let coordinator = builder().build().unwrap();
        assert_eq!(coordinator.state(), LifecycleState::Connecting);
        assert!(!coordinator.transport().connected());
    }

    #[test]
    fn test_start_connects_once() {
        let mut coordinator = builder().build().unwrap();
        coordinator.start().unwrap();
        coordinator.start().unwrap();
        let connects = coordinator
            .transport()
            .calls()
            .iter()
            .filter(|c| matches!(c, crate::mock::TransportCall::Connect(_)))
            .count();
        assert_eq!(connects, 1);
    }

    #[test]
    fn test_connect_failure_stays_connecting() {
        let mut transport = MockTransport::new();
        transport.fail_connect(true);
        let mut coordinator = LifecycleCoordinator::builder(
            transport,
            MockBattery::new(600),
            MockPower::new(),
            MockClock::new(),
        )
        .build()
        .unwrap();

        assert!(coordinator.start().is_err());
        for _ in 0..10 {
            coordinator.tick();
        }
        assert_eq!(coordinator.state(), LifecycleState::Connecting);
        assert!(coordinator.power().requests().is_empty());
    }

    #[test]
    fn test_no_sensor_activity_while_connecting() {
        let sensor = MockSensor::valid(20.0, 40.0);
        let handle = sensor.handle();
        let mut coordinator = builder()
            .channel(SensorChannel::new("ambient", 2, sensor))
            .read_mode(ReadMode::Poll)
            .build()
            .unwrap();
        coordinator.start().unwrap();
        coordinator.tick();
        coordinator.tick();
        assert_eq!(handle.init_count(), 0);
        assert_eq!(handle.read_count(), 0);
    }

    #[test]
    fn test_ready_initializes_and_reports_battery() {
        let sensor = MockSensor::valid(20.0, 40.0);
        let handle = sensor.handle();
        let coordinator = ready(
            builder()
                .channel(SensorChannel::new("ambient", 2, sensor))
                .build()
                .unwrap(),
        );

        assert_eq!(coordinator.state(), LifecycleState::Reporting);
        assert_eq!(handle.init_count(), 1);
        assert_eq!(handle.read_count(), 0);
        assert_eq!(
            coordinator.transport().published_for("battery"),
            vec![("voltage", "3.30")]
        );
        assert_eq!(
            coordinator.stats().state_trace(),
            vec![
                LifecycleState::Connecting,
                LifecycleState::Ready,
                LifecycleState::Reporting
            ]
        );
    }

    #[test]
    fn test_repeated_ready_reports_battery_once() {
        let mut coordinator = ready(
            builder()
                .channel(SensorChannel::new(
                    "ambient",
                    2,
                    MockSensor::never_valid(),
                ))
                .read_mode(ReadMode::Poll)
                .build()
                .unwrap(),
        );
        coordinator.handle_event(LifecycleEvent::ConnectedReady);
        coordinator.tick();
        coordinator.handle_event(LifecycleEvent::ConnectedReady);
        assert_eq!(coordinator.transport().published_for("battery").len(), 1);
        assert_eq!(coordinator.battery().reads(), 1);
    }

    #[test]
    fn test_battery_failure_does_not_block_cycle() {
        let mut coordinator = LifecycleCoordinator::builder(
            MockTransport::new(),
            MockBattery::failing(),
            MockPower::new(),
            MockClock::new(),
        )
        .power_down_attempts(1)
        .build()
        .unwrap();
        coordinator.start().unwrap();
        coordinator.handle_event(LifecycleEvent::ConnectedReady);
        coordinator.tick();
        assert_eq!(coordinator.state(), LifecycleState::AwaitingShutdownConfirm);
        assert!(coordinator.stats().battery.is_none());
    }

    #[test]
    fn test_unsolicited_shutdown_confirmation_ignored() {
        let mut coordinator = ready(
            builder()
                .channel(SensorChannel::new(
                    "ambient",
                    2,
                    MockSensor::never_valid(),
                ))
                .read_mode(ReadMode::Poll)
                .build()
                .unwrap(),
        );
        coordinator.handle_event(LifecycleEvent::ShutdownConfirmed);
        assert_eq!(coordinator.state(), LifecycleState::Reporting);
        assert!(coordinator.power().requests().is_empty());
    }

    #[test]
    fn test_sleep_duration_from_settings() {
        let mut coordinator = ready(
            builder()
                .settings(Settings {
                    voltage_coefficient: 0.0055,
                    deep_sleep_seconds: 60,
                })
                .build()
                .unwrap(),
        );
        coordinator.tick();
        coordinator.handle_event(LifecycleEvent::ShutdownConfirmed);
        assert_eq!(coordinator.state(), LifecycleState::Sleeping);
        assert_eq!(coordinator.power().requests(), &[60_000_000]);
        assert_eq!(coordinator.stats().sleep_duration_us, Some(60_000_000));
    }

    #[test]
    fn test_power_down_retries_then_gives_up() {
        let mut coordinator = ready(
            builder()
                .power_down_attempts(3)
                .power_down_grace(Duration::from_millis(500))
                .build()
                .unwrap(),
        );
        coordinator.tick();
        coordinator.handle_event(LifecycleEvent::ShutdownConfirmed);

        assert_eq!(coordinator.power().requests().len(), 3);
        assert_eq!(coordinator.stats().power_down_attempts, 3);
        assert_eq!(coordinator.clock().now(), Duration::from_millis(1500));

        // terminal: nothing else happens
        coordinator.tick();
        coordinator.handle_event(LifecycleEvent::ShutdownConfirmed);
        assert_eq!(coordinator.power().requests().len(), 3);
        assert_eq!(coordinator.state(), LifecycleState::Sleeping);
    }

    #[test]
    fn test_accepted_power_down_stops_retrying() {
        let mut coordinator = LifecycleCoordinator::builder(
            MockTransport::new(),
            MockBattery::new(600),
            MockPower::new().sleeping(),
            MockClock::new(),
        )
        .power_down_attempts(3)
        .build()
        .unwrap();
        coordinator.start().unwrap();
        coordinator.handle_event(LifecycleEvent::ConnectedReady);
        coordinator.tick();
        coordinator.handle_event(LifecycleEvent::ShutdownConfirmed);
        assert_eq!(coordinator.power().requests().len(), 1);
        assert_eq!(coordinator.clock().now(), Duration::ZERO);
    }

    #[test]
    fn test_refused_power_down_counts_as_attempt() {
        let mut power = MockPower::new();
        power.refuse_next(1);
        let mut coordinator = LifecycleCoordinator::builder(
            MockTransport::new(),
            MockBattery::new(600),
            power,
            MockClock::new(),
        )
        .power_down_attempts(2)
        .build()
        .unwrap();
        coordinator.start().unwrap();
        coordinator.handle_event(LifecycleEvent::ConnectedReady);
        coordinator.tick();
        coordinator.handle_event(LifecycleEvent::ShutdownConfirmed);
        assert_eq!(coordinator.power().requests().len(), 1);
        assert_eq!(coordinator.stats().power_down_attempts, 2);
    }

    #[test]
    fn test_reporting_timeout_default_derivation() {
        let coordinator = builder().build().unwrap();
        assert_eq!(coordinator.reporting_timeout(), Duration::from_secs(30));

        let short = builder()
            .settings(Settings {
                voltage_coefficient: 0.0055,
                deep_sleep_seconds: 20,
            })
            .build()
            .unwrap();
        assert_eq!(short.reporting_timeout(), MIN_REPORTING_TIMEOUT);

        let explicit = builder()
            .reporting_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(explicit.reporting_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_build_rejects_duplicate_channels() {
        let result = builder()
            .channel(SensorChannel::new("a", 1, MockSensor::valid(1.0, 1.0)))
            .channel(SensorChannel::new("a", 2, MockSensor::valid(1.0, 1.0)))
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_build_rejects_bad_config() {
        assert!(builder().device_id(" ").build().is_err());
        assert!(builder().power_down_attempts(0).build().is_err());
        assert!(builder().reporting_timeout(Duration::ZERO).build().is_err());
        assert!(
            builder()
                .channel(SensorChannel::new("", 1, MockSensor::valid(1.0, 1.0)))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_settings_from_store() {
        use crate::settings::MapSettings;
        use wakenode_types::properties::DEEP_SLEEP_SECONDS_SETTING;

        let store = MapSettings::new().with_int(DEEP_SLEEP_SECONDS_SETTING, 900);
        let coordinator = builder().settings_from(&store).build().unwrap();
        assert_eq!(coordinator.settings().deep_sleep_seconds, 900);
        assert_eq!(coordinator.reporting_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_before_connect_reads_prior_to_connect() {
        let sensor = MockSensor::valid(4.0, 80.0);
        let handle = sensor.handle();
        let mut coordinator = builder()
            .channel(SensorChannel::new("refrigerator", 3, sensor))
            .acquisition(Acquisition::BeforeConnect)
            .build()
            .unwrap();

        coordinator.start().unwrap();
        assert_eq!(handle.read_count(), 1);
        assert!(coordinator.channels()[0].last_reading().is_some());
        assert!(coordinator.transport().published_for("refrigerator").is_empty());

        coordinator.handle_event(LifecycleEvent::ConnectedReady);
        assert_eq!(handle.init_count(), 1);
        coordinator.tick();
        assert_eq!(handle.read_count(), 1);
        assert_eq!(coordinator.transport().published_for("refrigerator").len(), 4);
        assert_eq!(coordinator.state(), LifecycleState::AwaitingShutdownConfirm);
    }

    #[test]
    fn test_before_connect_poll_reads_during_connecting() {
        let sensor = MockSensor::failing_then_valid(2, 4.0, 80.0);
        let handle = sensor.handle();
        let mut coordinator = builder()
            .channel(SensorChannel::new("refrigerator", 3, sensor))
            .acquisition(Acquisition::BeforeConnect)
            .read_mode(ReadMode::Poll)
            .build()
            .unwrap();

        coordinator.start().unwrap();
        coordinator.tick();
        coordinator.tick();
        assert_eq!(handle.read_count(), 3);
        assert!(coordinator.transport().published_for("refrigerator").is_empty());
        assert_eq!(coordinator.state(), LifecycleState::Connecting);

        coordinator.handle_event(LifecycleEvent::ConnectedReady);
        coordinator.tick();
        assert_eq!(handle.read_count(), 3);
        assert_eq!(coordinator.state(), LifecycleState::AwaitingShutdownConfirm);
    }

    #[test]
    fn test_publish_failure_marks_channel_reported() {
        let mut coordinator = ready(
            builder()
                .channel(SensorChannel::new(
                    "ambient",
                    2,
                    MockSensor::valid(20.0, 40.0),
                ))
                .build()
                .unwrap(),
        );
        coordinator.transport_mut().fail_publishes(true);
        coordinator.tick();
        assert!(coordinator.all_reported());
        assert_eq!(coordinator.transport().shutdown_requests(), 1);
        assert_eq!(coordinator.transport().publish_attempts(), 5);
    }
}
