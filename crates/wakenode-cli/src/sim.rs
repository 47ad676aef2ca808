//! Host-side simulation of a wake cycle.
//!
//! The simulated transport plays the role a real publish/subscribe client
//! plays on the device: it owns the event loop, calls the coordinator's
//! `tick` once per iteration, and raises `ConnectedReady` and
//! `ShutdownConfirmed` after configurable delays.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info};

use wakenode_core::{
    BatteryInput, Clock, CycleStats, Error, FirmwareInfo, LifecycleCoordinator, LifecycleEvent,
    LifecycleState, PowerControl, RawSample, SensorChannel, SensorDriver, SystemClock, Transport,
};

use crate::config::{ChannelConfig, Config};

/// One property update as seen by the simulated broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedProperty {
    /// Channel the property belongs to.
    pub channel: String,
    /// Property key.
    pub key: String,
    /// Formatted value.
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting { remaining: u32 },
    Connected,
    Flushing { remaining: u32 },
    Closed,
}

/// Simulated publish/subscribe session.
#[derive(Debug)]
pub struct SimTransport {
    connect_ticks: u32,
    flush_ticks: u32,
    phase: Phase,
    published: Vec<PublishedProperty>,
}

impl SimTransport {
    /// A transport that becomes ready `connect_ticks` iterations after
    /// `connect` and confirms shutdown `flush_ticks` iterations after the
    /// request.
    pub fn new(connect_ticks: u32, flush_ticks: u32) -> Self {
        Self {
            connect_ticks,
            flush_ticks,
            phase: Phase::Idle,
            published: Vec::new(),
        }
    }

    /// Advance the session by one loop iteration.
    pub fn poll_event(&mut self) -> Option<LifecycleEvent> {
        match self.phase {
            Phase::Connecting { remaining: 0 } => {
                self.phase = Phase::Connected;
                Some(LifecycleEvent::ConnectedReady)
            }
            Phase::Connecting { remaining } => {
                self.phase = Phase::Connecting {
                    remaining: remaining - 1,
                };
                None
            }
            Phase::Flushing { remaining: 0 } => {
                self.phase = Phase::Closed;
                Some(LifecycleEvent::ShutdownConfirmed)
            }
            Phase::Flushing { remaining } => {
                self.phase = Phase::Flushing {
                    remaining: remaining - 1,
                };
                None
            }
            Phase::Idle | Phase::Connected | Phase::Closed => None,
        }
    }

    /// Every property delivered so far.
    pub fn published(&self) -> &[PublishedProperty] {
        &self.published
    }
}

impl Transport for SimTransport {
    fn connect(&mut self, firmware: &FirmwareInfo) -> wakenode_core::Result<()> {
        debug!(%firmware, "connecting");
        self.phase = Phase::Connecting {
            remaining: self.connect_ticks,
        };
        Ok(())
    }

    fn publish_property(
        &mut self,
        _device_id: &str,
        channel_id: &str,
        key: &str,
        value: &str,
    ) -> wakenode_core::Result<()> {
        if self.phase != Phase::Connected {
            return Err(Error::transport(format!(
                "cannot publish {channel_id}/{key} while {:?}",
                self.phase
            )));
        }
        self.published.push(PublishedProperty {
            channel: channel_id.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn request_shutdown(&mut self) -> wakenode_core::Result<()> {
        debug!("flushing and disconnecting");
        self.phase = Phase::Flushing {
            remaining: self.flush_ticks,
        };
        Ok(())
    }
}

/// Simulated temperature/humidity sensor.
#[derive(Debug)]
pub struct SimSensor {
    remaining_failures: u32,
    failure_rate: f64,
    sample: RawSample,
    rng: StdRng,
}

impl SimSensor {
    /// Build a sensor from its config entry.
    pub fn new(config: &ChannelConfig, rng: StdRng) -> Self {
        Self {
            remaining_failures: config.failures_before_valid,
            failure_rate: config.failure_rate,
            sample: RawSample::from_celsius(config.temperature_c, config.humidity),
            rng,
        }
    }
}

impl SensorDriver for SimSensor {
    fn initialize(&mut self, pin: u8) -> wakenode_core::Result<()> {
        debug!(pin, "sensor powered");
        Ok(())
    }

    fn read_raw(&mut self) -> wakenode_core::Result<RawSample> {
        if self.remaining_failures > 0 {
            self.remaining_failures -= 1;
            return Ok(RawSample::invalid());
        }
        if self.failure_rate > 0.0 && self.rng.random_bool(self.failure_rate) {
            return Ok(RawSample::invalid());
        }
        Ok(self.sample)
    }
}

/// Fixed-count battery divider.
#[derive(Debug, Clone, Copy)]
pub struct SimBattery {
    raw: u16,
}

impl SimBattery {
    /// A divider that always reads `raw`.
    pub fn new(raw: u16) -> Self {
        Self { raw }
    }
}

impl BatteryInput for SimBattery {
    fn read_raw(&mut self) -> wakenode_core::Result<u16> {
        Ok(self.raw)
    }
}

/// Power controller that records the requested sleep and "sleeps".
#[derive(Debug, Default)]
pub struct SimPower {
    requested_us: Option<u64>,
}

impl SimPower {
    /// The sleep duration requested, in microseconds.
    pub fn requested_us(&self) -> Option<u64> {
        self.requested_us
    }
}

impl PowerControl for SimPower {
    fn enter_deep_sleep(&mut self, duration_us: u64) -> wakenode_core::Result<()> {
        self.requested_us = Some(duration_us);
        Ok(())
    }

    fn powered_down(&self) -> bool {
        self.requested_us.is_some()
    }
}

/// Wall-clock or virtual time.
#[derive(Debug, Clone, Copy)]
pub enum SimClock {
    /// Real time; the loop waits between ticks.
    Real(SystemClock),
    /// Virtual time advanced by the loop and by sensor retry delays.
    Virtual {
        /// Elapsed virtual time.
        now: Duration,
    },
}

impl SimClock {
    /// Advance virtual time by one loop period. No-op for real time.
    pub fn advance(&mut self, period: Duration) {
        if let SimClock::Virtual { now } = self {
            *now = now.saturating_add(period);
        }
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        match self {
            SimClock::Real(clock) => clock.now(),
            SimClock::Virtual { now } => *now,
        }
    }

    fn sleep(&mut self, duration: Duration) {
        match self {
            // A blocking read holds the node for the whole retry delay. On a
            // multi-thread runtime the worker hands its other tasks off first.
            SimClock::Real(clock) => match Handle::try_current() {
                Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                    tokio::task::block_in_place(|| clock.sleep(duration));
                }
                _ => clock.sleep(duration),
            },
            SimClock::Virtual { now } => *now = now.saturating_add(duration),
        }
    }
}

/// Outcome of one simulated wake cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u32,
    /// Wall-clock start time (RFC 3339).
    pub started_at: String,
    /// Logical device id.
    pub device_id: String,
    /// State the coordinator ended in.
    pub final_state: LifecycleState,
    /// Sleep interval handed to the power controller, in seconds.
    pub sleep_seconds: Option<u64>,
    /// Coordinator statistics.
    pub stats: CycleStats,
    /// Properties delivered to the simulated broker, in order.
    pub published: Vec<PublishedProperty>,
}

type SimNode = LifecycleCoordinator<SimTransport, SimBattery, SimPower, SimClock>;

fn build_node(config: &Config, cycle: u32, fast: bool) -> Result<SimNode> {
    let seed = config.seed.unwrap_or_else(rand::random);
    let channels = config.channels.iter().enumerate().map(|(index, channel)| {
        let rng = StdRng::seed_from_u64(seed ^ (u64::from(cycle) << 32) ^ index as u64);
        SensorChannel::new(channel.id.clone(), channel.pin, SimSensor::new(channel, rng))
            .with_model(channel.model)
            .with_heat_index(channel.heat_index)
    });

    let clock = if fast {
        SimClock::Virtual {
            now: Duration::ZERO,
        }
    } else {
        SimClock::Real(SystemClock::new())
    };

    let mut builder = LifecycleCoordinator::builder(
        SimTransport::new(config.transport.connect_ticks, config.transport.flush_ticks),
        SimBattery::new(config.battery.raw_sample),
        SimPower::default(),
        clock,
    )
    .device_id(config.node.device_id.clone())
    .channels(channels)
    .read_mode(config.read_mode.to_read_mode())
    .acquisition(config.node.acquisition)
    .settings_from(&config.settings.to_store())
    .publish_diagnostics(config.node.publish_diagnostics)
    .power_down_attempts(config.node.power_down_attempts)
    .power_down_grace(Duration::from_millis(config.node.power_down_grace_ms))
    .firmware(FirmwareInfo::default());

    if let Some(secs) = config.node.reporting_timeout_secs {
        builder = builder.reporting_timeout(Duration::from_secs(secs));
    }

    builder.build().context("Invalid node configuration")
}

/// Run one wake cycle to completion.
///
/// With `fast` the loop runs on virtual time and never waits; otherwise it
/// ticks every `transport.tick_ms` of real time.
pub async fn run_cycle(config: &Config, cycle: u32, fast: bool) -> Result<CycleReport> {
    let mut node = build_node(config, cycle, fast)?;
    let started_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("Failed to format start time")?;

    node.start()?;

    let period = config.transport.tick();
    let mut interval = (!fast).then(|| tokio::time::interval(period));

    for _ in 0..config.transport.max_ticks {
        match interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => tokio::task::yield_now().await,
        }
        node.clock_mut().advance(period);

        if let Some(event) = node.transport_mut().poll_event() {
            node.handle_event(event);
        }
        if node.state() == LifecycleState::Sleeping {
            break;
        }
        node.tick();
    }

    if node.state() != LifecycleState::Sleeping {
        bail!(
            "cycle {} stuck in {} after {} ticks",
            cycle,
            node.state(),
            config.transport.max_ticks
        );
    }

    let sleep_seconds = node.power().requested_us().map(|us| us / 1_000_000);
    info!(
        cycle,
        ticks = node.stats().ticks,
        sleep_seconds = ?sleep_seconds,
        "cycle complete"
    );

    Ok(CycleReport {
        cycle,
        started_at,
        device_id: config.node.device_id.clone(),
        final_state: node.state(),
        sleep_seconds,
        stats: node.stats().clone(),
        published: node.transport().published().to_vec(),
    })
}

/// Run `cycles` consecutive wake cycles.
///
/// Each cycle builds a fresh coordinator, like a node waking from deep sleep
/// with no retained state. The sleep itself is not waited out.
pub async fn run(config: &Config, cycles: u32, fast: bool) -> Result<Vec<CycleReport>> {
    let mut reports = Vec::with_capacity(cycles as usize);
    for cycle in 1..=cycles {
        let report = run_cycle(config, cycle, fast).await?;
        if cycle < cycles {
            debug!(
                seconds = ?report.sleep_seconds,
                "skipping simulated deep sleep"
            );
        }
        reports.push(report);
    }
    Ok(reports)
}
