//! Collaborator traits for the wake lifecycle.
//!
//! The coordinator never touches hardware or the network directly. Everything
//! it needs from the outside world goes through these narrow traits, so the
//! same state machine runs against real peripherals, the host simulator, or
//! the mocks in [`crate::mock`].
//!
//! All methods take `&mut self`: the coordinator owns its collaborators and
//! runs on a single cooperative thread.

use std::time::Duration;

use wakenode_types::{FirmwareInfo, RawSample};

use crate::error::Result;

/// Connectivity and publish/subscribe session.
///
/// The transport also owns the event loop: it calls
/// [`LifecycleCoordinator::tick`](crate::LifecycleCoordinator::tick) once per
/// loop iteration and delivers lifecycle changes through
/// [`LifecycleCoordinator::handle_event`](crate::LifecycleCoordinator::handle_event).
pub trait Transport {
    /// Begin establishing the session.
    ///
    /// Returning `Ok` only means the attempt started; readiness is signalled
    /// later with [`LifecycleEvent::ConnectedReady`](crate::LifecycleEvent::ConnectedReady).
    fn connect(&mut self, firmware: &FirmwareInfo) -> Result<()>;

    /// Queue one property update for delivery.
    fn publish_property(
        &mut self,
        device_id: &str,
        channel_id: &str,
        key: &str,
        value: &str,
    ) -> Result<()>;

    /// Ask the transport to flush and close the session.
    ///
    /// Completion is signalled later with
    /// [`LifecycleEvent::ShutdownConfirmed`](crate::LifecycleEvent::ShutdownConfirmed).
    fn request_shutdown(&mut self) -> Result<()>;
}

/// Low-level temperature/humidity sensor driver.
pub trait SensorDriver {
    /// Power on and configure the sensor on `pin`.
    fn initialize(&mut self, pin: u8) -> Result<()>;

    /// Perform one bus transaction.
    ///
    /// Timing misses and checksum failures should come back as an invalid
    /// [`RawSample`] rather than an error; errors are reserved for a bus
    /// that cannot be driven at all.
    fn read_raw(&mut self) -> Result<RawSample>;
}

/// Read-only view of externally persisted settings.
pub trait SettingsStore {
    /// Look up a floating-point setting.
    fn get_float(&self, name: &str) -> Option<f64>;

    /// Look up an integer setting.
    fn get_int(&self, name: &str) -> Option<i64>;
}

/// Deep-sleep control.
pub trait PowerControl {
    /// Enter deep sleep for `duration_us` microseconds.
    ///
    /// On hardware this does not return. Returning `Ok` means the request was
    /// accepted but execution continued anyway.
    fn enter_deep_sleep(&mut self, duration_us: u64) -> Result<()>;

    /// Whether the last accepted request actually powered the node down.
    ///
    /// Only meaningful for simulated power control, where the call returns
    /// after "sleeping". Hardware never gets to ask.
    fn powered_down(&self) -> bool {
        false
    }
}

/// Battery voltage divider on an ADC pin.
pub trait BatteryInput {
    /// Take one raw ADC sample.
    fn read_raw(&mut self) -> Result<u16>;
}

/// Monotonic time and blocking delay.
///
/// Injected so retry loops and post-power-down waits run instantly in tests.
pub trait Clock {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);
}
