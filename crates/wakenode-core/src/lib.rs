//! Wake-lifecycle core for battery-powered sensor nodes.
//!
//! A node wakes from deep sleep and connects to its broker. It samples one or
//! more temperature/humidity sensors and publishes each valid reading exactly
//! once, along with the battery voltage. Then it asks the transport to shut
//! down and powers off once the transport confirms the outbound queue is
//! flushed. This crate contains the state machine that orders those steps and
//! the narrow traits it uses to reach hardware and the network.
//!
//! # Features
//!
//! - **Exactly-once reporting**: each channel publishes one valid reading per cycle
//! - **Two-phase shutdown**: power-down waits for the transport's flush confirmation
//! - **Reporting timeout**: a failed sensor cannot keep the node awake
//! - **Retry policies**: blocking reads with a retry interval, or tick-driven polling
//! - **Settings with fallbacks**: invalid stored values fall back to defaults
//! - **Mocks**: every collaborator has an in-memory stand-in
//!
//! # Quick Start
//!
//! ```
//! use wakenode_core::mock::{MockBattery, MockClock, MockPower, MockSensor, MockTransport};
//! use wakenode_core::{LifecycleCoordinator, LifecycleEvent, LifecycleState, SensorChannel};
//!
//! # fn main() -> wakenode_core::Result<()> {
//! let mut node = LifecycleCoordinator::builder(
//!     MockTransport::new(),
//!     MockBattery::new(600),
//!     MockPower::new(),
//!     MockClock::new(),
//! )
//! .channel(SensorChannel::new("freezer", 2, MockSensor::valid(-18.0, 60.0)))
//! .channel(SensorChannel::new("refrigerator", 0, MockSensor::valid(4.0, 75.0)))
//! .build()?;
//!
//! node.start()?;
//! node.handle_event(LifecycleEvent::ConnectedReady);
//! node.tick();
//! assert_eq!(node.state(), LifecycleState::AwaitingShutdownConfirm);
//!
//! node.handle_event(LifecycleEvent::ShutdownConfirmed);
//! assert_eq!(node.state(), LifecycleState::Sleeping);
//! assert_eq!(node.power().requests()[0], 300_000_000);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod mock;
pub mod publisher;
pub mod retry;
pub mod sensor;
pub mod settings;
pub mod stats;
pub mod traits;

// Core exports
pub use clock::SystemClock;
pub use coordinator::{Acquisition, CoordinatorBuilder, CoordinatorConfig, LifecycleCoordinator};
pub use error::{Error, Result};
pub use events::LifecycleEvent;
pub use publisher::ReadingPublisher;
pub use retry::ReadMode;
pub use sensor::{ReadOutcome, SensorChannel, SensorReader};
pub use settings::{MapSettings, SettingValue, load_settings, try_load_settings};
pub use stats::{CycleStats, StateTransition};
pub use traits::{BatteryInput, Clock, PowerControl, SensorDriver, SettingsStore, Transport};

// Re-export from wakenode-types
pub use wakenode_types::properties;
pub use wakenode_types::{
    BatteryStatus, FirmwareInfo, LifecycleState, RawSample, Reading, SensorModel, Settings,
    SettingsError,
};
