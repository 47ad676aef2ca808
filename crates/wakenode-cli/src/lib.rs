//! Host-side tooling for wake-and-report sensor nodes.
//!
//! The `wakenode` binary runs the lifecycle coordinator from
//! [`wakenode_core`] against simulated hardware. A simulated transport plays
//! the device's event loop, so whole wake cycles can be watched from a
//! terminal: connect, battery report, sensor retries, reporting timeout,
//! two-phase shutdown.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Run simulated wake cycles from a config file |
//! | `heat-index` | Compute the heat index for a temperature and humidity |
//! | `battery` | Convert a raw ADC sample to volts |
//! | `config` | Print the default simulator configuration |
//!
//! # Configuration
//!
//! `run` reads `--config FILE`, then `~/.config/wakenode/config.toml` (or
//! the platform equivalent), then falls back to a built-in two-sensor node.
//! `wakenode config` prints that default as a starting point.
//!
//! # Examples
//!
//! ```bash
//! wakenode run --fast --cycles 3
//! wakenode run --config node.toml --format json
//! wakenode heat-index --temp-f 90 --humidity 60
//! wakenode battery --raw 600
//! ```

pub mod config;
pub mod format;
pub mod sim;

// Re-export core dependencies for convenience
pub use wakenode_core;
pub use wakenode_types;
