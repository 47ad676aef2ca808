//! Transport lifecycle events consumed by the coordinator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle notifications delivered by the transport.
///
/// The coordinator reacts to exactly these two; anything else the transport
/// knows about (reconnects, keep-alives) stays inside the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The session is established and publishing is possible.
    ConnectedReady,
    /// A requested shutdown completed and outbound messages are flushed.
    ShutdownConfirmed,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::ConnectedReady => write!(f, "connected-ready"),
            LifecycleEvent::ShutdownConfirmed => write!(f, "shutdown-confirmed"),
        }
    }
}
