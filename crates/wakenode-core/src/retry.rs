//! Sensor read retry policy.
//!
//! Single-wire humidity sensors routinely miss a conversion: the bus
//! transaction times out, the checksum fails, or the part is still settling
//! after power-on. A wake cycle therefore has to retry, and there are two
//! ways to do it with very different concurrency costs:
//!
//! - [`ReadMode::Blocking`] spins inside one call, sleeping between attempts.
//!   Nothing else runs on the device while it waits.
//! - [`ReadMode::Poll`] makes a single attempt and returns; the coordinator
//!   retries on its next tick, so one channel can publish while another is
//!   still pending.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use wakenode_core::ReadMode;
//!
//! // Retry every two seconds until a valid sample arrives
//! let blocking = ReadMode::blocking();
//! assert!(blocking.is_blocking());
//!
//! // Give up after five attempts, one second apart
//! let bounded = ReadMode::blocking()
//!     .retry_interval(Duration::from_secs(1))
//!     .max_attempts(5);
//! assert_eq!(bounded.attempt_limit(), Some(5));
//!
//! // One attempt per coordinator tick
//! assert!(!ReadMode::Poll.is_blocking());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default delay between blocking read attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// How a channel retries invalid samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReadMode {
    /// Block, sleeping `retry_interval` between attempts.
    Blocking {
        /// Delay between attempts.
        retry_interval: Duration,
        /// Give up after this many attempts (`None` = until the deadline).
        max_attempts: Option<u32>,
    },
    /// One attempt per call.
    Poll,
}

impl Default for ReadMode {
    fn default() -> Self {
        Self::blocking()
    }
}

impl ReadMode {
    /// Blocking retries with the default interval and no attempt limit.
    pub fn blocking() -> Self {
        Self::Blocking {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: None,
        }
    }

    /// Set the delay between blocking attempts.
    ///
    /// Has no effect on [`ReadMode::Poll`].
    #[must_use]
    pub fn retry_interval(self, interval: Duration) -> Self {
        match self {
            Self::Blocking { max_attempts, .. } => Self::Blocking {
                retry_interval: interval,
                max_attempts,
            },
            Self::Poll => Self::Poll,
        }
    }

    /// Cap the number of blocking attempts.
    ///
    /// Has no effect on [`ReadMode::Poll`].
    #[must_use]
    pub fn max_attempts(self, attempts: u32) -> Self {
        match self {
            Self::Blocking { retry_interval, .. } => Self::Blocking {
                retry_interval,
                max_attempts: Some(attempts.max(1)),
            },
            Self::Poll => Self::Poll,
        }
    }

    /// Whether a read call may block the device.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocking { .. })
    }

    /// Attempts allowed per read call, if bounded.
    pub fn attempt_limit(&self) -> Option<u32> {
        match self {
            Self::Blocking { max_attempts, .. } => *max_attempts,
            Self::Poll => Some(1),
        }
    }
}
