//! Per-cycle statistics.
//!
//! A [`CycleStats`] is the coordinator's record of what happened during one
//! wake cycle. The device itself has nowhere to keep it across deep sleep;
//! it exists so host tooling and tests can observe a cycle after the fact.

use serde::{Deserialize, Serialize};

use wakenode_types::{BatteryStatus, LifecycleState};

/// A state change and the tick it happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// State entered.
    pub state: LifecycleState,
    /// Value of [`CycleStats::ticks`] when it was entered.
    pub tick: u64,
}

/// What happened during one wake cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Number of scheduler ticks processed.
    pub ticks: u64,
    /// Battery status, if it was sampled and published.
    pub battery: Option<BatteryStatus>,
    /// Channels whose readings were published, in publish order.
    pub published: Vec<String>,
    /// Channels abandoned when the reporting timeout fired.
    pub timed_out: Vec<String>,
    /// Total property updates handed to the transport.
    pub properties_sent: u32,
    /// Tick on which shutdown was requested.
    pub shutdown_tick: Option<u64>,
    /// Sleep duration handed to the power controller.
    pub sleep_duration_us: Option<u64>,
    /// Number of power-down calls issued.
    pub power_down_attempts: u32,
    /// Every state entered, in order.
    pub transitions: Vec<StateTransition>,
}

impl CycleStats {
    /// Whether the cycle gave up on at least one channel.
    pub fn had_timeout(&self) -> bool {
        !self.timed_out.is_empty()
    }

    /// Tick on which `state` was first entered.
    pub fn entered_at(&self, state: LifecycleState) -> Option<u64> {
        self.transitions
            .iter()
            .find(|t| t.state == state)
            .map(|t| t.tick)
    }

    /// States entered, in order.
    pub fn state_trace(&self) -> Vec<LifecycleState> {
        self.transitions.iter().map(|t| t.state).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entered_at_and_trace() {
        let stats = CycleStats {
            transitions: vec![
                StateTransition {
                    state: LifecycleState::Connecting,
                    tick: 0,
                },
                StateTransition {
                    state: LifecycleState::Reporting,
                    tick: 2,
                },
            ],
            ..Default::default()
        };
        assert_eq!(stats.entered_at(LifecycleState::Reporting), Some(2));
        assert_eq!(stats.entered_at(LifecycleState::Sleeping), None);
        assert_eq!(
            stats.state_trace(),
            vec![LifecycleState::Connecting, LifecycleState::Reporting]
        );
        assert!(!stats.had_timeout());
    }

    #[test]
    fn test_stats_serialization() {
        let stats = CycleStats {
            ticks: 3,
            published: vec!["freezer".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"ticks\":3"));
        assert!(json.contains("\"published\":[\"freezer\"]"));
    }
}
