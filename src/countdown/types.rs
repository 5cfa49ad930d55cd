//! Countdown state exposed to observers

use serde::{Deserialize, Serialize};

/// Label shown while the refresh callback runs
pub const DEFAULT_LOADING_LABEL: &str = "Refreshing...";

/// Lifecycle phase of a countdown cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownPhase {
    /// Timer live, counting down (or holding at zero before firing)
    Running,

    /// Timer cancelled, remaining ticks frozen
    Paused,

    /// Countdown reached zero, refresh callback in flight
    Executing,
}

/// Snapshot of a countdown, published on every transition and tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownState {
    /// Seconds left until the refresh fires (0..=total_duration)
    pub remaining_ticks: u32,

    /// Configured countdown length in seconds (> 0)
    pub total_duration: u32,

    pub phase: CountdownPhase,
}

impl CountdownState {
    pub(crate) fn new(total_duration: u32) -> Self {
        Self {
            remaining_ticks: total_duration,
            total_duration,
            phase: CountdownPhase::Running,
        }
    }

    /// Discrete completion percentage
    ///
    /// duration=3: 3s=0%, 2s=33.3%, 1s=66.7%, 0s=100%
    pub fn progress(&self) -> f64 {
        if self.total_duration == 0 {
            return 100.0;
        }
        let elapsed = self.total_duration.saturating_sub(self.remaining_ticks);
        f64::from(elapsed) / f64::from(self.total_duration) * 100.0
    }

    /// Text for the countdown badge: `"{n}s"`, or `loading_label` while executing
    pub fn label(&self, loading_label: &str) -> String {
        match self.phase {
            CountdownPhase::Executing => loading_label.to_string(),
            CountdownPhase::Paused => format!("{}s (paused)", self.remaining_ticks),
            CountdownPhase::Running => format!("{}s", self.remaining_ticks),
        }
    }
}
