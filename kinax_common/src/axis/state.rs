//! Logical-axis move state.
//!
//! ```text
//! Idle → Planning → Dispatched → Arriving → {Verified | Inconsistent}
//!                       ↑            │
//!                       └────────────┘  (next waypoint)
//! Dispatched | Arriving → Stopped → Idle   (after reconciliation)
//! Dispatched | Arriving → Faulted          (actuator fault, timeout)
//! ```

use crate::actuator::ActuatorStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-axis move state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum MoveState {
    /// At rest, no active plan.
    #[default]
    Idle = 0,
    /// Forward transform, limit and interlock evaluation in progress.
    Planning = 1,
    /// Current waypoint commanded, not yet observed.
    Dispatched = 2,
    /// Members observed, waiting for arrival.
    Arriving = 3,
    /// Last move landed on the forward-computed solution.
    Verified = 4,
    /// Readings disagree with the solution. Latched.
    Inconsistent = 5,
    /// Interrupted; waiting for reconciliation.
    Stopped = 6,
    /// Actuator fault or arrival timeout. Latched.
    Faulted = 7,
}

impl MoveState {
    /// A plan is in flight.
    #[inline]
    pub const fn is_moving(self) -> bool {
        matches!(self, Self::Planning | Self::Dispatched | Self::Arriving)
    }

    /// Terminal until explicit acknowledgement or a new move.
    #[inline]
    pub const fn is_latched(self) -> bool {
        matches!(self, Self::Inconsistent | Self::Faulted)
    }

    /// Stop commands are deliverable in this state.
    #[inline]
    pub const fn accepts_stop(self) -> bool {
        !matches!(self, Self::Idle | Self::Verified)
    }

    /// Coarse status for the key/value channel.
    pub const fn summary(self) -> ActuatorStatus {
        match self {
            Self::Idle | Self::Verified => ActuatorStatus::Ok,
            Self::Planning | Self::Dispatched | Self::Arriving => ActuatorStatus::Busy,
            Self::Stopped => ActuatorStatus::Warn,
            Self::Inconsistent | Self::Faulted => ActuatorStatus::Error,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Dispatched => "dispatched",
            Self::Arriving => "arriving",
            Self::Verified => "verified",
            Self::Inconsistent => "inconsistent",
            Self::Stopped => "stopped",
            Self::Faulted => "faulted",
        }
    }
}

impl fmt::Display for MoveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
