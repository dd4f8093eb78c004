//! MoveState transitions.
//!
//! `Idle → Planning → Dispatched → Arriving → {Verified | Inconsistent}`,
//! with `Arriving → Dispatched` per further waypoint, `Stopped` reachable from
//! any moving state and `Faulted` on actuator fault or timeout. `Inconsistent`
//! and `Faulted` stay latched until a new plan or an acknowledgement.

use kinax_common::axis::state::MoveState;

/// Result of a MoveState transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Transition succeeded; carries the new state.
    Ok(MoveState),
    /// Transition rejected; carries the reason.
    Rejected(&'static str),
}

impl Transition {
    #[inline]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Event driving a MoveState transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveEvent {
    /// New target accepted for planning.
    Plan,
    /// Planning failed before anything was commanded.
    PlanRejected,
    /// Waypoint commanded.
    Dispatch,
    /// First poll after dispatch.
    Polled,
    /// Final waypoint arrived and the logical value checks out.
    Arrived,
    /// Jog finished; there is no logical target to verify.
    Released,
    /// Readings disagree with the plan or the transform.
    Mismatch,
    /// Stop requested.
    Stop,
    /// Logical value rebuilt from readings after a stop.
    Reconciled,
    /// Actuator fault or arrival timeout.
    Fault,
    /// Next waypoint became illegal.
    Conflict,
    /// Operator cleared a latched state.
    Acknowledge,
    /// Calibration replaced; the verified target no longer applies.
    Settle,
    /// On-demand check found the axis off its solution.
    Detect,
}

/// MoveState holder.
#[derive(Debug, Clone)]
pub struct MoveStateMachine {
    state: MoveState,
    /// State restored if planning is rejected.
    resume: MoveState,
}

impl Default for MoveStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveStateMachine {
    pub const fn new() -> Self {
        Self {
            state: MoveState::Idle,
            resume: MoveState::Idle,
        }
    }

    #[inline]
    pub const fn state(&self) -> MoveState {
        self.state
    }

    /// Attempt a transition given an event.
    pub fn handle_event(&mut self, event: MoveEvent) -> Transition {
        use MoveEvent::*;
        use MoveState::*;

        let next = match (self.state, event) {
            // A new plan may start from any resting or latched state.
            (Idle | Verified | Inconsistent | Faulted | Stopped, Plan) => {
                self.resume = self.state;
                Planning
            }
            // Rejected plans leave no trace.
            (Planning, PlanRejected) => self.resume,

            (Planning | Arriving, Dispatch) => Dispatched,
            (Dispatched, Polled) => Arriving,

            (Arriving, Arrived) => Verified,
            (Arriving, Released) => Idle,
            (Arriving, Mismatch) => Inconsistent,

            (Planning | Dispatched | Arriving, Stop) => Stopped,
            (Stopped, Reconciled) => Idle,

            (Planning | Dispatched | Arriving, Fault) => Faulted,
            (Dispatched | Arriving, Conflict) => Idle,

            (Inconsistent | Faulted, Acknowledge) => Idle,
            (Verified, Settle) => Idle,
            (Idle | Verified | Stopped, Detect) => Inconsistent,

            _ => return Transition::Rejected(invalid_transition_reason(self.state, event)),
        };

        self.state = next;
        Transition::Ok(next)
    }
}

fn invalid_transition_reason(state: MoveState, event: MoveEvent) -> &'static str {
    use MoveEvent::*;
    use MoveState::*;
    match (state, event) {
        (Planning | Dispatched | Arriving, Plan) => "a plan is already in flight",
        (Idle | Verified, Stop) => "nothing to stop",
        (_, Acknowledge) => "only Inconsistent or Faulted can be acknowledged",
        (Inconsistent | Faulted, _) => "latched: re-plan or acknowledge first",
        (Idle, _) => "Idle: invalid event for current state",
        (Planning, _) => "Planning: invalid event for current state",
        (Dispatched, _) => "Dispatched: invalid event for current state",
        (Arriving, _) => "Arriving: invalid event for current state",
        (Verified, _) => "Verified: invalid event for current state",
        (Stopped, _) => "Stopped: only Plan, Reconciled or Detect allowed",
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
