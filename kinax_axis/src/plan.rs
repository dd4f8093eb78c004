//! Move plans.
//!
//! An [`ActuatorPlan`] is the set of `(member, target, tolerance)` triples for
//! one step; a [`WaypointSequence`] is the ordered list of plans realising one
//! logical target. Both are built fresh per move and never mutated after
//! dispatch. Capacity is fixed (`MAX_MEMBERS`, `MAX_WAYPOINTS`).

use heapless::Vec as FixedVec;
use kinax_common::axis::error::AxisError;
use kinax_common::consts::{MAX_MEMBERS, MAX_WAYPOINTS};

/// Index of a member in its axis, in kinematic role order.
pub type MemberIndex = usize;

/// Requested logical value with its acceptance tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogicalTarget {
    pub value: f64,
    pub tolerance: f64,
}

/// One actuator target inside a plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedMove {
    pub member: MemberIndex,
    pub target: f64,
    /// Arrival tolerance, the member's precision.
    pub tolerance: f64,
}

impl PlannedMove {
    #[inline]
    pub fn arrived(&self, value: f64) -> bool {
        (value - self.target).abs() <= self.tolerance
    }
}

/// Targets for the members moved in one step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActuatorPlan {
    moves: FixedVec<PlannedMove, MAX_MEMBERS>,
}

impl ActuatorPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the target of `member`.
    pub fn set(
        &mut self,
        member: MemberIndex,
        target: f64,
        tolerance: f64,
    ) -> Result<&mut Self, AxisError> {
        let planned = PlannedMove {
            member,
            target,
            tolerance,
        };
        if let Some(existing) = self.moves.iter_mut().find(|m| m.member == member) {
            *existing = planned;
        } else {
            self.moves.push(planned).map_err(|_| {
                AxisError::InvalidState(format!("plan exceeds {MAX_MEMBERS} members"))
            })?;
        }
        Ok(self)
    }

    pub fn moves(&self) -> &[PlannedMove] {
        &self.moves
    }

    pub fn target_of(&self, member: MemberIndex) -> Option<f64> {
        self.moves
            .iter()
            .find(|m| m.member == member)
            .map(|m| m.target)
    }

    pub fn members(&self) -> impl Iterator<Item = MemberIndex> + '_ {
        self.moves.iter().map(|m| m.member)
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

/// Ordered waypoints for one request.
///
/// `logical` is `None` for a single-member jog, which has no logical target
/// to verify against.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointSequence {
    logical: Option<LogicalTarget>,
    waypoints: FixedVec<ActuatorPlan, MAX_WAYPOINTS>,
}

impl WaypointSequence {
    pub fn new(logical: LogicalTarget) -> Self {
        Self {
            logical: Some(logical),
            waypoints: FixedVec::new(),
        }
    }

    /// Direct move: a one-waypoint sequence.
    pub fn single(logical: LogicalTarget, plan: ActuatorPlan) -> Self {
        let mut seq = Self::new(logical);
        // A fresh sequence always has room for one waypoint.
        let _ = seq.waypoints.push(plan);
        seq
    }

    /// Single-member jog with no logical target.
    pub fn jog(plan: ActuatorPlan) -> Self {
        let mut waypoints = FixedVec::new();
        let _ = waypoints.push(plan);
        Self {
            logical: None,
            waypoints,
        }
    }

    pub fn push(&mut self, plan: ActuatorPlan) -> Result<(), AxisError> {
        self.waypoints.push(plan).map_err(|_| {
            AxisError::NoRoute(format!("route needs more than {MAX_WAYPOINTS} waypoints"))
        })
    }

    pub fn logical(&self) -> Option<LogicalTarget> {
        self.logical
    }

    pub fn waypoints(&self) -> &[ActuatorPlan] {
        &self.waypoints
    }

    pub fn get(&self, index: usize) -> Option<&ActuatorPlan> {
        self.waypoints.get(index)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Where every touched member ends up: the last target per member.
    pub fn final_plan(&self) -> ActuatorPlan {
        let mut merged = ActuatorPlan::new();
        for mv in self.waypoints.iter().flat_map(|w| w.moves()) {
            // Members are bounded by MAX_MEMBERS in every waypoint, so the
            // merged plan cannot overflow.
            let _ = merged.set(mv.member, mv.target, mv.tolerance);
        }
        merged
    }

    /// Distinct members commanded anywhere in the sequence.
    pub fn members(&self) -> Vec<MemberIndex> {
        let mut out: Vec<MemberIndex> = Vec::new();
        for m in self.waypoints.iter().flat_map(|w| w.members()) {
            if !out.contains(&m) {
                out.push(m);
            }
        }
        out
    }
}
