//! Consistency checks between a plan, the readings and the logical value.
//!
//! An axis is only reported at its target when every member is at its
//! planned position *and* the inverse transform agrees with the logical
//! target. Checks never command hardware.

use crate::kinematics::{Kinematics, LiveState};
use crate::plan::{ActuatorPlan, LogicalTarget};
use kinax_common::axis::error::AxisError;

/// Every member of `plan` is within its tolerance.
///
/// # Errors
/// `PositionInconsistency` naming the first member that missed.
pub fn check_arrival(plan: &ActuatorPlan, live: &LiveState<'_>) -> Result<(), AxisError> {
    for mv in plan.moves() {
        let value = live.position(mv.member)?;
        if !mv.arrived(value) {
            return Err(AxisError::PositionInconsistency(format!(
                "member {} at {value} missed target {} (tolerance {})",
                mv.member, mv.target, mv.tolerance
            )));
        }
    }
    Ok(())
}

/// Arrival check followed by the logical cross-check.
///
/// Returns the logical value recomputed from the readings.
pub fn verify(
    kinematics: &dyn Kinematics,
    plan: &ActuatorPlan,
    target: &LogicalTarget,
    live: &LiveState<'_>,
) -> Result<f64, AxisError> {
    check_arrival(plan, live)?;
    within_target(kinematics, target, live)
}

/// Check an axis at rest, optionally against the target it should hold.
pub fn verify_resting(
    kinematics: &dyn Kinematics,
    live: &LiveState<'_>,
    expected: Option<LogicalTarget>,
) -> Result<f64, AxisError> {
    match expected {
        Some(target) => within_target(kinematics, &target, live),
        None => kinematics.inverse(live),
    }
}

fn within_target(
    kinematics: &dyn Kinematics,
    target: &LogicalTarget,
    live: &LiveState<'_>,
) -> Result<f64, AxisError> {
    let value = kinematics.inverse(live)?;
    let off = kinematics.distance(value, target.value);
    if off > target.tolerance {
        return Err(AxisError::PositionInconsistency(format!(
            "logical value {value} is {off} from target {} (tolerance {})",
            target.value, target.tolerance
        )));
    }
    Ok(value)
}
