//! Integration test: obstacle-constrained rotation.
//!
//! Validates the lift detour, rejection of blocked routes, the moving
//! beamstop shadow and the mid-sequence re-check.

use super::{context, position, settle};
use kinax_common::axis::error::{AxisError, FaultFlags};
use kinax_common::axis::state::MoveState;
use kinax_hal::SimClock;

const LIFTED: &str = r#"
[shared]
service_name = "sample-stage"

[[actuators]]
name = "rot"
limits = [-180.0, 180.0]
precision = 0.01

[[actuators]]
name = "lift"
limits = [0.0, 100.0]
precision = 0.1

[[axes]]
name = "srot"
unit = "deg"
members = { rotation = "rot", lift = "lift" }

[axes.kinematics]
type = "obstacle"
lift = { safe_position = 50.0 }

[[axes.kinematics.regions]]
kind = "fixed"
lower = 40.0
upper = 60.0
passable_when_lifted = true

[[axes.kinematics.regions]]
kind = "fixed"
lower = -100.0
upper = -80.0
"#;

const BEAMSTOP: &str = r#"
[shared]
service_name = "detector-arm"

[[actuators]]
name = "arm"
limits = [-360.0, 360.0]
precision = 0.01

[[actuators]]
name = "bstop"
limits = [-180.0, 180.0]
precision = 0.01

[[axes]]
name = "delta"
unit = "deg"
members = { rotation = "arm" }

[axes.kinematics]
type = "obstacle"
period = 360.0

[[axes.kinematics.regions]]
kind = "shadow"
source = "bstop"
offset = 180.0
half_width = 10.0
"#;

const SHADOWED_LIFT: &str = r#"
[shared]
service_name = "table"

[[actuators]]
name = "rot"
limits = [-180.0, 180.0]
precision = 0.01

[[actuators]]
name = "lift"
limits = [0.0, 100.0]
precision = 0.1

[[actuators]]
name = "bstop"
limits = [-180.0, 180.0]
precision = 0.01
params = { initial = 45.0 }

[[axes]]
name = "srot"
members = { rotation = "rot", lift = "lift" }

[axes.kinematics]
type = "obstacle"
lift = { safe_position = 50.0 }

[[axes.kinematics.regions]]
kind = "shadow"
source = "bstop"
half_width = 10.0
passable_when_lifted = true
"#;

#[test]
fn lift_detour_raises_rotates_and_lowers() {
    let clock = SimClock::manual();
    let ctx = context(LIFTED, &clock);
    let handle = ctx.axis("srot").unwrap();
    let mut srot = handle.lock();

    srot.start(100.0).unwrap();
    // Raise dispatched first; the rotation waits for it.
    assert_eq!(position(&ctx, "lift"), 50.0);
    assert_eq!(position(&ctx, "rot"), 0.0);

    assert_eq!(srot.poll().unwrap(), MoveState::Dispatched);
    assert_eq!(position(&ctx, "rot"), 100.0);
    assert_eq!(position(&ctx, "lift"), 50.0);

    assert_eq!(srot.poll().unwrap(), MoveState::Dispatched);
    assert_eq!(position(&ctx, "lift"), 0.0);

    assert_eq!(srot.poll().unwrap(), MoveState::Verified);
    assert_eq!(srot.read().unwrap(), 100.0);
}

#[test]
fn blocked_route_is_rejected_before_anything_moves() {
    let clock = SimClock::manual();
    let ctx = context(LIFTED, &clock);
    let handle = ctx.axis("srot").unwrap();
    let mut srot = handle.lock();

    assert!(matches!(srot.start(-120.0), Err(AxisError::NoRoute(_))));
    assert!(matches!(srot.start(50.0), Err(AxisError::NoRoute(_))));
    assert!(matches!(srot.start(200.0), Err(AxisError::OutOfRange(_))));
    assert_eq!(srot.state(), MoveState::Idle);
    assert!(ctx.actuator("rot").unwrap().target().is_none());
    assert!(ctx.actuator("lift").unwrap().target().is_none());
}

#[test]
fn beamstop_shadow_picks_the_other_way_round() {
    let clock = SimClock::manual();
    let ctx = context(BEAMSTOP, &clock);
    let handle = ctx.axis("delta").unwrap();

    // Beamstop at 0 shadows [170, 190]; 200 is reached going backwards.
    {
        let mut delta = handle.lock();
        delta.start(200.0).unwrap();
        assert_eq!(settle(&mut delta, 3).unwrap(), MoveState::Verified);
        assert_eq!(position(&ctx, "arm"), -160.0);
        assert_eq!(delta.read().unwrap(), 200.0);
    }

    // Beamstop at 90 shadows [260, 280], i.e. [-100, -80] on this turn, so
    // 100 is reached by winding back to -260.
    ctx.actuator("bstop").unwrap().start(90.0).unwrap();
    let mut delta = handle.lock();
    delta.start(100.0).unwrap();
    assert_eq!(settle(&mut delta, 3).unwrap(), MoveState::Verified);
    assert_eq!(position(&ctx, "arm"), -260.0);
    assert_eq!(delta.read().unwrap(), 100.0);
    assert!(matches!(delta.start(270.0), Err(AxisError::NoRoute(_))));
}

#[test]
fn shadow_moving_mid_sequence_aborts_the_route() {
    let clock = SimClock::manual();
    let ctx = context(SHADOWED_LIFT, &clock);
    let handle = ctx.axis("srot").unwrap();
    let mut srot = handle.lock();

    // Beamstop at 45: [35, 55] is crossed with the lift raised.
    srot.start(100.0).unwrap();
    assert_eq!(position(&ctx, "lift"), 50.0);

    // The beamstop swings onto the rotation target before it is dispatched.
    ctx.actuator("bstop").unwrap().start(100.0).unwrap();
    let err = srot.poll().unwrap_err();
    assert!(matches!(err, AxisError::SequencingConflict(_)));
    assert!(err.is_retryable());
    assert_eq!(srot.state(), MoveState::Idle);
    assert!(srot.faults().contains(FaultFlags::SEQUENCING_CONFLICT));
    assert_eq!(position(&ctx, "rot"), 0.0);
}
