//! Integration test: interlocks between devices.
//!
//! A denied move must leave every member untouched, and rules on member
//! actuators apply to the waypoints an axis plans for them.

use super::{context, settle};
use kinax_common::axis::error::AxisError;
use kinax_common::axis::state::MoveState;
use kinax_hal::SimClock;

const DOC: &str = r#"
[shared]
service_name = "beamline"

[[actuators]]
name = "ma"
limits = [-180.0, 180.0]
precision = 0.01

[[actuators]]
name = "mb"
limits = [-180.0, 180.0]
precision = 0.01

[[actuators]]
name = "shutter"
limits = [0.0, 1.0]
precision = 0.1

[[actuators]]
name = "table"
limits = [0.0, 100.0]
precision = 0.01
params = { initial = 10.0 }

[[axes]]
name = "tth"
members = { master = "ma", slave = "mb" }
kinematics = { type = "counter_rotation" }

# No moves while the shutter is closed.
[[interlocks]]
name = "shutter-closed"
dependent = "tth"
controller = "shutter"
condition = { when = "value_within", lower = -0.5, upper = 0.5 }

# The slave may not go below -90 while the table is low.
[[interlocks]]
name = "table-low"
dependent = "mb"
controller = "table"
condition = { when = "value_within", lower = 0.0, upper = 20.0 }
target_range = [-180.0, -90.0]
"#;

#[test]
fn denied_move_issues_no_commands() {
    let clock = SimClock::manual();
    let ctx = context(DOC, &clock);
    let handle = ctx.axis("tth").unwrap();
    let mut tth = handle.lock();

    let err = tth.start(10.0).unwrap_err();
    assert!(matches!(err, AxisError::InterlockDenied(_)));
    assert!(err.to_string().contains("shutter-closed"), "{err}");
    assert_eq!(tth.state(), MoveState::Idle);
    assert!(tth.faults().is_empty());
    assert!(ctx.actuator("ma").unwrap().target().is_none());
    assert!(ctx.actuator("mb").unwrap().target().is_none());
    assert!(ctx.actuator("shutter").unwrap().target().is_none());
}

#[test]
fn opening_the_controller_allows_the_move() {
    let clock = SimClock::manual();
    let ctx = context(DOC, &clock);
    ctx.actuator("shutter").unwrap().start(1.0).unwrap();

    let handle = ctx.axis("tth").unwrap();
    let mut tth = handle.lock();
    tth.start(10.0).unwrap();
    assert_eq!(settle(&mut tth, 3).unwrap(), MoveState::Verified);
}

#[test]
fn member_rule_applies_to_planned_waypoint() {
    let clock = SimClock::manual();
    let ctx = context(DOC, &clock);
    ctx.actuator("shutter").unwrap().start(1.0).unwrap();
    let handle = ctx.axis("tth").unwrap();
    let mut tth = handle.lock();

    // Slave target -100 falls in the restricted range.
    assert!(matches!(tth.start(100.0), Err(AxisError::InterlockDenied(_))));
    assert!(ctx.actuator("ma").unwrap().target().is_none());

    // Slave target -50 does not.
    tth.start(50.0).unwrap();
    assert_eq!(settle(&mut tth, 3).unwrap(), MoveState::Verified);

    // Raising the table lifts the restriction.
    drop(tth);
    ctx.actuator("table").unwrap().start(50.0).unwrap();
    let mut tth = handle.lock();
    tth.start(100.0).unwrap();
    assert_eq!(settle(&mut tth, 3).unwrap(), MoveState::Verified);
}

#[test]
fn jogging_a_member_is_checked_against_its_rules() {
    let clock = SimClock::manual();
    let ctx = context(DOC, &clock);
    let handle = ctx.axis("tth").unwrap();
    let mut tth = handle.lock();

    // Jogs have no logical target, so only member rules apply.
    assert!(matches!(
        tth.move_member("slave", -120.0),
        Err(AxisError::InterlockDenied(_))
    ));
    tth.move_member("slave", -10.0).unwrap();
    assert_eq!(settle(&mut tth, 3).unwrap(), MoveState::Idle);
}
