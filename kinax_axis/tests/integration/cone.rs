//! Integration test: cone (azimuthal) axis on a four-circle diffractometer.

use super::{context, position, settle};
use kinax_common::axis::error::AxisError;
use kinax_common::axis::state::MoveState;
use kinax_hal::SimClock;

const CONE: &str = r#"
[shared]
service_name = "fourc"

[[actuators]]
name = "om"
limits = [-180.0, 180.0]
precision = 0.001

[[actuators]]
name = "tth"
limits = [-10.0, 170.0]
precision = 0.001

[[actuators]]
name = "chi"
limits = [0.0, 360.0]
precision = 0.001

[[actuators]]
name = "phi"
limits = [0.0, 360.0]
precision = 0.001

[[axes]]
name = "psi"
unit = "deg"
members = { omega = "om", two_theta = "tth", chi = "chi", phi = "phi" }

[axes.kinematics]
type = "cone"
wavelength = 1.0
cell = [5.3312, 5.3312, 5.3312, 90.0, 90.0, 90.0]
target_hkl = [1.0, 1.0, 0.0]
reference = { hkl = [1.0, 0.0, 0.0], angles = [5.38154, 10.7631, 180.0, 171.928] }
"#;

#[test]
fn cone_moves_follow_the_cone() {
    let clock = SimClock::manual();
    let ctx = context(CONE, &clock);
    let handle = ctx.axis("psi").unwrap();
    let mut psi = handle.lock();

    // All circles at zero are not on the cone.
    assert_eq!(psi.state(), MoveState::Inconsistent);

    psi.start(30.0).unwrap();
    assert_eq!(settle(&mut psi, 5).unwrap(), MoveState::Verified);
    assert!((position(&ctx, "om") - 7.622).abs() < 0.01);
    assert!((position(&ctx, "tth") - 15.244).abs() < 0.01);
    assert!((position(&ctx, "chi") - 142.239).abs() < 0.01);
    assert!((position(&ctx, "phi") - 145.36).abs() < 0.01);
    assert!(psi.kinematics().distance(psi.read().unwrap(), 30.0) < 1e-6);

    psi.start(60.0).unwrap();
    assert_eq!(settle(&mut psi, 5).unwrap(), MoveState::Verified);
    assert!((position(&ctx, "chi") - 159.295).abs() < 0.01);
    assert!((position(&ctx, "phi") - 131.035).abs() < 0.01);
}

#[test]
fn cone_angle_is_wrapped() {
    let clock = SimClock::manual();
    let ctx = context(CONE, &clock);
    let handle = ctx.axis("psi").unwrap();
    let mut psi = handle.lock();

    psi.start(-270.0).unwrap();
    assert_eq!(settle(&mut psi, 5).unwrap(), MoveState::Verified);
    assert_eq!(psi.status().target, Some(90.0));
    assert!((position(&ctx, "phi") - 126.928).abs() < 0.01);
}

#[test]
fn jogging_chi_leaves_the_cone() {
    let clock = SimClock::manual();
    let ctx = context(CONE, &clock);
    let handle = ctx.axis("psi").unwrap();
    let mut psi = handle.lock();

    psi.start(30.0).unwrap();
    settle(&mut psi, 5).unwrap();
    let chi = position(&ctx, "chi");
    psi.move_member("chi", chi + 5.0).unwrap();
    assert!(matches!(
        settle(&mut psi, 5),
        Err(AxisError::PositionInconsistency(_))
    ));
    assert_eq!(psi.state(), MoveState::Inconsistent);
}
