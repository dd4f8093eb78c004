//! Integration test: double-crystal monochromator axis.
//!
//! Validates wavelength moves, limit rejection, detection of a desynchronised
//! crystal and the jog path.

use super::{context, position, settle, shared, sim_motor};
use kinax_axis::axis::{AxisEnv, AxisOptions, AxisParts, LogicalAxis};
use kinax_axis::kinematics::DoubleMonochromator;
use kinax_axis::kinematics::coupled_pair::MonochromatorCalibration;
use kinax_common::axis::error::{AxisError, FaultFlags};
use kinax_common::axis::state::MoveState;
use kinax_hal::{SimClock, SimMotor};
use std::sync::Arc;

const MONO: &str = r#"
[shared]
service_name = "mono"

[[actuators]]
name = "mth1"
unit = "deg"
limits = [0.0, 90.0]
precision = 0.001

[[actuators]]
name = "mth2"
unit = "deg"
limits = [0.0, 90.0]
precision = 0.001

[[actuators]]
name = "mtx"
unit = "mm"
limits = [-100.0, 500.0]
precision = 0.001

[[axes]]
name = "wavelength"
unit = "A"
members = { crystal1 = "mth1", crystal2 = "mth2", translation = "mtx" }

[axes.kinematics]
type = "double_monochromator"
d_spacing = 3.335
distance = 100.0
"#;

// ── Helpers ─────────────────────────────────────────────────────────

struct Mono {
    axis: LogicalAxis,
    th1: Arc<SimMotor>,
    th2: Arc<SimMotor>,
    tx: Arc<SimMotor>,
}

fn mono() -> Mono {
    let clock = SimClock::manual();
    let kinematics = DoubleMonochromator::new(MonochromatorCalibration {
        d_spacing: 3.335,
        distance: 100.0,
        theta_range: [1.0, 44.0],
    })
    .unwrap();
    // Start on a consistent setting.
    let th1 = sim_motor("mth1", [0.0, 90.0], 0.001, 20.0, None, &clock);
    let th2 = sim_motor("mth2", [0.0, 90.0], 0.001, 20.0, None, &clock);
    let tx = sim_motor("mtx", [-100.0, 500.0], 0.001, kinematics.translation(20.0), None, &clock);
    let parts = AxisParts {
        name: "wavelength".into(),
        unit: "A".into(),
        kinematics: Box::new(kinematics),
        members: vec![shared(&th1), shared(&th2), shared(&tx)],
        observed: Vec::new(),
    };
    let axis = LogicalAxis::new(parts, AxisEnv::default(), AxisOptions::default()).unwrap();
    Mono { axis, th1, th2, tx }
}

fn commands(m: &Mono) -> usize {
    m.th1.command_count() + m.th2.command_count() + m.tx.command_count()
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn move_from_config_lands_on_bragg_angle() {
    let clock = SimClock::manual();
    let ctx = context(MONO, &clock);
    let handle = ctx.axis("wavelength").unwrap();
    let mut axis = handle.lock();

    // Crystals at 0 give no finite translation.
    assert_eq!(axis.state(), MoveState::Inconsistent);

    axis.start(2.55).unwrap();
    assert_eq!(settle(&mut axis, 5).unwrap(), MoveState::Verified);
    assert!((position(&ctx, "mth1") - 22.4768).abs() < 1e-3);
    assert_eq!(position(&ctx, "mth1"), position(&ctx, "mth2"));
    assert!((position(&ctx, "mtx") - 100.1623).abs() < 1e-3);
    assert!((axis.read().unwrap() - 2.55).abs() < 1e-9);
    assert!(axis.faults().is_empty());
}

#[test]
fn unreachable_wavelength_issues_no_commands() {
    let mut m = mono();
    assert!(matches!(m.axis.start(7.0), Err(AxisError::OutOfRange(_))));
    assert!(matches!(m.axis.start(0.1), Err(AxisError::OutOfRange(_))));
    assert_eq!(commands(&m), 0);
    assert!(m.axis.faults().is_empty());
}

#[test]
fn desynchronised_crystal_is_detected_and_latched() {
    let mut m = mono();
    m.axis.start(4.33).unwrap();
    assert_eq!(settle(&mut m.axis, 5).unwrap(), MoveState::Verified);
    assert!((m.th2.position_now() - 40.4795).abs() < 1e-3);
    assert!((m.tx.position_now() - 15.9119).abs() < 1e-3);

    // Someone moves crystal 1 behind the axis' back.
    m.th1.force_position(42.0);
    assert!(matches!(
        m.axis.verify(),
        Err(AxisError::PositionInconsistency(_))
    ));
    assert_eq!(m.axis.state(), MoveState::Inconsistent);
    assert!(m.axis.faults().contains(FaultFlags::POSITION_INCONSISTENT));

    // Latched: no jogging, no further verification.
    let before = commands(&m);
    assert!(matches!(
        m.axis.move_member("translation", 20.0),
        Err(AxisError::PositionInconsistency(_))
    ));
    assert!(matches!(
        m.axis.move_member("crystal1", 40.0),
        Err(AxisError::PositionInconsistency(_))
    ));
    assert_eq!(commands(&m), before);
    assert!(m.axis.verify().is_err());

    // A fresh plan is the way out.
    m.axis.start(4.33).unwrap();
    assert_eq!(settle(&mut m.axis, 5).unwrap(), MoveState::Verified);
    assert!(m.axis.faults().is_empty());
}

#[test]
fn jog_breaking_the_relation_latches_inconsistent() {
    let mut m = mono();
    m.axis.start(3.0).unwrap();
    settle(&mut m.axis, 5).unwrap();

    let tx = m.tx.position_now();
    m.axis.move_member("translation", tx + 5.0).unwrap();
    assert!(matches!(
        settle(&mut m.axis, 5),
        Err(AxisError::PositionInconsistency(_))
    ));
    assert_eq!(m.axis.state(), MoveState::Inconsistent);
    assert_eq!(m.tx.position_now(), tx + 5.0);

    m.axis.acknowledge().unwrap();
    assert_eq!(m.axis.state(), MoveState::Idle);
}

#[test]
fn jog_keeping_the_relation_releases_to_idle() {
    let mut m = mono();
    m.axis.start(3.0).unwrap();
    settle(&mut m.axis, 5).unwrap();

    let tx = m.tx.position_now();
    m.axis.move_member("translation", tx + 0.0005).unwrap();
    assert_eq!(settle(&mut m.axis, 5).unwrap(), MoveState::Idle);
    assert!((m.axis.status().value.unwrap() - 3.0).abs() < 1e-6);
}
