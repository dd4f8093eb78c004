//! Integration test: counter-rotation axis stop, recalibration and restart.
//!
//! Master and slave run at different speeds, so a stop leaves them out of
//! step; the logical value must still be the midpoint estimate, and the
//! applied offset must survive a restart through the recovery file.

use super::{context_with_store, settle, shared, sim_motor};
use kinax_axis::axis::{AxisEnv, AxisOptions, AxisParts, LogicalAxis};
use kinax_axis::config::KinematicsConfig;
use kinax_axis::kinematics::CounterRotation;
use kinax_axis::kinematics::counter_rotation::CounterRotationCalibration;
use kinax_axis::recovery::{FileStore, MemoryStore, RecoveryStore};
use kinax_common::axis::state::MoveState;
use kinax_common::channel::ChannelValue;
use kinax_hal::{SimClock, SimMotor};
use std::sync::Arc;
use std::time::Duration;

fn axis(
    master: &Arc<SimMotor>,
    slave: &Arc<SimMotor>,
    slave_offset: f64,
    store: Arc<dyn RecoveryStore>,
) -> LogicalAxis {
    let parts = AxisParts {
        name: "tth".into(),
        unit: "deg".into(),
        kinematics: Box::new(CounterRotation::new(CounterRotationCalibration { slave_offset })),
        members: vec![shared(master), shared(slave)],
        observed: Vec::new(),
    };
    let env = AxisEnv {
        store,
        ..AxisEnv::default()
    };
    LogicalAxis::new(parts, env, AxisOptions::default()).unwrap()
}

#[test]
fn stop_reconfigure_and_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.bin");
    let clock = SimClock::manual();
    let master = sim_motor("m", [-180.0, 180.0], 0.01, 0.0, Some(7.0), &clock);
    let slave = sim_motor("s", [-180.0, 180.0], 0.01, 0.0, Some(3.0), &clock);

    let mut tth = axis(&master, &slave, 0.0, Arc::new(FileStore::new(&path)));
    tth.start(10.0).unwrap();
    assert_eq!(tth.poll().unwrap(), MoveState::Arriving);

    clock.advance(Duration::from_secs(1));
    tth.stop().unwrap();
    assert_eq!(master.position_now(), 7.0);
    assert_eq!(slave.position_now(), -3.0);
    assert_eq!(tth.state(), MoveState::Idle);
    assert_eq!(tth.read().unwrap(), 5.0);

    tth.reconfigure(Box::new(CounterRotation::new(CounterRotationCalibration {
        slave_offset: 1.0,
    })))
    .unwrap();
    assert_eq!(tth.kinematics().applied_offset(), 0.0);

    tth.start(7.0).unwrap();
    clock.advance(Duration::from_secs(2));
    assert_eq!(settle(&mut tth, 5).unwrap(), MoveState::Verified);
    assert_eq!(master.position_now(), 8.0);
    assert_eq!(slave.position_now(), -7.0);
    assert_eq!(tth.read().unwrap(), 7.0);
    drop(tth);

    // Restart: same motors, fresh axis, record from disk.
    let restarted = axis(&master, &slave, 1.0, Arc::new(FileStore::new(&path)));
    assert_eq!(restarted.kinematics().applied_offset(), 0.0);
    assert_eq!(restarted.state(), MoveState::Idle);
    assert_eq!(restarted.read().unwrap(), 7.0);
    assert_eq!(restarted.status().value, Some(7.0));
}

#[test]
fn startup_offset_is_captured_without_a_record() {
    let clock = SimClock::manual();
    let master = sim_motor("m", [-180.0, 180.0], 0.01, 3.0, None, &clock);
    let slave = sim_motor("s", [-180.0, 180.0], 0.01, 0.0, None, &clock);
    let store = Arc::new(MemoryStore::new());

    let mut tth = axis(&master, &slave, 0.0, store.clone());
    assert_eq!(tth.kinematics().applied_offset(), 3.0);
    assert_eq!(tth.read().unwrap(), 0.0);

    tth.start(5.0).unwrap();
    assert_eq!(settle(&mut tth, 3).unwrap(), MoveState::Verified);
    assert_eq!(master.position_now(), 8.0);
    assert_eq!(slave.position_now(), -5.0);

    let record = store.load("tth").unwrap().unwrap();
    assert_eq!(record.applied_offset, 3.0);
    assert_eq!(record.reference_positions, vec![8.0, -5.0]);
    assert_eq!(record.target, Some(5.0));
}

#[test]
fn stop_mid_move_from_config_publishes_reconciled_value() {
    const DOC: &str = r#"
[shared]
service_name = "diffractometer"

[[actuators]]
name = "tth_m"
limits = [-180.0, 180.0]
precision = 0.01
params = { speed = 7.0 }

[[actuators]]
name = "tth_s"
limits = [-180.0, 180.0]
precision = 0.01
params = { speed = 3 }

[[axes]]
name = "tth"
unit = "deg"
members = { master = "tth_m", slave = "tth_s" }
kinematics = { type = "counter_rotation" }
"#;
    let clock = SimClock::manual();
    let (ctx, channel) = context_with_store(DOC, &clock, Arc::new(MemoryStore::new()));
    let handle = ctx.axis("tth").unwrap();
    let mut tth = handle.lock();

    tth.start(10.0).unwrap();
    tth.poll().unwrap();
    clock.advance(Duration::from_secs(1));
    tth.stop().unwrap();
    assert_eq!(tth.state(), MoveState::Idle);
    assert_eq!(channel.latest("tth/value"), Some(ChannelValue::Number(5.0)));
    assert_eq!(channel.latest("tth/status"), Some(ChannelValue::Text("ok".into())));
    assert!(
        channel
            .history("tth/status")
            .contains(&ChannelValue::Text("warn".into()))
    );

    drop(tth);

    // Reconfiguring through the context adopts the record written at the stop.
    ctx.reconfigure(
        "tth",
        &KinematicsConfig::CounterRotation(CounterRotationCalibration { slave_offset: 1.0 }),
    )
    .unwrap();
    let tth = handle.lock();
    assert_eq!(tth.kinematics().applied_offset(), 0.0);
    assert_eq!(tth.read().unwrap(), 4.5);
}
