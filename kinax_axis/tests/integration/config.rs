//! Integration test: loading instrument files and building devices.

use kinax_axis::config::{KinematicsConfig, load_config};
use kinax_axis::context::{ContextError, DeviceContext};
use kinax_axis::recovery::MemoryStore;
use kinax_common::axis::state::MoveState;
use kinax_common::channel::TracingChannel;
use kinax_common::config::ConfigError;
use kinax_hal::{DriverRegistry, SimClock};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

fn bundled() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("config/instrument.toml")
}

fn build(path: &Path) -> Result<DeviceContext, ContextError> {
    let config = load_config(path)?;
    let registry = DriverRegistry::with_simulation(SimClock::manual());
    DeviceContext::build(
        &config,
        &registry,
        Arc::new(TracingChannel),
        Arc::new(MemoryStore::new()),
    )
}

#[test]
fn bundled_configuration_builds() {
    let config = load_config(&bundled()).unwrap();
    assert_eq!(config.shared.service_name, "diffractometer-01");
    assert_eq!(config.axes.len(), 4);
    assert_eq!(config.interlocks.len(), 2);
    assert!(matches!(
        config.axis("srot").unwrap().kinematics,
        KinematicsConfig::Obstacle(_)
    ));

    let ctx = build(&bundled()).unwrap();
    assert_eq!(
        ctx.axis_names().collect::<Vec<_>>(),
        vec!["wavelength", "tth", "psi", "srot"]
    );
    let tth = ctx.axis("tth").unwrap();
    assert_eq!(tth.lock().state(), MoveState::Idle);
    assert_eq!(tth.lock().read().unwrap(), 0.0);
}

#[test]
fn file_on_disk_round_trips_through_loader() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[shared]
service_name = "tmp"

[supervisor]
poll_interval_ms = 10

[[actuators]]
name = "r"
limits = [-10.0, 10.0]
precision = 0.01

[[axes]]
name = "rot"
members = {{ rotation = "r" }}
kinematics = {{ type = "obstacle" }}
"#
    )
    .unwrap();

    let ctx = build(file.path()).unwrap();
    let handle = ctx.axis("rot").unwrap();
    let mut rot = handle.lock();
    rot.start(5.0).unwrap();
    assert_eq!(rot.poll().unwrap(), MoveState::Verified);
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        load_config(&dir.path().join("absent.toml")).unwrap_err(),
        ConfigError::FileNotFound
    );
}

#[test]
fn invalid_calibration_is_rejected_by_the_loader() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[shared]
service_name = "bad"

[[actuators]]
name = "a"
limits = [0.0, 90.0]
precision = 0.001

[[actuators]]
name = "b"
limits = [0.0, 90.0]
precision = 0.001

[[actuators]]
name = "t"
limits = [0.0, 90.0]
precision = 0.001

[[axes]]
name = "wl"
members = {{ crystal1 = "a", crystal2 = "b", translation = "t" }}
kinematics = {{ type = "double_monochromator", d_spacing = -1.0, distance = 100.0 }}
"#
    )
    .unwrap();
    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::ValidationError(_))
    ));
}
