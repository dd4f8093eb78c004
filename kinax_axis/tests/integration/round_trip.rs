//! Property tests: the inverse transform recovers the forward target from
//! the planned member positions, and a landing anywhere inside each
//! member's precision still verifies.

use kinax_axis::consistency;
use kinax_axis::kinematics::cone::{ConeCalibration, ReferenceReflection};
use kinax_axis::kinematics::coupled_pair::MonochromatorCalibration;
use kinax_axis::kinematics::counter_rotation::CounterRotationCalibration;
use kinax_axis::kinematics::obstacle::{ObstacleCalibration, RegionSpec};
use kinax_axis::kinematics::{
    ConeTransform, CounterRotation, DoubleMonochromator, Kinematics, LiveState, ObstacleAxis,
};
use kinax_axis::plan::WaypointSequence;
use kinax_common::actuator::Limits;
use proptest::prelude::*;

/// Member positions after every waypoint of `sequence` has been reached.
fn landed(sequence: &WaypointSequence, start: &[f64]) -> Vec<f64> {
    let mut positions = start.to_vec();
    for mv in sequence.final_plan().moves() {
        positions[mv.member] = mv.target;
    }
    positions
}

/// Landed positions moved by `fractions` of each member's precision.
fn jittered(positions: &[f64], precisions: &[f64], fractions: &[f64]) -> Vec<f64> {
    positions
        .iter()
        .zip(precisions)
        .zip(fractions)
        .map(|((p, precision), f)| p + f * precision)
        .collect()
}

/// Forward `target`, land every member off by `fractions` of its precision,
/// and run the arrival and logical checks.
fn verify_jittered(
    k: &dyn Kinematics,
    target: f64,
    start: &[f64],
    precisions: &[f64],
    fractions: &[f64],
) -> Result<f64, kinax_common::axis::error::AxisError> {
    let seq = k.forward(target, &LiveState::new(start, precisions))?;
    let positions = jittered(&landed(&seq, start), precisions, fractions);
    let logical = seq.logical().expect("logical target");
    consistency::verify(
        k,
        &seq.final_plan(),
        &logical,
        &LiveState::new(&positions, precisions),
    )
}

fn mono() -> DoubleMonochromator {
    DoubleMonochromator::new(MonochromatorCalibration {
        d_spacing: 3.335,
        distance: 100.0,
        theta_range: [1.0, 44.0],
    })
    .unwrap()
}

fn cone() -> ConeTransform {
    let a = 5.3312;
    ConeTransform::new(ConeCalibration {
        wavelength: 1.0,
        ub: Some([[1.0 / a, 0.0, 0.0], [0.0, 1.0 / a, 0.0], [0.0, 0.0, 1.0 / a]]),
        cell: None,
        reference: ReferenceReflection {
            hkl: [1.0, 0.0, 0.0],
            angles: [5.38154, 10.7631, 180.0, 171.928],
        },
        target_hkl: [1.0, 1.0, 0.0],
        tolerance: 0.01,
    })
    .unwrap()
}

proptest! {
    #[test]
    fn counter_rotation_round_trip(
        offset in -5.0f64..5.0,
        slave_offset in -2.0f64..2.0,
        target in -90.0f64..90.0,
    ) {
        let mut k = CounterRotation::new(CounterRotationCalibration { slave_offset });
        let precisions = [0.01, 0.01];
        k.reconcile(None, &LiveState::new(&[offset + slave_offset, 0.0], &precisions));
        let live = LiveState::new(&[0.0, 0.0], &precisions);
        let seq = k.forward(target, &live).unwrap();
        let positions = landed(&seq, &[0.0, 0.0]);
        let back = k.inverse(&LiveState::new(&positions, &precisions)).unwrap();
        prop_assert!((back - target).abs() < 1e-9);
    }

    #[test]
    fn monochromator_round_trip(wavelength in 0.2f64..4.5) {
        let k = mono();
        let precisions = [0.001, 0.001, 0.001];
        let live = LiveState::new(&[0.0; 3], &precisions);
        let seq = k.forward(wavelength, &live).unwrap();
        let positions = landed(&seq, &[0.0; 3]);
        let back = k.inverse(&LiveState::new(&positions, &precisions)).unwrap();
        prop_assert!((back - wavelength).abs() < 1e-9);
    }

    #[test]
    fn monochromator_verifies_inside_member_precision(
        wavelength in 0.2f64..4.5,
        fractions in prop::array::uniform3(-0.95f64..0.95),
    ) {
        let value = verify_jittered(&mono(), wavelength, &[0.0; 3], &[0.001; 3], &fractions);
        prop_assert!(value.is_ok(), "{value:?}");
    }

    #[test]
    fn counter_rotation_verifies_inside_member_precision(
        target in -90.0f64..90.0,
        fractions in prop::array::uniform2(-0.95f64..0.95),
    ) {
        let k = CounterRotation::new(CounterRotationCalibration::default());
        let value = verify_jittered(&k, target, &[0.0; 2], &[0.01; 2], &fractions);
        prop_assert!(value.is_ok(), "{value:?}");
    }

    #[test]
    fn cone_round_trip(psi in 0.0f64..360.0) {
        let k = cone();
        let precisions = [0.001; 4];
        let seq = k.forward(psi, &LiveState::new(&[0.0; 4], &precisions)).unwrap();
        let positions = landed(&seq, &[0.0; 4]);
        let back = k.inverse(&LiveState::new(&positions, &precisions)).unwrap();
        prop_assert!(k.distance(back, psi) < 1e-6);
    }

    #[test]
    fn cone_verifies_inside_member_precision(
        psi in 0.0f64..360.0,
        fractions in prop::array::uniform4(-0.95f64..0.95),
    ) {
        let value = verify_jittered(&cone(), psi, &[0.0; 4], &[0.001; 4], &fractions);
        prop_assert!(value.is_ok(), "{value:?}");
    }

    #[test]
    fn obstacle_route_avoids_fixed_region(target in -180.0f64..180.0) {
        let k = ObstacleAxis::new(
            ObstacleCalibration {
                period: Some(360.0),
                lift: None,
                regions: vec![RegionSpec::Fixed {
                    lower: 100.0,
                    upper: 120.0,
                    passable_when_lifted: false,
                }],
            },
            Limits::new(-360.0, 360.0),
        )
        .unwrap();
        prop_assume!(!(100.0..=120.0).contains(&target));
        let precisions = [0.01];
        let live = LiveState::new(&[0.0], &precisions);
        let seq = k.forward(target, &live).unwrap();
        let positions = landed(&seq, &[0.0]);
        let back = k.inverse(&LiveState::new(&positions, &precisions)).unwrap();
        prop_assert!(k.distance(back, target) < 1e-9);
        // The rotation never passes 100..120 on any turn.
        let end = positions[0];
        let (lo, hi) = (end.min(0.0), end.max(0.0));
        prop_assert!(!(lo <= 120.0 && hi >= 100.0));
        prop_assert!(!(lo <= -240.0 && hi >= -260.0));
    }
}
