//! Kinematic transforms between a logical value and its member actuators.
//!
//! Every transform is a pure function of its inputs and its calibration:
//! identical inputs yield identical plans, which is what makes re-verification
//! after recovery deterministic. Calibration is fixed for the lifetime of an
//! instance; reconfiguring an axis replaces the transform.

pub mod cone;
pub mod counter_rotation;
pub mod coupled_pair;
pub mod obstacle;
pub mod sxtal;

use crate::config::KinematicsConfig;
use crate::plan::{ActuatorPlan, WaypointSequence};
use crate::recovery::RecoveryRecord;
use kinax_common::actuator::ActuatorInfo;
use kinax_common::axis::error::AxisError;
use kinax_common::config::ConfigError;
use std::fmt;

pub use cone::ConeTransform;
pub use counter_rotation::CounterRotation;
pub use coupled_pair::DoubleMonochromator;
pub use obstacle::ObstacleAxis;

/// Live readings handed to a transform.
///
/// `positions` and `precisions` are in the transform's role order;
/// `observed` holds the values of the non-member devices listed by
/// [`Kinematics::observed`].
#[derive(Debug, Clone, Copy)]
pub struct LiveState<'a> {
    pub positions: &'a [f64],
    pub precisions: &'a [f64],
    pub observed: &'a [f64],
}

impl<'a> LiveState<'a> {
    pub fn new(positions: &'a [f64], precisions: &'a [f64]) -> Self {
        Self {
            positions,
            precisions,
            observed: &[],
        }
    }

    pub fn with_observed(mut self, observed: &'a [f64]) -> Self {
        self.observed = observed;
        self
    }

    /// Position of member `index`, or an inconsistency if it was not read.
    pub fn position(&self, index: usize) -> Result<f64, AxisError> {
        self.positions.get(index).copied().ok_or_else(|| {
            AxisError::PositionInconsistency(format!("no reading for member {index}"))
        })
    }

    pub fn precision(&self, index: usize) -> f64 {
        self.precisions.get(index).copied().unwrap_or(0.0)
    }

    pub fn max_precision(&self) -> f64 {
        self.precisions.iter().copied().fold(0.0, f64::max)
    }
}

/// A coordinate transform selected once per axis at construction.
pub trait Kinematics: Send + Sync + fmt::Debug {
    /// Short type name for logs and status.
    fn kind(&self) -> &'static str;

    /// Member roles, in the order positions are passed to the transform.
    fn roles(&self) -> &[&'static str];

    /// Non-member devices whose live value the transform depends on.
    fn observed(&self) -> &[String] {
        &[]
    }

    /// Logical target to waypoints.
    ///
    /// # Errors
    /// `OutOfRange` when the solution leaves a declared range, `NoRoute` when
    /// no legal sequence exists.
    fn forward(&self, target: f64, live: &LiveState<'_>) -> Result<WaypointSequence, AxisError>;

    /// Readings to logical value.
    ///
    /// # Errors
    /// `PositionInconsistency` when the members disagree with each other.
    fn inverse(&self, live: &LiveState<'_>) -> Result<f64, AxisError>;

    /// Best estimate of the logical value after an interrupted move, when
    /// members may have stopped at unequal fractions of their travel.
    ///
    /// # Errors
    /// `PositionInconsistency` when no estimate can be formed.
    fn recover(&self, live: &LiveState<'_>) -> Result<f64, AxisError> {
        self.inverse(live)
    }

    /// Logical acceptance tolerance at `target`.
    fn tolerance(&self, _target: f64, live: &LiveState<'_>) -> f64 {
        live.max_precision()
    }

    /// Distance between two logical values.
    fn distance(&self, a: f64, b: f64) -> f64 {
        (a - b).abs()
    }

    /// Re-check a waypoint against live state just before it is dispatched.
    ///
    /// # Errors
    /// `SequencingConflict` when the waypoint is no longer legal.
    fn revalidate(&self, _waypoint: &ActuatorPlan, _live: &LiveState<'_>) -> Result<(), AxisError> {
        Ok(())
    }

    /// Adopt persisted state, or capture it from the current readings.
    fn reconcile(&mut self, _stored: Option<&RecoveryRecord>, _live: &LiveState<'_>) {}

    /// Offset captured by [`Kinematics::reconcile`], persisted with the axis.
    fn applied_offset(&self) -> f64 {
        0.0
    }
}

/// Build the transform described by `config`.
///
/// `members` holds the metadata of the member actuators in
/// [`KinematicsConfig::roles`] order.
pub fn build(
    config: &KinematicsConfig,
    members: &[&ActuatorInfo],
) -> Result<Box<dyn Kinematics>, ConfigError> {
    let roles = config.roles();
    if members.len() != roles.len() {
        return Err(ConfigError::ValidationError(format!(
            "{} expects {} members, got {}",
            config.kind(),
            roles.len(),
            members.len()
        )));
    }
    Ok(match config {
        KinematicsConfig::DoubleMonochromator(cal) => {
            Box::new(DoubleMonochromator::new(cal.clone())?)
        }
        KinematicsConfig::CounterRotation(cal) => Box::new(CounterRotation::new(cal.clone())),
        KinematicsConfig::Cone(cal) => Box::new(ConeTransform::new(cal.clone())?),
        KinematicsConfig::Obstacle(cal) => {
            Box::new(ObstacleAxis::new(cal.clone(), members[0].limits)?)
        }
    })
}

/// Finite and strictly positive.
#[inline]
pub(crate) fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Wrap an angle into `[0, period)`.
#[inline]
pub(crate) fn wrap(value: f64, period: f64) -> f64 {
    let w = value.rem_euclid(period);
    // rem_euclid can round up to exactly `period`
    if w >= period { 0.0 } else { w }
}

/// Shortest distance between two angles of the given period.
#[inline]
pub(crate) fn periodic_distance(a: f64, b: f64, period: f64) -> f64 {
    let d = wrap(a - b, period);
    d.min(period - d)
}
