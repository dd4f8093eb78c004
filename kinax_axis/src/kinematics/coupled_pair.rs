//! Coupled-pair transform: double-crystal monochromator.
//!
//! Bragg's law `λ = 2 d sin θ` gives one tilt applied to both crystals; the
//! second crystal's translation follows from the flight-path geometry,
//! `translation = distance / tan 2θ`.

use super::{Kinematics, LiveState, is_positive};
use crate::plan::{ActuatorPlan, LogicalTarget, WaypointSequence};
use kinax_common::axis::error::AxisError;
use kinax_common::config::ConfigError;
use serde::{Deserialize, Serialize};

pub const ROLES: [&str; 3] = ["crystal1", "crystal2", "translation"];

const CRYSTAL1: usize = 0;
const CRYSTAL2: usize = 1;
const TRANSLATION: usize = 2;

fn default_theta_range() -> [f64; 2] {
    [1.0, 44.0]
}

/// Monochromator calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonochromatorCalibration {
    /// Lattice spacing in Å.
    pub d_spacing: f64,
    /// Inter-crystal flight-path distance, in translation units.
    pub distance: f64,
    /// Declared Bragg-angle range in degrees.
    #[serde(default = "default_theta_range")]
    pub theta_range: [f64; 2],
}

impl MonochromatorCalibration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_positive(self.d_spacing) || !is_positive(self.distance) {
            return Err(ConfigError::ValidationError(
                "d_spacing and distance must be positive".to_string(),
            ));
        }
        let [lo, hi] = self.theta_range;
        // 2θ must stay below 90° for the translation to remain positive.
        if !(lo > 0.0 && lo < hi && hi < 45.0) {
            return Err(ConfigError::ValidationError(format!(
                "theta_range [{lo}, {hi}] must lie inside (0, 45)"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DoubleMonochromator {
    cal: MonochromatorCalibration,
}

impl DoubleMonochromator {
    pub fn new(cal: MonochromatorCalibration) -> Result<Self, ConfigError> {
        cal.validate()?;
        Ok(Self { cal })
    }

    /// Bragg angle in degrees for `wavelength`, range-checked.
    pub fn theta(&self, wavelength: f64) -> Result<f64, AxisError> {
        let ratio = wavelength / (2.0 * self.cal.d_spacing);
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(AxisError::OutOfRange(format!(
                "wavelength {wavelength} not reachable with d = {}",
                self.cal.d_spacing
            )));
        }
        let theta = ratio.asin().to_degrees();
        let [lo, hi] = self.cal.theta_range;
        if theta < lo || theta > hi {
            return Err(AxisError::OutOfRange(format!(
                "theta {theta:.4} for wavelength {wavelength} outside [{lo}, {hi}]"
            )));
        }
        Ok(theta)
    }

    pub fn translation(&self, theta: f64) -> f64 {
        self.cal.distance / (2.0 * theta).to_radians().tan()
    }

    pub fn wavelength(&self, theta: f64) -> f64 {
        2.0 * self.cal.d_spacing * theta.to_radians().sin()
    }

    /// |d translation / dθ| per degree of tilt.
    fn translation_slope(&self, theta: f64) -> f64 {
        let two_theta = (2.0 * theta).to_radians();
        (2.0 * self.cal.distance / two_theta.sin().powi(2)).to_radians()
    }

    fn tilt_precision(&self, live: &LiveState<'_>) -> f64 {
        live.precision(CRYSTAL1).max(live.precision(CRYSTAL2))
    }
}

impl Kinematics for DoubleMonochromator {
    fn kind(&self) -> &'static str {
        "double_monochromator"
    }

    fn roles(&self) -> &[&'static str] {
        &ROLES
    }

    fn forward(&self, target: f64, live: &LiveState<'_>) -> Result<WaypointSequence, AxisError> {
        let theta = self.theta(target)?;
        let mut plan = ActuatorPlan::new();
        plan.set(CRYSTAL1, theta, live.precision(CRYSTAL1))?
            .set(CRYSTAL2, theta, live.precision(CRYSTAL2))?
            .set(TRANSLATION, self.translation(theta), live.precision(TRANSLATION))?;
        let logical = LogicalTarget {
            value: target,
            tolerance: self.tolerance(target, live),
        };
        Ok(WaypointSequence::single(logical, plan))
    }

    fn inverse(&self, live: &LiveState<'_>) -> Result<f64, AxisError> {
        let t1 = live.position(CRYSTAL1)?;
        let t2 = live.position(CRYSTAL2)?;
        let trans = live.position(TRANSLATION)?;

        // Each crystal may sit anywhere inside its own window.
        let tilt_tol = live.precision(CRYSTAL1) + live.precision(CRYSTAL2);
        if (t1 - t2).abs() > tilt_tol {
            return Err(AxisError::PositionInconsistency(format!(
                "crystal tilts disagree: {t1:.4} vs {t2:.4}"
            )));
        }
        let theta = 0.5 * (t1 + t2);
        if !(theta > 0.0 && theta < 45.0) {
            return Err(AxisError::PositionInconsistency(format!(
                "crystal tilt {theta:.4} gives no finite translation"
            )));
        }
        let expected = self.translation(theta);
        let slack = self.translation_slope(theta) * self.tilt_precision(live);
        let trans_tol = live.precision(TRANSLATION) + slack;
        if (trans - expected).abs() > trans_tol {
            return Err(AxisError::PositionInconsistency(format!(
                "translation {trans:.4} does not match {expected:.4} for theta {theta:.4}"
            )));
        }
        Ok(self.wavelength(theta))
    }

    /// Mean tilt only: after a stop the crystals and the translation may sit
    /// at unequal fractions of their travel.
    fn recover(&self, live: &LiveState<'_>) -> Result<f64, AxisError> {
        let theta = 0.5 * (live.position(CRYSTAL1)? + live.position(CRYSTAL2)?);
        if !(theta > 0.0 && theta < 90.0) {
            return Err(AxisError::PositionInconsistency(format!(
                "mean crystal tilt {theta:.4} gives no wavelength"
            )));
        }
        Ok(self.wavelength(theta))
    }

    /// dλ = 2 d cos θ dθ, with dθ the coarser crystal precision.
    fn tolerance(&self, target: f64, live: &LiveState<'_>) -> f64 {
        let dtheta = self.tilt_precision(live).to_radians();
        let theta = (target / (2.0 * self.cal.d_spacing)).clamp(-1.0, 1.0).asin();
        (2.0 * self.cal.d_spacing * theta.cos() * dtheta).max(f64::EPSILON)
    }
}
