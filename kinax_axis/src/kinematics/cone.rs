//! Cone (azimuthal) transform for a four-circle diffractometer.
//!
//! All reflections at a fixed angle α from a reference reflection lie on a
//! cone around the reference scattering vector ĉ. The logical value ψ selects
//! a position on that cone:
//!
//! ```text
//! v(ψ) = |UB·h| (cos α ĉ + sin α (cos ψ ê₁ + sin ψ ê₂))
//! ```
//!
//! ĉ comes from the reference's measured goniometer angles, ê₁ is the part
//! of the instrument z axis perpendicular to ĉ and ê₂ = ĉ × ê₁. v is then
//! driven into the bisecting position.

use super::sxtal::{self, Mat3, Vec3};
use super::{Kinematics, LiveState, is_positive, periodic_distance, wrap};
use crate::plan::{ActuatorPlan, LogicalTarget, WaypointSequence};
use kinax_common::axis::error::AxisError;
use kinax_common::config::ConfigError;
use serde::{Deserialize, Serialize};

pub const ROLES: [&str; 4] = ["omega", "two_theta", "chi", "phi"];

const OMEGA: usize = 0;
const TWO_THETA: usize = 1;
const CHI: usize = 2;
const PHI: usize = 3;

fn default_tolerance() -> f64 {
    0.01
}

/// Reference reflection with its measured setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceReflection {
    pub hkl: [f64; 3],
    /// `[omega, two_theta, chi, phi]` in degrees.
    pub angles: [f64; 4],
}

/// Cone calibration. Exactly one of `ub` and `cell` must be given; a cell
/// alone implies an identity U matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConeCalibration {
    /// Wavelength in Å.
    pub wavelength: f64,
    /// Orientation matrix, rows.
    #[serde(default)]
    pub ub: Option<[[f64; 3]; 3]>,
    /// `[a, b, c, alpha, beta, gamma]`.
    #[serde(default)]
    pub cell: Option<[f64; 6]>,
    pub reference: ReferenceReflection,
    pub target_hkl: [f64; 3],
    /// Angular acceptance in degrees.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl ConeCalibration {
    fn orientation(&self) -> Result<Mat3, ConfigError> {
        match (&self.ub, &self.cell) {
            (Some(rows), None) => Ok(Mat3::from_fn(|i, j| rows[i][j])),
            (None, Some(cell)) => sxtal::b_matrix(*cell).ok_or_else(|| {
                ConfigError::ValidationError(format!("degenerate unit cell {cell:?}"))
            }),
            _ => Err(ConfigError::ValidationError(
                "cone calibration needs exactly one of `ub` or `cell`".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConeTransform {
    cal: ConeCalibration,
    /// Reference scattering direction.
    axis: Vec3,
    e1: Vec3,
    e2: Vec3,
    /// Opening angle of the cone, radians.
    alpha: f64,
    /// |UB·h| of the target reflection.
    length: f64,
}

impl ConeTransform {
    pub fn new(cal: ConeCalibration) -> Result<Self, ConfigError> {
        if !is_positive(cal.wavelength) || !is_positive(cal.tolerance) {
            return Err(ConfigError::ValidationError(
                "cone wavelength and tolerance must be positive".to_string(),
            ));
        }
        let ub = cal.orientation()?;
        let h_ref = ub * Vec3::from(cal.reference.hkl);
        let h_tgt = ub * Vec3::from(cal.target_hkl);
        if h_ref.norm() == 0.0 || h_tgt.norm() == 0.0 {
            return Err(ConfigError::ValidationError(
                "reference and target reflections must be non-zero".to_string(),
            ));
        }
        let alpha = sxtal::angle_between(&h_ref, &h_tgt);
        if alpha.sin().abs() < 1e-9 {
            return Err(ConfigError::ValidationError(
                "target is parallel to the reference; the cone is degenerate".to_string(),
            ));
        }
        let length = h_tgt.norm();
        if 0.5 * cal.wavelength * length > 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "target {:?} not reachable at wavelength {}",
                cal.target_hkl, cal.wavelength
            )));
        }

        let [om, tth, chi, phi] = cal.reference.angles;
        let axis = sxtal::z1_from_angles(cal.wavelength, tth, om, chi, phi);
        let axis = axis.try_normalize(1e-12).ok_or_else(|| {
            ConfigError::ValidationError("reference two_theta must be non-zero".to_string())
        })?;

        let lab_z = Vec3::z();
        let e1 = (lab_z - axis * lab_z.dot(&axis))
            .try_normalize(1e-9)
            .or_else(|| (Vec3::x() - axis * axis.x).try_normalize(1e-9))
            .ok_or_else(|| ConfigError::ValidationError("cone frame undefined".to_string()))?;
        let e2 = axis.cross(&e1);

        Ok(Self {
            cal,
            axis,
            e1,
            e2,
            alpha,
            length,
        })
    }

    /// Scattering vector at cone angle `psi` (degrees).
    pub fn vector(&self, psi: f64) -> Vec3 {
        let (sp, cp) = psi.to_radians().sin_cos();
        let (sa, ca) = self.alpha.sin_cos();
        (self.axis * ca + (self.e1 * cp + self.e2 * sp) * sa) * self.length
    }

    /// Bisecting setting for cone angle `psi`.
    pub fn setting(&self, psi: f64) -> Result<sxtal::Bisecting, AxisError> {
        sxtal::z1_to_bisecting(self.cal.wavelength, &self.vector(psi))
    }

    fn angular_tolerance(&self, live: &LiveState<'_>) -> f64 {
        self.cal.tolerance.max(2.0 * live.max_precision())
    }
}

impl Kinematics for ConeTransform {
    fn kind(&self) -> &'static str {
        "cone"
    }

    fn roles(&self) -> &[&'static str] {
        &ROLES
    }

    fn forward(&self, target: f64, live: &LiveState<'_>) -> Result<WaypointSequence, AxisError> {
        if !target.is_finite() {
            return Err(AxisError::OutOfRange(format!("cone angle {target}")));
        }
        let psi = wrap(target, 360.0);
        let setting = self.setting(psi)?;
        let mut plan = ActuatorPlan::new();
        for (index, value) in setting.as_array().into_iter().enumerate() {
            plan.set(index, value, live.precision(index))?;
        }
        let logical = LogicalTarget {
            value: psi,
            tolerance: self.tolerance(psi, live),
        };
        Ok(WaypointSequence::single(logical, plan))
    }

    fn inverse(&self, live: &LiveState<'_>) -> Result<f64, AxisError> {
        let tth = live.position(TWO_THETA)?;
        let v = sxtal::z1_from_angles(
            self.cal.wavelength,
            tth,
            live.position(OMEGA)?,
            live.position(CHI)?,
            live.position(PHI)?,
        );
        let tol = self.angular_tolerance(live);

        let expected_tth = 2.0 * (0.5 * self.cal.wavelength * self.length).asin().to_degrees();
        if (tth - expected_tth).abs() > tol {
            return Err(AxisError::PositionInconsistency(format!(
                "two_theta {tth:.4} does not match target reflection ({expected_tth:.4})"
            )));
        }
        let opening = sxtal::angle_between(&v, &self.axis);
        let deviation = (opening - self.alpha).to_degrees().abs();
        if deviation > tol {
            return Err(AxisError::PositionInconsistency(format!(
                "scattering vector {deviation:.4}° off the cone"
            )));
        }
        let psi = v.dot(&self.e2).atan2(v.dot(&self.e1)).to_degrees();
        Ok(wrap(psi, 360.0))
    }

    /// ψ error grows as 1/sin α for a given angular error.
    fn tolerance(&self, _target: f64, live: &LiveState<'_>) -> f64 {
        self.angular_tolerance(live) / self.alpha.sin().abs()
    }

    fn distance(&self, a: f64, b: f64) -> f64 {
        periodic_distance(a, b, 360.0)
    }
}
