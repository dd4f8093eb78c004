//! Single-crystal diffraction geometry.
//!
//! Four-circle conventions after Busing & Levy: the goniometer stack is
//! φ on χ on ω, with 2θ the detector arm. Angles are in degrees, reciprocal
//! vectors in Å⁻¹ (no 2π factor).

use kinax_common::axis::error::AxisError;
use nalgebra::{Matrix3, Vector3};

pub type Vec3 = Vector3<f64>;
pub type Mat3 = Matrix3<f64>;

/// Rotation about the instrument z axis (ω and φ circles).
pub fn rot_z(deg: f64) -> Mat3 {
    let (s, c) = deg.to_radians().sin_cos();
    Mat3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Rotation of the χ circle.
pub fn rot_chi(deg: f64) -> Mat3 {
    let (s, c) = deg.to_radians().sin_cos();
    Mat3::new(c, 0.0, -s, 0.0, 1.0, 0.0, s, 0.0, c)
}

/// Four-circle setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bisecting {
    pub omega: f64,
    pub two_theta: f64,
    pub chi: f64,
    pub phi: f64,
}

impl Bisecting {
    pub fn as_array(&self) -> [f64; 4] {
        [self.omega, self.two_theta, self.chi, self.phi]
    }
}

/// Scattering vector in the φ frame for a goniometer setting.
pub fn z1_from_angles(wavelength: f64, two_theta: f64, omega: f64, chi: f64, phi: f64) -> Vec3 {
    let theta = (0.5 * two_theta).to_radians();
    let z4 = Vec3::new(
        (2.0 * theta).sin() / wavelength,
        -2.0 * theta.sin().powi(2) / wavelength,
        0.0,
    );
    rot_z(phi) * rot_chi(chi) * rot_z(omega) * z4
}

/// Bisecting setting (ω = θ) that brings `z1` into diffraction.
///
/// φ is returned in `[0, 360)`, χ in `(90, 270)`.
pub fn z1_to_bisecting(wavelength: f64, z1: &Vec3) -> Result<Bisecting, AxisError> {
    let sin_theta = 0.5 * wavelength * z1.norm();
    if !(sin_theta > 0.0 && sin_theta <= 1.0) {
        return Err(AxisError::OutOfRange(format!(
            "reflection not reachable at wavelength {wavelength} (sin θ = {sin_theta:.4})"
        )));
    }
    let theta = sin_theta.asin().to_degrees();
    let chi = 180.0 - z1.z.atan2(z1.x.hypot(z1.y)).to_degrees();
    let phi = super::wrap(180.0 + z1.y.atan2(z1.x).to_degrees(), 360.0);
    Ok(Bisecting {
        omega: theta,
        two_theta: 2.0 * theta,
        chi,
        phi,
    })
}

/// Busing & Levy B matrix for cell `[a, b, c, α, β, γ]` (Å, degrees).
pub fn b_matrix(cell: [f64; 6]) -> Option<Mat3> {
    let [a, b, c, alpha, beta, gamma] = cell;
    let (sa, ca) = alpha.to_radians().sin_cos();
    let (sb, cb) = beta.to_radians().sin_cos();
    let (sg, cg) = gamma.to_radians().sin_cos();

    let vol_term = 1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg;
    if !(vol_term > 0.0 && a > 0.0 && b > 0.0 && c > 0.0) {
        return None;
    }
    let volume = a * b * c * vol_term.sqrt();

    let a_star = b * c * sa / volume;
    let b_star = a * c * sb / volume;
    let c_star = a * b * sg / volume;
    let cos_beta_star = (ca * cg - cb) / (sa * sg);
    let cos_gamma_star = (ca * cb - cg) / (sa * sb);
    let sin_beta_star = (1.0 - cos_beta_star * cos_beta_star).sqrt();
    let sin_gamma_star = (1.0 - cos_gamma_star * cos_gamma_star).sqrt();

    Some(Mat3::new(
        a_star,
        b_star * cos_gamma_star,
        c_star * cos_beta_star,
        0.0,
        b_star * sin_gamma_star,
        -c_star * sin_beta_star * ca,
        0.0,
        0.0,
        1.0 / c,
    ))
}

/// Angle between two vectors in radians, clamped against rounding.
pub fn angle_between(a: &Vec3, b: &Vec3) -> f64 {
    let cos = a.dot(b) / (a.norm() * b.norm());
    cos.clamp(-1.0, 1.0).acos()
}
