//! Ray primitives.
//!
//! Rays are 3D vectors from the optical centre in the camera optical frame
//! (x right, y down, z forward).

use nalgebra::Vector3;

/// Euclidean length of a vector starting at the origin.
#[inline]
pub fn vector_length(v: &Vector3<f64>) -> f64 {
    v.norm()
}

/// Unsigned angle between two rays, in radians.
///
/// `acos(a·b / (|a||b|))`. The cosine is clamped to `[-1, 1]` before `acos`
/// so rays that are parallel up to rounding give `0` instead of `NaN`.
/// Returns `None` when either ray has zero (or non-finite) length.
pub fn angle_between_rays(a: &Vector3<f64>, b: &Vector3<f64>) -> Option<f64> {
    let norm = vector_length(a) * vector_length(b);
    if !norm.is_finite() || norm <= f64::EPSILON {
        return None;
    }
    let cos = (a.dot(b) / norm).clamp(-1.0, 1.0);
    Some(cos.acos())
}

/// Angle of a ray below the optical axis in the vertical (y-z) plane.
///
/// Positive for rays pointing down in the image, negative above the axis.
#[inline]
pub fn signed_vertical_angle(ray: &Vector3<f64>) -> f64 {
    ray.y.atan2(ray.z)
}
