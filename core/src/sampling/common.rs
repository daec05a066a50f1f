//! Common

use crate::geometry::*;
use crate::pbrt::*;

/// Uniformly sample a direction from a sphere.
///
/// * `u` - The random sample point.
pub fn uniform_sample_sphere(u: &Point2f) -> Vector3f {
    let z = 1.0 - 2.0 * u[0];
    let r = max(0.0, 1.0 - z * z).sqrt();
    let phi = TWO_PI * u[1];
    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

/// Inverse of `uniform_sample_sphere`.
///
/// * `d` - Unit direction.
pub fn uniform_sphere_to_square(d: &Vector3f) -> Point2f {
    let mut phi = d.y.atan2(d.x) * INV_TWO_PI;
    if phi < 0.0 {
        phi += 1.0;
    }
    Point2f::new(clamp(0.5 * (1.0 - d.z), 0.0, 1.0), clamp(phi, 0.0, ONE_MINUS_EPSILON))
}

/// Returns the PDF for uniformly sampling a direction from a sphere.
#[inline]
pub fn uniform_sphere_pdf() -> Float {
    INV_FOUR_PI
}

/// Sample a point on a unit disk by mapping from a unit square to the unit
/// circle. The concentric mapping takes points in [-1, 1]^2 to unit disk by
/// uniformly mapping concentric squares to concentric circles.
///
/// * `u` - The random sample point.
pub fn concentric_sample_disk(u: &Point2f) -> Point2f {
    // Map uniform random numbers to [-1,1]^2.
    let u_offset = Point2f::new(2.0 * u.x - 1.0, 2.0 * u.y - 1.0);

    // Handle degeneracy at the origin.
    if u_offset.x == 0.0 && u_offset.y == 0.0 {
        return Point2f::new(0.0, 0.0);
    }

    // Apply concentric mapping to point
    let (r, theta) = if abs(u_offset.x) > abs(u_offset.y) {
        (u_offset.x, 0.25 * PI * (u_offset.y / u_offset.x))
    } else {
        (u_offset.y, PI_OVER_TWO - 0.25 * PI * (u_offset.x / u_offset.y))
    };

    Point2f::new(r * theta.cos(), r * theta.sin())
}

/// Sample a direction on a hemisphere using cosine-weighted sampling.
///
/// * `u` - The random sample point.
#[inline]
pub fn cosine_sample_hemisphere(u: &Point2f) -> Vector3f {
    let d = concentric_sample_disk(u);
    let z = max(0.0, 1.0 - d.x * d.x - d.y * d.y).sqrt();
    Vector3f::new(d.x, d.y, z)
}

/// Returns the PDF for cosine-weighted sampling a direction from a hemisphere.
///
/// * `cos_theta` - Cosine term of incident radiance.
#[inline]
pub fn cosine_hemisphere_pdf(cos_theta: Float) -> Float {
    max(cos_theta, 0.0) * INV_PI
}

/// Uniformly sample barycentric coordinates on a triangle.
///
/// * `u` - The random sample point.
pub fn uniform_sample_triangle(u: &Point2f) -> Point2f {
    let su0 = u[0].sqrt();
    Point2f::new(1.0 - su0, u[1] * su0)
}

/// Returns the power heuristic MIS weight `a² / (a² + b²)`. Returns zero
/// when the weight is not finite, including the case `a = b = 0`.
///
/// * `pdf_a` - Density of the strategy being weighted.
/// * `pdf_b` - Density of the competing strategy.
#[inline]
pub fn mis_weight(pdf_a: Float, pdf_b: Float) -> Float {
    let a2 = pdf_a * pdf_a;
    let w = a2 / (a2 + pdf_b * pdf_b);
    if w.is_finite() {
        w
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn mis_weight_zero_zero() {
        assert_eq!(mis_weight(0.0, 0.0), 0.0);
        assert_eq!(mis_weight(INFINITY, 1.0), 0.0);
        assert_eq!(mis_weight(1.0, 0.0), 1.0);
    }

    proptest! {
        #[test]
        fn mis_weights_sum_to_one(a in 1e-3..1e3f32, b in 1e-3..1e3f32) {
            let s = mis_weight(a, b) + mis_weight(b, a);
            prop_assert!((s - 1.0).abs() < 1e-5);
        }

        #[test]
        fn sphere_warp_inverts(u0 in 0.001..0.999f32, u1 in 0.001..0.999f32) {
            let d = uniform_sample_sphere(&Point2f::new(u0, u1));
            let u = uniform_sphere_to_square(&d);
            prop_assert!((u.x - u0).abs() < 1e-3);
            prop_assert!((u.y - u1).abs() < 1e-3);
        }

        #[test]
        fn cosine_samples_stay_in_upper_hemisphere(u0 in 0.0..1.0f32, u1 in 0.0..1.0f32) {
            let w = cosine_sample_hemisphere(&Point2f::new(u0, u1));
            prop_assert!(w.z >= 0.0);
            prop_assert!((w.length() - 1.0).abs() < 1e-4);
        }
    }
}
