//! Reparameterization determinants

use crate::ad::*;
use crate::geometry::*;
use crate::interaction::*;
use crate::sensor::*;

/// Returns a value that is exactly one (zero when `d` is zero) but whose
/// derivative is that of `d / detach(d)`. The ratio of two evaluations of the
/// same Jacobian is one in value, yet differs in derivative once the scene
/// parameters move.
///
/// * `d` - Attached determinant.
pub fn det_over_det(d: Real) -> Real {
    if d.value() == 0.0 || !d.is_finite() {
        Real::constant(0.0)
    } else {
        Real::replace_grad(Real::constant(1.0), d / d.detach())
    }
}

/// Returns the Jacobian converting a solid angle density at `p_ref` into an
/// area density at `si`: `|∂p/∂u × ∂p/∂v| · |cos θ| / dist²`. Invalid
/// interactions and coincident points give one.
///
/// * `si`    - Attached surface interaction.
/// * `p_ref` - Attached reference point.
pub fn solid_to_surface_reparam_det(si: &SurfaceInteraction, p_ref: &Point3r) -> Real {
    if !si.is_valid() {
        return Real::constant(1.0);
    }
    let v = si.p - *p_ref;
    let dist2 = v.length_squared();
    if dist2.value() == 0.0 {
        return Real::constant(1.0);
    }
    let dist = dist2.sqrt();
    let cos = si.n.dot(&v).abs() / dist;
    si.dp_du.cross(&si.dp_dv).length() * cos / dist2
}

/// Returns the Jacobian converting an image plane density into an area
/// density at `si` for a perspective sensor:
/// `near · |n·v| / |f·v|³ · |∂p/∂u × ∂p/∂v|` with `v` the vector from the
/// sensor to the point and `f` the viewing direction. The constant near
/// factor may be left out when the value only enters a ratio.
///
/// * `sensor`       - The sensor.
/// * `si`           - Attached surface interaction.
/// * `include_near` - Whether to multiply by the near factor.
pub fn sensor_to_surface_reparam_det(sensor: &dyn Sensor, si: &SurfaceInteraction, include_near: bool) -> Real {
    if !si.is_valid() {
        return Real::constant(1.0);
    }
    let v = si.p - sensor.world_position();
    let f = Vector3r::from(sensor.forward());
    let fv = f.dot(&v).abs();
    if fv.value() == 0.0 {
        return Real::constant(1.0);
    }
    let det = si.n.dot(&v).abs() / (fv * fv * fv) * si.dp_du.cross(&si.dp_dv).length();
    if include_near {
        det * sensor.near_factor()
    } else {
        det
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn patch(z: Real) -> SurfaceInteraction {
        let n = Vector3r::from(Vector3f::new(0.0, 0.0, 1.0));
        SurfaceInteraction::new(
            Real::constant(1.0),
            Point3r::new(Real::constant(0.0), Real::constant(0.0), z),
            n,
            Point2r::default(),
            Vector3r::from(Vector3f::new(1.0, 0.0, 0.0)),
            Vector3r::from(Vector3f::new(0.0, 1.0, 0.0)),
            &n,
        )
    }

    proptest! {
        #[test]
        fn det_over_det_is_one_in_value(v in 1e-4f32..1e4f32, slot in 0usize..GRAD_WIDTH) {
            let d = Real::variable(v, slot);
            let r = det_over_det(d);
            prop_assert_eq!(r.value(), 1.0);
            prop_assert!(approx_eq!(f32, r.grad_at(slot), 1.0 / v, epsilon = 1e-3 / v));
        }
    }

    #[test]
    fn det_over_det_of_zero_is_zero() {
        assert_eq!(det_over_det(Real::constant(0.0)).value(), 0.0);
    }

    #[test]
    fn solid_to_surface_matches_inverse_square_law() {
        let si = patch(Real::variable(2.0, 0));
        let det = solid_to_surface_reparam_det(&si, &Point3r::zero());
        assert!(approx_eq!(f32, det.value(), 0.25, epsilon = 1e-6));
        // d/dz (1/z²) = -2/z³.
        assert!(approx_eq!(f32, det.grad_at(0), -0.25, epsilon = 1e-5));
    }

    #[test]
    fn degenerate_interactions_give_one() {
        let mut si = patch(Real::constant(0.0));
        assert_eq!(solid_to_surface_reparam_det(&si, &Point3r::zero()).value(), 1.0);
        si.valid = false;
        assert_eq!(solid_to_surface_reparam_det(&si, &Point3r::from(Vector3f::new(1.0, 0.0, 0.0))).value(), 1.0);
    }
}
