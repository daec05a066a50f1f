//! Fresnel equations

use crate::ad::*;
use crate::geometry::*;

/// Returns the Fresnel reflectance of a dielectric interface for unpolarized
/// light, together with the cosine of the transmitted direction and the
/// relative index of refraction along it.
///
/// * `cos_theta_i` - Cosine of the incident direction with the normal; the
///                   sign selects the side of the interface.
/// * `eta`         - Interior over exterior index of refraction.
pub fn fresnel_dielectric<T: Scalar>(cos_theta_i: T, eta: T) -> (T, T, T) {
    let outside = cos_theta_i.value() >= 0.0;
    let eta = if outside { eta } else { T::from(1.0) / eta };
    let cos_theta_i = cos_theta_i.abs();

    // Snell's law.
    let sin2_theta_t = (T::from(1.0) - cos_theta_i.sqr()) / eta.sqr();
    if sin2_theta_t.value() >= 1.0 {
        // Total internal reflection.
        return (T::from(1.0), T::from(0.0), eta);
    }
    let cos_theta_t = (T::from(1.0) - sin2_theta_t).safe_sqrt();

    let r_parl = (eta * cos_theta_i - cos_theta_t) / (eta * cos_theta_i + cos_theta_t);
    let r_perp = (cos_theta_i - eta * cos_theta_t) / (cos_theta_i + eta * cos_theta_t);
    let f = (r_parl.sqr() + r_perp.sqr()) * 0.5;
    let cos_theta_t = if outside { -cos_theta_t } else { cos_theta_t };
    (f, cos_theta_t, eta)
}

/// Refracts a local direction through an interface whose normal is `+z`.
///
/// * `wi`          - Incident direction.
/// * `cos_theta_t` - Signed cosine of the transmitted direction as returned
///                   by `fresnel_dielectric`.
/// * `eta`         - Relative index of refraction as returned by
///                   `fresnel_dielectric`.
pub fn refract<T: Scalar>(wi: &Vector3<T>, cos_theta_t: T, eta: T) -> Vector3<T> {
    let inv_eta = T::from(1.0) / eta;
    Vector3::new(-wi.x * inv_eta, -wi.y * inv_eta, cos_theta_t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pbrt::*;
    use float_cmp::approx_eq;

    #[test]
    fn normal_incidence_on_glass() {
        let (f, cos_t, eta) = fresnel_dielectric(1.0 as Float, 1.5);
        assert!(approx_eq!(f32, f, 0.04, epsilon = 1e-5));
        assert!(approx_eq!(f32, cos_t, -1.0, epsilon = 1e-5));
        assert!(approx_eq!(f32, eta, 1.5, epsilon = 1e-6));
    }

    #[test]
    fn total_internal_reflection() {
        let cos = -(0.1 as Float);
        let (f, _, _) = fresnel_dielectric(cos, 1.5);
        assert_eq!(f, 1.0);
    }

    #[test]
    fn refracted_direction_is_unit() {
        let wi = Vector3f::new(0.6, 0.0, 0.8);
        let (_, cos_t, eta) = fresnel_dielectric(wi.z, 1.5);
        let wt = refract(&wi, cos_t, eta);
        assert!(approx_eq!(f32, wt.length(), 1.0, epsilon = 1e-5));
        assert!(wt.z < 0.0);
    }
}
