//! Dielectric

use prb_core::bsdf::*;
use prb_core::error::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::spectrum::*;

/// Smooth interface between two dielectrics. Reflection and refraction are
/// chosen stochastically in proportion to the Fresnel reflectance.
pub struct Dielectric {
    /// Interior over exterior index of refraction.
    pub eta: Float,
}

impl Dielectric {
    /// Create a new `Dielectric` BSDF.
    ///
    /// * `int_ior` - Interior index of refraction.
    /// * `ext_ior` - Exterior index of refraction.
    pub fn new(int_ior: Float, ext_ior: Float) -> Self {
        Self { eta: int_ior / ext_ior }
    }
}

impl BSDF for Dielectric {
    fn get_type(&self) -> &'static str {
        "dielectric"
    }

    fn flags(&self) -> BSDFFlags {
        BSDFFlags::DELTA_REFLECTION | BSDFFlags::DELTA_TRANSMISSION
    }

    /// The pdf of the sample is the probability of the chosen lobe.
    fn sample(&self, ctx: &BSDFContext, si: &SurfaceInteraction, u1: Float, _u2: &Point2f) -> (BSDFSample, SpectrumF) {
        let wi = si.wi.value();
        let (f, cos_theta_t, eta_it) = fresnel_dielectric(cos_theta(&wi), self.eta);
        if u1 <= f {
            let bs = BSDFSample {
                wo: reflect(&wi),
                pdf: f,
                eta: 1.0,
                sampled_type: BSDFFlags::DELTA_REFLECTION,
            };
            (bs, SpectrumF::one())
        } else {
            let bs = BSDFSample {
                wo: refract(&wi, cos_theta_t, eta_it),
                pdf: 1.0 - f,
                eta: eta_it,
                sampled_type: BSDFFlags::DELTA_TRANSMISSION,
            };
            // Radiance is compressed into the denser medium.
            let scale = match ctx.mode {
                TransportMode::Radiance => 1.0 / (eta_it * eta_it),
                TransportMode::Importance => 1.0,
            };
            (bs, SpectrumF::splat(scale))
        }
    }

    fn eval(&self, _ctx: &BSDFContext, _si: &SurfaceInteraction, _wo: &Vector3r) -> Spectrum {
        Spectrum::zero()
    }

    fn pdf(&self, _ctx: &BSDFContext, _si: &SurfaceInteraction, _wo: &Vector3f) -> Float {
        0.0
    }
}

impl TryFrom<&ParamSet> for Dielectric {
    type Error = Error;

    /// Create a `Dielectric` BSDF from given parameter set.
    ///
    /// * `params` - Parameter set.
    fn try_from(params: &ParamSet) -> Result<Self> {
        let int_ior = params.find_one_float("int_ior", 1.5);
        let ext_ior = params.find_one_float("ext_ior", 1.0);
        if int_ior <= 0.0 || ext_ior <= 0.0 {
            return Err(Error::Config(
                "dielectric".to_string(),
                format!("indices of refraction must be positive, got {} and {}", int_ior, ext_ior),
            ));
        }
        if int_ior == ext_ior {
            warn!("Dielectric with matching indices of refraction {} is invisible", int_ior);
        }
        Ok(Self::new(int_ior, ext_ior))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use float_cmp::approx_eq;

    #[test]
    fn lobe_choice_follows_fresnel() {
        let bsdf = Dielectric::new(1.5, 1.0);
        let si = flat_interaction(Vector3f::new(0.0, 0.0, 1.0));
        let ctx = BSDFContext::default();
        let (bs, weight) = bsdf.sample(&ctx, &si, 0.01, &Point2f::default());
        assert_eq!(bs.sampled_type, BSDFFlags::DELTA_REFLECTION);
        assert!(approx_eq!(f32, bs.pdf, 0.04, epsilon = 1e-5));
        assert_eq!(weight, SpectrumF::one());

        let (bs, weight) = bsdf.sample(&ctx, &si, 0.5, &Point2f::default());
        assert_eq!(bs.sampled_type, BSDFFlags::DELTA_TRANSMISSION);
        assert!(approx_eq!(f32, bs.wo.z, -1.0, epsilon = 1e-5));
        assert!(approx_eq!(f32, weight[0], 1.0 / 2.25, epsilon = 1e-5));
        assert!(approx_eq!(f32, bs.eta, 1.5, epsilon = 1e-6));
    }

    #[test]
    fn grazing_exit_reflects_totally() {
        let bsdf = Dielectric::new(1.5, 1.0);
        let si = flat_interaction(Vector3f::new(0.95, 0.0, -0.1));
        let (bs, _) = bsdf.sample(&BSDFContext::default(), &si, 0.99, &Point2f::default());
        assert_eq!(bs.sampled_type, BSDFFlags::DELTA_REFLECTION);
        assert!(bs.wo.z < 0.0);
    }

    #[test]
    fn invalid_ior_is_rejected() {
        let mut params = ParamSet::new();
        params.add_float("int_ior", &[-1.0]);
        assert!(Dielectric::try_from(&params).is_err());
    }
}
