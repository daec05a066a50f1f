//! Diffuse

use prb_core::ad::*;
use prb_core::bsdf::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::sampling::*;
use prb_core::spectrum::*;

/// One-sided Lambertian reflection.
pub struct Diffuse {
    /// Albedo.
    pub reflectance: Spectrum,
}

impl Diffuse {
    /// Create a new `Diffuse` BSDF.
    ///
    /// * `reflectance` - Albedo.
    pub fn new(reflectance: SpectrumF) -> Self {
        Self {
            reflectance: Spectrum::from(reflectance),
        }
    }
}

impl BSDF for Diffuse {
    fn get_type(&self) -> &'static str {
        "diffuse"
    }

    fn flags(&self) -> BSDFFlags {
        BSDFFlags::DIFFUSE_REFLECTION
    }

    fn sample(&self, _ctx: &BSDFContext, si: &SurfaceInteraction, _u1: Float, u2: &Point2f) -> (BSDFSample, SpectrumF) {
        if cos_theta(&si.wi).value() <= 0.0 {
            return (BSDFSample::default(), SpectrumF::zero());
        }
        let wo = cosine_sample_hemisphere(u2);
        let pdf = cosine_hemisphere_pdf(wo.z);
        if pdf <= 0.0 {
            return (BSDFSample::default(), SpectrumF::zero());
        }
        let bs = BSDFSample {
            wo,
            pdf,
            eta: 1.0,
            sampled_type: BSDFFlags::DIFFUSE_REFLECTION,
        };
        (bs, self.reflectance.value())
    }

    fn eval(&self, _ctx: &BSDFContext, si: &SurfaceInteraction, wo: &Vector3r) -> Spectrum {
        if cos_theta(&si.wi).value() <= 0.0 || cos_theta(wo).value() <= 0.0 {
            return Spectrum::zero();
        }
        self.reflectance * (wo.z * INV_PI)
    }

    fn pdf(&self, _ctx: &BSDFContext, si: &SurfaceInteraction, wo: &Vector3f) -> Float {
        if cos_theta(&si.wi).value() <= 0.0 {
            return 0.0;
        }
        cosine_hemisphere_pdf(wo.z)
    }

    fn traverse(&mut self, prefix: &str, cb: &mut dyn FnMut(&str, &mut Real)) {
        traverse_spectrum(&format!("{}.reflectance", prefix), &mut self.reflectance, cb);
    }
}

impl From<&ParamSet> for Diffuse {
    /// Create a `Diffuse` BSDF from given parameter set.
    ///
    /// * `params` - Parameter set.
    fn from(params: &ParamSet) -> Self {
        Self::new(params.find_one_spectrum("reflectance", SpectrumF::splat(0.5)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn sample_weight_is_albedo(u0 in 0.0f32..1.0, u1 in 0.0f32..1.0) {
            let bsdf = Diffuse::new(SpectrumF::new(0.2, 0.4, 0.6));
            let si = flat_interaction(Vector3f::new(0.3, 0.1, 1.0));
            let ctx = BSDFContext::default();
            let (bs, weight) = bsdf.sample(&ctx, &si, 0.5, &Point2f::new(u0, u1));
            prop_assume!(bs.pdf > 0.0);
            prop_assert_eq!(weight, SpectrumF::new(0.2, 0.4, 0.6));
            let f = bsdf.eval(&ctx, &si, &Vector3r::from(bs.wo)).value();
            prop_assert!(approx_eq!(f32, f[1] / bs.pdf, 0.4, epsilon = 1e-4));
            prop_assert!(approx_eq!(f32, bsdf.pdf(&ctx, &si, &bs.wo), bs.pdf, epsilon = 1e-6));
        }
    }

    #[test]
    fn back_side_is_black() {
        let bsdf = Diffuse::new(SpectrumF::splat(0.5));
        let si = flat_interaction(Vector3f::new(0.0, 0.0, -1.0));
        let ctx = BSDFContext::default();
        let wo = Vector3r::from(Vector3f::new(0.0, 0.0, 1.0));
        assert!(bsdf.eval(&ctx, &si, &wo).is_black());
        assert_eq!(bsdf.pdf(&ctx, &si, &wo.value()), 0.0);
        assert_eq!(bsdf.sample(&ctx, &si, 0.5, &Point2f::new(0.5, 0.5)).0.pdf, 0.0);
    }

    #[test]
    fn reflectance_is_differentiable() {
        let mut bsdf = Diffuse::new(SpectrumF::splat(0.5));
        let mut keys = vec![];
        bsdf.traverse("wall.bsdf", &mut |k, r| {
            keys.push(k.to_string());
            if k.ends_with(".g") {
                *r = Real::variable(r.value(), 0);
            }
        });
        assert_eq!(keys, vec!["wall.bsdf.reflectance.r", "wall.bsdf.reflectance.g", "wall.bsdf.reflectance.b"]);
        let si = flat_interaction(Vector3f::new(0.0, 0.0, 1.0));
        let f = bsdf.eval(&BSDFContext::default(), &si, &Vector3r::from(Vector3f::new(0.0, 0.0, 1.0)));
        assert!(approx_eq!(f32, f[1].grad_at(0), INV_PI, epsilon = 1e-6));
        assert_eq!(f[0].grad_at(0), 0.0);
    }
}
