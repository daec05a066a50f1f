//! Conductor

use prb_core::ad::*;
use prb_core::bsdf::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::spectrum::*;

/// Smooth conductor modeled as a perfect mirror with a constant
/// reflectance.
pub struct Conductor {
    /// Reflectance of the mirror.
    pub specular_reflectance: Spectrum,
}

impl Conductor {
    /// Create a new `Conductor` BSDF.
    ///
    /// * `specular_reflectance` - Reflectance of the mirror.
    pub fn new(specular_reflectance: SpectrumF) -> Self {
        Self {
            specular_reflectance: Spectrum::from(specular_reflectance),
        }
    }
}

impl BSDF for Conductor {
    fn get_type(&self) -> &'static str {
        "conductor"
    }

    fn flags(&self) -> BSDFFlags {
        BSDFFlags::DELTA_REFLECTION
    }

    fn sample(&self, _ctx: &BSDFContext, si: &SurfaceInteraction, _u1: Float, _u2: &Point2f) -> (BSDFSample, SpectrumF) {
        let wi = si.wi.value();
        if cos_theta(&wi) <= 0.0 {
            return (BSDFSample::default(), SpectrumF::zero());
        }
        let bs = BSDFSample {
            wo: reflect(&wi),
            pdf: 1.0,
            eta: 1.0,
            sampled_type: BSDFFlags::DELTA_REFLECTION,
        };
        (bs, self.specular_reflectance.value())
    }

    fn eval(&self, _ctx: &BSDFContext, _si: &SurfaceInteraction, _wo: &Vector3r) -> Spectrum {
        Spectrum::zero()
    }

    fn pdf(&self, _ctx: &BSDFContext, _si: &SurfaceInteraction, _wo: &Vector3f) -> Float {
        0.0
    }

    fn traverse(&mut self, prefix: &str, cb: &mut dyn FnMut(&str, &mut Real)) {
        traverse_spectrum(&format!("{}.specular_reflectance", prefix), &mut self.specular_reflectance, cb);
    }
}

impl From<&ParamSet> for Conductor {
    /// Create a `Conductor` BSDF from given parameter set.
    ///
    /// * `params` - Parameter set.
    fn from(params: &ParamSet) -> Self {
        Self::new(params.find_one_spectrum("specular_reflectance", SpectrumF::one()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    #[test]
    fn mirror_reflects_about_normal() {
        let bsdf = Conductor::new(SpectrumF::splat(0.9));
        let si = flat_interaction(Vector3f::new(0.6, 0.0, 0.8));
        let ctx = BSDFContext::default();
        let (bs, weight) = bsdf.sample(&ctx, &si, 0.5, &Point2f::new(0.5, 0.5));
        assert!((bs.wo - Vector3f::new(-0.6, 0.0, 0.8)).length() < 1e-6);
        assert_eq!(weight, SpectrumF::splat(0.9));
        assert!(bs.sampled_type.has_delta());
        assert_eq!(bsdf.pdf(&ctx, &si, &bs.wo), 0.0);
    }
}
