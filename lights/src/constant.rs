//! Constant Environment Light

use prb_core::ad::*;
use prb_core::emitter::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::sampling::*;
use prb_core::scene::*;
use prb_core::shape::*;
use prb_core::spectrum::*;

/// Uniform radiance arriving from infinitely far away.
pub struct ConstantLight {
    /// Identifier.
    pub id: String,

    /// Emitted radiance.
    pub radiance: Spectrum,
}

impl ConstantLight {
    /// Returns a new `ConstantLight`.
    ///
    /// * `id`       - Identifier.
    /// * `radiance` - Emitted radiance.
    pub fn new(id: &str, radiance: SpectrumF) -> Self {
        Self {
            id: id.to_string(),
            radiance: Spectrum::from(radiance),
        }
    }
}

impl Emitter for ConstantLight {
    fn get_type(&self) -> &'static str {
        "constant"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn flags(&self) -> EmitterFlags {
        EmitterFlags::INFINITE
    }

    /// Samples a direction uniformly on the sphere. The sampled position lies
    /// outside the bounding sphere of the scene.
    fn sample_direction(&self, scene: &Scene, p_ref: &Point3f, u: &Point2f) -> (DirectionSample, SpectrumF) {
        let (center, radius) = scene.bounding_sphere();
        let d = uniform_sample_sphere(u);
        let dist = 2.0 * (radius + p_ref.distance(&center));
        let ds = DirectionSample {
            p: Point3r::from(*p_ref + d * dist),
            n: Normal3r::from(-d),
            d,
            dist,
            pdf: uniform_sphere_pdf(),
            ..Default::default()
        };
        (ds, self.radiance.value() / ds.pdf)
    }

    fn pdf_direction(&self, _scene: &Scene, _p_ref: &Point3f, _ds: &DirectionSample) -> Float {
        uniform_sphere_pdf()
    }

    fn eval(&self, _si: &SurfaceInteraction) -> Spectrum {
        self.radiance
    }

    fn eval_direction(&self, _p_ref: &Point3r, _ds: &DirectionSample) -> Spectrum {
        self.radiance
    }

    fn traverse(&mut self, cb: &mut dyn FnMut(&str, &mut Real)) {
        let id = self.id.clone();
        for (i, c) in ["r", "g", "b"].iter().enumerate() {
            cb(&param_key(&id, &format!("radiance.{}", c)), &mut self.radiance[i]);
        }
    }
}

impl From<(&str, &ParamSet)> for ConstantLight {
    /// Create a `ConstantLight` from given parameter set.
    ///
    /// * `p` - Tuple containing the identifier and parameter set.
    fn from(p: (&str, &ParamSet)) -> Self {
        let (id, params) = p;
        let scale = params.find_one_float("scale", 1.0);
        Self::new(id, params.find_one_spectrum("radiance", SpectrumF::one()) * scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn sampled_position_is_outside_scene() {
        let scene = Scene::new(vec![], vec![Box::new(ConstantLight::new("sky", SpectrumF::one()))]).unwrap();
        assert!(scene.environment().is_some());
        let (ds, weight) = scene.emitters[0].sample_direction(&scene, &Point3f::zero(), &Point2f::new(0.3, 0.7));
        assert!(ds.dist >= 2.0);
        assert!(approx_eq!(f32, weight[0], FOUR_PI, epsilon = 1e-4));
        assert!(approx_eq!(f32, ds.p.value().distance(&Point3f::zero()), ds.dist, epsilon = 1e-4));
    }
}
