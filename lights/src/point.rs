//! Point Light Source

use prb_core::ad::*;
use prb_core::emitter::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::scene::*;
use prb_core::shape::*;
use prb_core::spectrum::*;

/// Implements an isotropic point light source that emits the same amount of
/// light in all directions.
pub struct PointLight {
    /// Identifier.
    pub id: String,

    /// Position.
    pub position: Vector3r,

    /// Intensity.
    pub intensity: Spectrum,

    /// Scale factor applied to the intensity.
    pub scale: Real,
}

impl PointLight {
    /// Returns a new `PointLight`.
    ///
    /// * `id`        - Identifier.
    /// * `position`  - Position.
    /// * `intensity` - Intensity.
    pub fn new(id: &str, position: Point3f, intensity: SpectrumF) -> Self {
        Self {
            id: id.to_string(),
            position: Vector3r::from(position),
            intensity: Spectrum::from(intensity),
            scale: Real::from(1.0),
        }
    }

    /// Returns the attached intensity including the scale factor.
    fn scaled_intensity(&self) -> Spectrum {
        self.intensity * self.scale
    }
}

impl Emitter for PointLight {
    fn get_type(&self) -> &'static str {
        "point"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn flags(&self) -> EmitterFlags {
        EmitterFlags::DELTA_POSITION
    }

    fn sample_direction(&self, _scene: &Scene, p_ref: &Point3f, _u: &Point2f) -> (DirectionSample, SpectrumF) {
        let v = self.position.value() - *p_ref;
        let dist = v.length();
        if dist == 0.0 {
            return (DirectionSample::default(), SpectrumF::zero());
        }
        let ds = DirectionSample {
            p: self.position,
            d: v / dist,
            dist,
            pdf: 1.0,
            delta: true,
            ..Default::default()
        };
        (ds, self.scaled_intensity().value() / (dist * dist))
    }

    fn pdf_direction(&self, _scene: &Scene, _p_ref: &Point3f, _ds: &DirectionSample) -> Float {
        0.0
    }

    fn eval(&self, _si: &SurfaceInteraction) -> Spectrum {
        Spectrum::zero()
    }

    /// Returns the intensity over the squared distance to the reference
    /// point.
    fn eval_direction(&self, p_ref: &Point3r, ds: &DirectionSample) -> Spectrum {
        let dist2 = (ds.p - *p_ref).length_squared();
        if dist2.value() <= 0.0 {
            return Spectrum::zero();
        }
        self.scaled_intensity() / dist2
    }

    fn traverse(&mut self, cb: &mut dyn FnMut(&str, &mut Real)) {
        let id = self.id.clone();
        traverse_vector(&param_key(&id, "position"), &mut self.position, cb);
        for (i, c) in ["r", "g", "b"].iter().enumerate() {
            cb(&param_key(&id, &format!("intensity.{}", c)), &mut self.intensity[i]);
        }
        cb(&param_key(&id, "scale"), &mut self.scale);
    }
}

impl From<(&str, &ParamSet)> for PointLight {
    /// Create a `PointLight` from given parameter set.
    ///
    /// * `p` - Tuple containing the identifier and parameter set.
    fn from(p: (&str, &ParamSet)) -> Self {
        let (id, params) = p;
        let position = params.find_one_point3f("position", Point3f::zero());
        let intensity = params.find_one_spectrum("intensity", SpectrumF::one());
        let mut light = Self::new(id, position, intensity);
        light.scale = Real::from(params.find_one_float("scale", 1.0));
        light
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn inverse_square_falloff() {
        let scene = Scene::new(vec![], vec![]).unwrap();
        let light = PointLight::new("light", Point3f::new(0.0, 0.0, 2.0), SpectrumF::splat(8.0));
        let (ds, weight) = light.sample_direction(&scene, &Point3f::zero(), &Point2f::default());
        assert!(ds.delta);
        assert_eq!(ds.dist, 2.0);
        assert_eq!(weight, SpectrumF::splat(2.0));
        assert_eq!(light.pdf_direction(&scene, &Point3f::zero(), &ds), 0.0);
    }

    #[test]
    fn attached_position_changes_falloff() {
        let mut light = PointLight::new("light", Point3f::new(0.0, 0.0, 2.0), SpectrumF::splat(8.0));
        light.traverse(&mut |k, r| {
            if k == "light.position.z" {
                *r = Real::variable(r.value(), 0);
            }
        });
        let scene = Scene::new(vec![], vec![]).unwrap();
        let (ds, _) = light.sample_direction(&scene, &Point3f::zero(), &Point2f::default());
        let le = light.eval_direction(&Point3r::from(Vector3f::zero()), &ds);
        // d/dz (8 / z²) = -16 / z³
        assert!(approx_eq!(f32, le[0].grad_at(0), -2.0, epsilon = 1e-5));
    }
}
