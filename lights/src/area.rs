//! Area Light Source

use prb_core::ad::*;
use prb_core::emitter::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;
use prb_core::scene::*;
use prb_core::shape::*;
use prb_core::spectrum::*;

/// Uniform one-sided emission from the front side of a shape.
pub struct AreaLight {
    /// Identifier.
    pub id: String,

    /// Index of the emitting shape in the scene.
    pub shape: usize,

    /// Emitted radiance.
    pub radiance: Spectrum,

    /// Scale factor applied to the radiance.
    pub scale: Real,
}

impl AreaLight {
    /// Returns a new `AreaLight`.
    ///
    /// * `id`       - Identifier.
    /// * `shape`    - Index of the emitting shape in the scene.
    /// * `radiance` - Emitted radiance.
    pub fn new(id: &str, shape: usize, radiance: SpectrumF) -> Self {
        Self {
            id: id.to_string(),
            shape,
            radiance: Spectrum::from(radiance),
            scale: Real::from(1.0),
        }
    }

    /// Returns the attached radiance including the scale factor.
    fn scaled_radiance(&self) -> Spectrum {
        self.radiance * self.scale
    }
}

impl Emitter for AreaLight {
    fn get_type(&self) -> &'static str {
        "area"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn flags(&self) -> EmitterFlags {
        EmitterFlags::SURFACE
    }

    fn shape(&self) -> Option<usize> {
        Some(self.shape)
    }

    /// Samples a point uniformly by area on the shape.
    fn sample_direction(&self, scene: &Scene, p_ref: &Point3f, u: &Point2f) -> (DirectionSample, SpectrumF) {
        let shape = match scene.shapes.get(self.shape) {
            Some(shape) => shape,
            None => return (DirectionSample::default(), SpectrumF::zero()),
        };
        let ps = shape.sample_position(u);
        let ds = DirectionSample::from_position(&ps, p_ref);
        if ds.pdf <= 0.0 || !ds.pdf.is_finite() || ds.n.value().dot(&ds.d) >= 0.0 {
            return (ds, SpectrumF::zero());
        }
        (ds, self.scaled_radiance().value() / ds.pdf)
    }

    fn pdf_direction(&self, scene: &Scene, _p_ref: &Point3f, ds: &DirectionSample) -> Float {
        let cos = -ds.n.value().dot(&ds.d);
        if cos <= 0.0 {
            return 0.0;
        }
        match scene.shapes.get(self.shape) {
            Some(shape) => ds.dist * ds.dist / (cos * shape.surface_area()),
            None => 0.0,
        }
    }

    fn eval(&self, si: &SurfaceInteraction) -> Spectrum {
        if cos_theta(&si.wi).value() > 0.0 {
            self.scaled_radiance()
        } else {
            Spectrum::zero()
        }
    }

    fn eval_direction(&self, p_ref: &Point3r, ds: &DirectionSample) -> Spectrum {
        if ds.n.dot(&(ds.p - *p_ref)).value() < 0.0 {
            self.scaled_radiance()
        } else {
            Spectrum::zero()
        }
    }

    fn traverse(&mut self, cb: &mut dyn FnMut(&str, &mut Real)) {
        let id = self.id.clone();
        for (i, c) in ["r", "g", "b"].iter().enumerate() {
            cb(&param_key(&id, &format!("radiance.{}", c)), &mut self.radiance[i]);
        }
        cb(&param_key(&id, "scale"), &mut self.scale);
    }
}

impl From<(&str, usize, &ParamSet)> for AreaLight {
    /// Create an `AreaLight` from given parameter set.
    ///
    /// * `p` - Tuple containing the identifier, shape index and parameter
    ///         set.
    fn from(p: (&str, usize, &ParamSet)) -> Self {
        let (id, shape, params) = p;
        let radiance = params.find_one_spectrum("radiance", SpectrumF::one());
        if radiance.is_black() {
            warn!("Area light '{}' has zero radiance", id);
        }
        let mut light = Self::new(id, shape, radiance);
        light.scale = Real::from(params.find_one_float("scale", 1.0));
        light
    }
}
