//! Scene

use crate::ad::*;
use crate::emitter::*;
use crate::error::*;
use crate::geometry::*;
use crate::interaction::*;
use crate::pbrt::*;
use crate::shape::*;
use crate::spectrum::*;
use std::collections::HashMap;

/// Scene container: shapes, emitters and the registry of differentiable
/// parameters.
pub struct Scene {
    /// All shapes in the scene.
    pub shapes: Vec<Box<dyn Shape>>,

    /// All emitters in the scene.
    pub emitters: Vec<Box<dyn Emitter>>,

    /// The bounding box of the scene geometry.
    bbox: Bounds3f,

    /// Indices of shapes whose geometry depends on enabled parameters.
    silhouette_shapes: Vec<usize>,

    /// Index of the environment emitter.
    environment: Option<usize>,

    /// Enabled parameter keys in gradient slot order.
    enabled: Vec<String>,

    /// Accumulated gradients per slot.
    gradients: [Float; GRAD_WIDTH],
}

impl Scene {
    /// Creates a new `Scene`. Area emitters are linked to their shapes.
    ///
    /// * `shapes`   - All shapes in the scene.
    /// * `emitters` - All emitters in the scene.
    pub fn new(mut shapes: Vec<Box<dyn Shape>>, emitters: Vec<Box<dyn Emitter>>) -> Result<Self> {
        let mut environment = None;
        let n_shapes = shapes.len();
        for (i, emitter) in emitters.iter().enumerate() {
            if let Some(s) = emitter.shape() {
                let shape = shapes.get_mut(s).ok_or_else(|| {
                    Error::Config(
                        emitter.id().to_string(),
                        format!("refers to shape {} but the scene has {} shapes", s, n_shapes),
                    )
                })?;
                shape.get_data_mut().emitter = Some(i);
            }
            if emitter.flags().contains(EmitterFlags::INFINITE) {
                if environment.is_some() {
                    return Err(Error::Config(
                        emitter.id().to_string(),
                        "only one environment emitter is supported".to_string(),
                    ));
                }
                environment = Some(i);
            }
        }

        let mut scene = Self {
            shapes,
            emitters,
            bbox: Bounds3f::EMPTY,
            silhouette_shapes: vec![],
            environment,
            enabled: vec![],
            gradients: [0.0; GRAD_WIDTH],
        };
        scene.update();
        info!(
            "Scene with {} shapes and {} emitters",
            scene.shapes.len(),
            scene.emitters.len()
        );
        Ok(scene)
    }

    /// Returns the bounding box of the scene geometry.
    pub fn bbox(&self) -> Bounds3f {
        self.bbox
    }

    /// Returns the center and radius of the bounding sphere of the scene.
    pub fn bounding_sphere(&self) -> (Point3f, Float) {
        if self.bbox.is_empty() {
            (Point3f::zero(), 1.0)
        } else {
            (self.bbox.center(), self.bbox.bounding_radius().max(RAY_EPSILON))
        }
    }

    /// Returns the indices of shapes taking part in silhouette sampling.
    pub fn silhouette_shapes(&self) -> &[usize] {
        &self.silhouette_shapes
    }

    /// Returns the environment emitter.
    pub fn environment(&self) -> Option<&dyn Emitter> {
        self.environment.map(|i| self.emitters[i].as_ref())
    }

    /// Rebuilds derived data after parameters changed.
    pub fn update(&mut self) {
        for shape in self.shapes.iter_mut() {
            shape.parameters_changed();
        }
        self.bbox = self
            .shapes
            .iter()
            .fold(Bounds3f::EMPTY, |b, s| b.union(&s.bbox()));
        self.silhouette_shapes = self
            .shapes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_differentiable())
            .map(|(i, _)| i)
            .collect();
        debug!(
            "{} of {} shapes have differentiable geometry",
            self.silhouette_shapes.len(),
            self.shapes.len()
        );
    }

    /// Visits every differentiable parameter of the scene. BSDF parameters
    /// are reported under `<shape>.bsdf.<name>`.
    ///
    /// * `cb` - Callback receiving the key and a mutable reference.
    pub fn traverse(&mut self, cb: &mut dyn FnMut(&str, &mut Real)) {
        for shape in self.shapes.iter_mut() {
            shape.traverse(cb);
            let prefix = param_key(shape.id(), "bsdf");
            shape.get_data_mut().bsdf.traverse(&prefix, cb);
        }
        for emitter in self.emitters.iter_mut() {
            emitter.traverse(cb);
        }
    }

    /// Returns all parameter keys.
    pub fn keys(&mut self) -> Vec<String> {
        let mut keys = vec![];
        self.traverse(&mut |k, _| keys.push(k.to_string()));
        keys
    }

    /// Returns the current value of a parameter.
    ///
    /// * `key` - Parameter key.
    pub fn param(&mut self, key: &str) -> Result<Float> {
        let mut value = None;
        self.traverse(&mut |k, r| {
            if k == key {
                value = Some(r.value());
            }
        });
        value.ok_or_else(|| Error::UnknownParameter(key.to_string()))
    }

    /// Enables gradient tracking for a parameter and returns its slot.
    ///
    /// * `key` - Parameter key.
    pub fn enable_grad(&mut self, key: &str) -> Result<usize> {
        if let Some(slot) = self.slot(key) {
            return Ok(slot);
        }
        if self.enabled.len() == GRAD_WIDTH {
            return Err(Error::TooManyParameters(key.to_string()));
        }
        let slot = self.enabled.len();
        let mut found = false;
        self.traverse(&mut |k, r| {
            if k == key {
                *r = Real::variable(r.value(), slot);
                found = true;
            }
        });
        if !found {
            return Err(Error::UnknownParameter(key.to_string()));
        }
        debug!("Enabled gradients of '{}' in slot {}", key, slot);
        self.enabled.push(key.to_string());
        self.update();
        Ok(slot)
    }

    /// Updates the value of a parameter, keeping its gradient slot.
    ///
    /// * `key`   - Parameter key.
    /// * `value` - New value.
    pub fn set_param(&mut self, key: &str, value: Float) -> Result<()> {
        let slot = self.slot(key);
        let mut found = false;
        self.traverse(&mut |k, r| {
            if k == key {
                *r = match slot {
                    Some(s) => Real::variable(value, s),
                    None => Real::constant(value),
                };
                found = true;
            }
        });
        if !found {
            return Err(Error::UnknownParameter(key.to_string()));
        }
        self.update();
        Ok(())
    }

    /// Returns the gradient slot of an enabled parameter.
    ///
    /// * `key` - Parameter key.
    pub fn slot(&self, key: &str) -> Option<usize> {
        self.enabled.iter().position(|k| k == key)
    }

    /// Returns the number of parameters with gradients enabled.
    pub fn num_enabled(&self) -> usize {
        self.enabled.len()
    }

    /// Returns the accumulated gradient of an enabled parameter.
    ///
    /// * `key` - Parameter key.
    pub fn grad(&self, key: &str) -> Option<Float> {
        self.slot(key).map(|s| self.gradients[s])
    }

    /// Adds the gradients collected by a backward pass.
    ///
    /// * `tracker` - The tracker of the pass.
    pub fn accumulate_grad(&mut self, tracker: &GradientTracker) {
        for (g, t) in self.gradients.iter_mut().zip(tracker.gradients.iter()) {
            *g += t;
        }
    }

    /// Converts a map of parameter tangents to per-slot tangents.
    ///
    /// * `tangents` - Tangent per parameter key.
    pub fn tangents(&self, tangents: &HashMap<String, Float>) -> Result<[Float; GRAD_WIDTH]> {
        let mut t = [0.0; GRAD_WIDTH];
        for (key, v) in tangents.iter() {
            let slot = self.slot(key).ok_or_else(|| Error::UnknownParameter(key.clone()))?;
            t[slot] = *v;
        }
        Ok(t)
    }

    /// Finds the closest intersection without reconstructing it.
    ///
    /// * `ray` - The ray.
    pub fn ray_intersect_preliminary(&self, ray: &Ray) -> PreliminaryIntersection {
        let mut pi = PreliminaryIntersection::miss();
        for (i, shape) in self.shapes.iter().enumerate() {
            if let Some((t, prim_index, prim_uv)) = shape.ray_intersect_preliminary(ray) {
                if t < pi.t && t < ray.t_max {
                    pi = PreliminaryIntersection {
                        t,
                        shape: Some(i),
                        prim_index,
                        prim_uv,
                    };
                }
            }
        }
        pi
    }

    /// Finds and reconstructs the closest intersection.
    ///
    /// * `ray`   - The ray.
    /// * `flags` - Reconstruction flags.
    pub fn ray_intersect(&self, ray: &Ray, flags: RayFlags) -> SurfaceInteraction {
        self.ray_intersect_preliminary(ray)
            .compute_surface_interaction(self, ray, flags)
    }

    /// Returns `true` if anything blocks the ray.
    ///
    /// * `ray` - The ray.
    pub fn ray_test(&self, ray: &Ray) -> bool {
        self.shapes.iter().any(|s| s.ray_test(ray))
    }

    /// Returns the index of the emitter a surface interaction lies on.
    /// Escaped rays map to the environment emitter.
    ///
    /// * `si` - The surface interaction.
    pub fn emitter_at(&self, si: &SurfaceInteraction) -> Option<usize> {
        if si.is_valid() {
            si.shape.and_then(|s| self.shapes[s].emitter())
        } else {
            self.environment
        }
    }

    /// Returns the radiance emitted from a surface interaction towards
    /// `si.wi`, or by the environment for escaped rays.
    ///
    /// * `si` - The surface interaction.
    pub fn eval_emitter(&self, si: &SurfaceInteraction) -> Spectrum {
        match self.emitter_at(si) {
            Some(e) => self.emitters[e].eval(si),
            None => Spectrum::zero(),
        }
    }

    /// Samples one emitter uniformly and a position on it. Returns the
    /// direction sample and the detached weight `Le / pdf`, zero when the
    /// connection is occluded and `test_visibility` is set.
    ///
    /// * `si`              - Reference interaction.
    /// * `u`               - Sample value to use.
    /// * `test_visibility` - Whether to trace a shadow ray.
    pub fn sample_emitter_direction(
        &self,
        si: &SurfaceInteraction,
        u: &Point2f,
        test_visibility: bool,
    ) -> (DirectionSample, SpectrumF) {
        let n = self.emitters.len();
        if n == 0 {
            return (DirectionSample::default(), SpectrumF::zero());
        }
        let index = ((u.x * n as Float) as usize).min(n - 1);
        let u = Point2f::new(u.x * n as Float - index as Float, u.y);

        let (mut ds, mut weight) = self.emitters[index].sample_direction(self, &si.p_f(), &u);
        ds.emitter = Some(index);
        if ds.pdf <= 0.0 || !ds.pdf.is_finite() {
            return (ds, SpectrumF::zero());
        }
        ds.pdf /= n as Float;
        weight = weight * n as Float;

        if test_visibility && self.ray_test(&si.spawn_ray_to(&ds.p.value())) {
            weight = SpectrumF::zero();
        }
        (ds, weight)
    }

    /// Returns the solid angle density of `sample_emitter_direction`.
    ///
    /// * `p_ref` - Reference point.
    /// * `ds`    - The direction sample.
    pub fn pdf_emitter_direction(&self, p_ref: &Point3f, ds: &DirectionSample) -> Float {
        match ds.emitter {
            Some(e) if !ds.delta => {
                self.emitters[e].pdf_direction(self, p_ref, ds) / self.emitters.len() as Float
            }
            _ => 0.0,
        }
    }

    /// Re-evaluates the radiance of a sampled emitter position arriving at
    /// an attached reference point.
    ///
    /// * `p_ref` - Reference point.
    /// * `ds`    - The direction sample.
    pub fn eval_emitter_direction(&self, p_ref: &Point3r, ds: &DirectionSample) -> Spectrum {
        match ds.emitter {
            Some(e) => self.emitters[e].eval_direction(p_ref, ds),
            None => Spectrum::zero(),
        }
    }

    /// Samples a point on the visibility discontinuities of the shapes with
    /// differentiable geometry. The shape is chosen uniformly with the first
    /// dimension of `u`.
    ///
    /// * `u`     - Point in the boundary sample space `[0, 1]³`.
    /// * `flags` - Kinds of discontinuities to sample.
    pub fn sample_silhouette(&self, u: &Point3f, flags: DiscontinuityFlags) -> SilhouetteSample {
        let n = self.silhouette_shapes.len();
        if n == 0 {
            return SilhouetteSample::default();
        }
        let k = ((u.x * n as Float) as usize).min(n - 1);
        let shape_index = self.silhouette_shapes[k];
        let u = Point3f::new(u.x * n as Float - k as Float, u.y, u.z);

        let mut ss = self.shapes[shape_index].sample_silhouette(&u, flags);
        ss.shape = Some(shape_index);
        ss.pdf /= n as Float;
        ss
    }

    /// Inverse of `sample_silhouette`.
    ///
    /// * `ss` - A silhouette sample.
    pub fn invert_silhouette_sample(&self, ss: &SilhouetteSample) -> Option<Point3f> {
        let shape_index = ss.shape?;
        let k = self.silhouette_shapes.iter().position(|s| *s == shape_index)?;
        let n = self.silhouette_shapes.len() as Float;
        let u = self.shapes[shape_index].invert_silhouette_sample(ss);
        Some(Point3f::new((k as Float + u.x) / n, u.y, u.z))
    }
}

impl PreliminaryIntersection {
    /// Reconstructs the full surface interaction.
    ///
    /// * `scene` - The scene.
    /// * `ray`   - The ray that produced the intersection.
    /// * `flags` - Reconstruction flags.
    pub fn compute_surface_interaction(&self, scene: &Scene, ray: &Ray, flags: RayFlags) -> SurfaceInteraction {
        match self.shape {
            Some(s) if self.is_valid() => {
                let mut si = scene.shapes[s].compute_surface_interaction(ray, self, flags);
                si.shape = Some(s);
                si.prim_index = self.prim_index;
                si.prim_uv = self.prim_uv;
                si
            }
            _ => SurfaceInteraction::escaped(ray),
        }
    }
}
