//! Shapes

use crate::ad::*;
use crate::bsdf::*;
use crate::geometry::*;
use crate::interaction::*;
use crate::pbrt::*;

/// Data shared by all shape implementations.
pub struct ShapeData {
    /// Identifier used as the prefix of the shape's parameter keys.
    pub id: String,

    /// Surface scattering model.
    pub bsdf: Box<dyn BSDF>,

    /// Index of the emitter attached to the surface, if any.
    pub emitter: Option<usize>,
}

impl ShapeData {
    /// Returns a new `ShapeData`.
    ///
    /// * `id`   - Identifier.
    /// * `bsdf` - Surface scattering model.
    pub fn new(id: &str, bsdf: Box<dyn BSDF>) -> Self {
        Self {
            id: id.to_string(),
            bsdf,
            emitter: None,
        }
    }
}

/// Shape interface. Besides intersection and position sampling, every shape
/// exposes its visibility discontinuities through a boundary sample space
/// `[0, 1]³` so that projective integrators can sample silhouettes.
pub trait Shape: Send + Sync {
    /// Returns the shape type. Usually these are behind trait objects and
    /// harder to debug. So this will be helpful.
    fn get_type(&self) -> &'static str;

    /// Returns the underlying shape data.
    fn get_data(&self) -> &ShapeData;

    /// Returns the underlying shape data mutably.
    fn get_data_mut(&mut self) -> &mut ShapeData;

    /// Returns the shape identifier.
    fn id(&self) -> &str {
        &self.get_data().id
    }

    /// Returns the surface scattering model.
    fn bsdf(&self) -> &dyn BSDF {
        self.get_data().bsdf.as_ref()
    }

    /// Returns the emitter attached to the surface.
    fn emitter(&self) -> Option<usize> {
        self.get_data().emitter
    }

    /// Returns a bounding box in world space.
    fn bbox(&self) -> Bounds3f;

    /// Returns the closest intersection as `(t, prim_index, prim_uv)`.
    ///
    /// * `ray` - The ray.
    fn ray_intersect_preliminary(&self, ray: &Ray) -> Option<(Float, u32, Point2f)>;

    /// Returns `true` if the ray hits the shape.
    ///
    /// * `ray` - The ray.
    fn ray_test(&self, ray: &Ray) -> bool {
        self.ray_intersect_preliminary(ray).is_some()
    }

    /// Reconstructs the full surface interaction. With
    /// `RayFlags::FOLLOW_SHAPE` the position is a function of the detached
    /// local coordinates and attached shape parameters; otherwise the
    /// position slides along the detached ray with attached distance.
    ///
    /// * `ray`   - The ray that produced the intersection.
    /// * `pi`    - The preliminary intersection.
    /// * `flags` - Reconstruction flags.
    fn compute_surface_interaction(
        &self,
        ray: &Ray,
        pi: &PreliminaryIntersection,
        flags: RayFlags,
    ) -> SurfaceInteraction;

    /// Evaluates the surface at fixed local coordinates; derivatives follow
    /// the shape parameters.
    ///
    /// * `prim_index` - Primitive index.
    /// * `prim_uv`    - Local coordinates on the primitive.
    fn eval_parameterization(&self, prim_index: u32, prim_uv: &Point2f) -> SurfaceInteraction;

    /// Returns the surface area.
    fn surface_area(&self) -> Float;

    /// Samples a point uniformly by area.
    ///
    /// * `u` - Sample value to use.
    fn sample_position(&self, u: &Point2f) -> PositionSample;

    /// Returns the area density of `sample_position`.
    ///
    /// * `ps` - The position sample.
    fn pdf_position(&self, _ps: &PositionSample) -> Float {
        1.0 / self.surface_area()
    }

    /// Returns `true` if the geometry depends on a gradient-enabled
    /// parameter.
    fn is_differentiable(&self) -> bool;

    /// Returns the kinds of discontinuities the shape produces.
    fn silhouette_discontinuity_types(&self) -> DiscontinuityFlags;

    /// Maps a point of the boundary sample space to a silhouette sample.
    ///
    /// * `u`     - Point in `[0, 1]³`.
    /// * `flags` - Kinds of discontinuities to sample.
    fn sample_silhouette(&self, u: &Point3f, flags: DiscontinuityFlags) -> SilhouetteSample;

    /// Inverse of `sample_silhouette`.
    ///
    /// * `ss` - A silhouette sample produced by this shape.
    fn invert_silhouette_sample(&self, ss: &SilhouetteSample) -> Point3f;

    /// Finds the primitives forming silhouettes as seen from a viewpoint and
    /// their sampling weights.
    ///
    /// * `viewpoint` - The viewpoint.
    fn precompute_silhouette(&self, viewpoint: &Point3f) -> (Vec<u32>, Vec<Float>);

    /// Samples a point on a precomputed silhouette primitive. The pdf is with
    /// respect to length along the silhouette curve.
    ///
    /// * `viewpoint` - The viewpoint.
    /// * `index`     - Primitive index returned by `precompute_silhouette`.
    /// * `u`         - Sample value to use.
    fn sample_precomputed_silhouette(&self, viewpoint: &Point3f, index: u32, u: Float) -> SilhouetteSample;

    /// Projects a surface point onto a nearby silhouette as seen from the
    /// viewpoint.
    ///
    /// * `viewpoint` - The viewpoint.
    /// * `si`        - A point on the shape.
    /// * `flags`     - Kinds of discontinuities to consider.
    /// * `u`         - Sample value to use.
    fn primitive_silhouette_projection(
        &self,
        viewpoint: &Point3f,
        si: &SurfaceInteraction,
        flags: DiscontinuityFlags,
        u: Float,
    ) -> SilhouetteSample;

    /// Returns the silhouette point attached to the shape parameters. Only
    /// its derivative is meaningful.
    ///
    /// * `ss` - The silhouette sample.
    fn differential_motion(&self, ss: &SilhouetteSample) -> Point3r {
        let si = self.eval_parameterization(ss.prim_index, &ss.prim_uv);
        Point3r::replace_grad(&ss.p, &si.p)
    }

    /// Visits every differentiable parameter under `<id>.<name>` keys.
    ///
    /// * `cb` - Callback receiving the key and a mutable reference.
    fn traverse(&mut self, cb: &mut dyn FnMut(&str, &mut Real));

    /// Rebuilds derived data after parameters changed.
    fn parameters_changed(&mut self) {}
}

/// Returns the key `<prefix>.<name>`.
///
/// * `prefix` - Object identifier.
/// * `name`   - Parameter name.
pub fn param_key(prefix: &str, name: &str) -> String {
    format!("{}.{}", prefix, name)
}

/// Visits the three components of a differentiable vector.
///
/// * `prefix` - Key prefix (e.g. `sphere.center`).
/// * `v`      - The vector.
/// * `cb`     - Callback.
pub fn traverse_vector(prefix: &str, v: &mut Vector3r, cb: &mut dyn FnMut(&str, &mut Real)) {
    cb(&param_key(prefix, "x"), &mut v.x);
    cb(&param_key(prefix, "y"), &mut v.y);
    cb(&param_key(prefix, "z"), &mut v.z);
}

/// Orients the normal of a boundary segment with tangent `e` and direction
/// `d` so that it points away from the surface lying towards `inward`.
/// Returns `None` when `e` and `d` are parallel.
///
/// * `e`      - Unit tangent of the discontinuity curve.
/// * `d`      - Unit direction of the boundary segment.
/// * `inward` - Vector from the curve into the surface.
pub fn boundary_normal(e: &Vector3f, d: &Vector3f, inward: &Vector3f) -> Option<Normal3f> {
    let n = e.cross(d);
    let len = n.length();
    if len < 1e-6 {
        return None;
    }
    let n = n / len;
    Some(if n.dot(inward) > 0.0 { -n } else { n })
}
