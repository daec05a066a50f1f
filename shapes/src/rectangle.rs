//! Rectangles

use crate::common::*;
use prb_core::ad::*;
use prb_core::bsdf::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::pbrt::*;
use prb_core::sampling::*;
use prb_core::shape::*;

/// Corners of the local domain in perimeter order.
const CORNERS: [(Float, Float); 5] = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)];

/// A parallelogram `c + (2u - 1) a + (2v - 1) b` with a differentiable
/// center. The normal is `a × b`; only the front side emits when the
/// rectangle carries an area light.
pub struct Rectangle {
    /// Common shape data.
    pub data: ShapeData,

    /// Center.
    pub center: Vector3r,

    /// Half extent along the first axis.
    pub half_u: Vector3f,

    /// Half extent along the second axis.
    pub half_v: Vector3f,
}

impl Rectangle {
    /// Create a new rectangle.
    ///
    /// * `id`     - Identifier.
    /// * `center` - Center.
    /// * `half_u` - Half extent along the first axis.
    /// * `half_v` - Half extent along the second axis; should be
    ///              perpendicular to `half_u`.
    /// * `bsdf`   - Surface scattering model.
    pub fn new(id: &str, center: Point3f, half_u: Vector3f, half_v: Vector3f, bsdf: Box<dyn BSDF>) -> Self {
        if half_u.dot(&half_v).abs() > 1e-4 * half_u.length() * half_v.length() {
            warn!("Rectangle '{}' has non-perpendicular axes", id);
        }
        Self {
            data: ShapeData::new(id, bsdf),
            center: Vector3r::from(center),
            half_u,
            half_v,
        }
    }

    /// Returns the unit normal.
    fn normal(&self) -> Normal3f {
        self.half_u.cross(&self.half_v).normalize()
    }

    /// Returns the detached point at local coordinates.
    ///
    /// * `uv` - Local coordinates.
    fn point(&self, uv: &Point2f) -> Point3f {
        self.center.value() + self.half_u * (2.0 * uv.x - 1.0) + self.half_v * (2.0 * uv.y - 1.0)
    }

    /// Returns the lengths of the four edges.
    fn edge_lengths(&self) -> [Float; 4] {
        let (lu, lv) = (2.0 * self.half_u.length(), 2.0 * self.half_v.length());
        [lu, lv, lu, lv]
    }

    /// Returns the local coordinates and unit tangent of the point at
    /// fraction `f` along edge `k`.
    ///
    /// * `k` - Edge index.
    /// * `f` - Fraction along the edge.
    fn edge_point(&self, k: usize, f: Float) -> (Point2f, Vector3f) {
        let (a, b) = (CORNERS[k], CORNERS[k + 1]);
        let uv = Point2f::new(lerp(f, a.0, b.0), lerp(f, a.1, b.1));
        let e = (self.point(&Point2f::new(b.0, b.1)) - self.point(&Point2f::new(a.0, a.1))).normalize();
        (uv, e)
    }

    /// Returns the edge closest to local coordinates and the fraction of the
    /// projected point along it.
    ///
    /// * `uv` - Local coordinates.
    fn nearest_edge(uv: &Point2f) -> (usize, Float) {
        let dist = [uv.y, 1.0 - uv.x, 1.0 - uv.y, uv.x];
        let k = (0..4).fold(0, |best, k| if dist[k] < dist[best] { k } else { best });
        let f = match k {
            0 => uv.x,
            1 => uv.y,
            2 => 1.0 - uv.x,
            _ => 1.0 - uv.y,
        };
        (k, clamp(f, 0.0, 1.0))
    }

    /// Builds the silhouette sample at fraction `f` along edge `k`.
    ///
    /// * `k`   - Edge index.
    /// * `f`   - Fraction along the edge.
    /// * `d`   - Direction of the boundary segment.
    /// * `pdf` - Sampling density.
    fn edge_sample(&self, k: usize, f: Float, d: Vector3f, pdf: Float) -> SilhouetteSample {
        let (uv, e) = self.edge_point(k, f);
        let p = self.point(&uv);
        let inward = self.center.value() - p;
        let mut ss = perimeter_sample(p, e, d, &inward, pdf);
        ss.prim_uv = uv;
        ss
    }

    /// Returns `true` if the viewpoint lies in the plane of the rectangle.
    ///
    /// * `viewpoint` - The viewpoint.
    fn is_edge_on(&self, viewpoint: &Point3f) -> bool {
        self.normal().dot(&(*viewpoint - self.center.value())).abs() < 1e-6
    }
}

impl Shape for Rectangle {
    fn get_type(&self) -> &'static str {
        "rectangle"
    }

    fn get_data(&self) -> &ShapeData {
        &self.data
    }

    fn get_data_mut(&mut self) -> &mut ShapeData {
        &mut self.data
    }

    fn bbox(&self) -> Bounds3f {
        CORNERS[..4]
            .iter()
            .fold(Bounds3f::EMPTY, |b, c| b.union_point(&self.point(&Point2f::new(c.0, c.1))))
    }

    fn ray_intersect_preliminary(&self, ray: &Ray) -> Option<(Float, u32, Point2f)> {
        let n = self.normal();
        let c = self.center.value();
        let denom = n.dot(&ray.d);
        if denom == 0.0 {
            return None;
        }
        let t = n.dot(&(c - ray.o)) / denom;
        if !(t > T_MIN && t < ray.t_max) {
            return None;
        }
        let q = ray.at(t) - c;
        let u = 0.5 * (q.dot(&self.half_u) / self.half_u.length_squared() + 1.0);
        let v = 0.5 * (q.dot(&self.half_v) / self.half_v.length_squared() + 1.0);
        if (0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v) {
            Some((t, 0, Point2f::new(u, v)))
        } else {
            None
        }
    }

    fn compute_surface_interaction(
        &self,
        ray: &Ray,
        pi: &PreliminaryIntersection,
        flags: RayFlags,
    ) -> SurfaceInteraction {
        finish_interaction(ray, pi, flags, self.eval_parameterization(pi.prim_index, &pi.prim_uv))
    }

    fn eval_parameterization(&self, _prim_index: u32, prim_uv: &Point2f) -> SurfaceInteraction {
        let offset = self.half_u * (2.0 * prim_uv.x - 1.0) + self.half_v * (2.0 * prim_uv.y - 1.0);
        let p = self.center + Vector3r::from(offset);
        let n = Vector3r::from(self.normal());
        let mut si = SurfaceInteraction::new(
            Real::from(0.0),
            p,
            n,
            Point2r::from(*prim_uv),
            Vector3r::from(self.half_u * 2.0),
            Vector3r::from(self.half_v * 2.0),
            &n,
        );
        si.prim_uv = *prim_uv;
        si
    }

    fn surface_area(&self) -> Float {
        4.0 * self.half_u.cross(&self.half_v).length()
    }

    fn sample_position(&self, u: &Point2f) -> PositionSample {
        let si = self.eval_parameterization(0, u);
        PositionSample {
            p: si.p,
            n: si.n,
            pdf: 1.0 / self.surface_area(),
            delta: false,
            prim_index: 0,
            prim_uv: *u,
        }
    }

    fn is_differentiable(&self) -> bool {
        self.center.is_attached()
    }

    fn silhouette_discontinuity_types(&self) -> DiscontinuityFlags {
        DiscontinuityFlags::PERIMETER
    }

    /// Samples a point along the perimeter with `u.x` and a direction on
    /// the sphere with `(u.y, u.z)`.
    fn sample_silhouette(&self, u: &Point3f, flags: DiscontinuityFlags) -> SilhouetteSample {
        if !flags.contains(DiscontinuityFlags::PERIMETER) {
            return SilhouetteSample::default();
        }
        let lengths = self.edge_lengths();
        let perimeter: Float = lengths.iter().sum();
        let mut s = u.x * perimeter;
        let mut k = 0;
        while k < 3 && s >= lengths[k] {
            s -= lengths[k];
            k += 1;
        }
        let d = uniform_sample_sphere(&Point2f::new(u.y, u.z));
        self.edge_sample(k, clamp(s / lengths[k], 0.0, 1.0), d, INV_FOUR_PI / perimeter)
    }

    fn invert_silhouette_sample(&self, ss: &SilhouetteSample) -> Point3f {
        let lengths = self.edge_lengths();
        let perimeter: Float = lengths.iter().sum();
        let (k, f) = Self::nearest_edge(&ss.prim_uv);
        let s: Float = lengths[..k].iter().sum::<Float>() + f * lengths[k];
        let uv = uniform_sphere_to_square(&ss.d);
        Point3f::new(clamp(s / perimeter, 0.0, ONE_MINUS_EPSILON), uv.x, uv.y)
    }

    fn precompute_silhouette(&self, viewpoint: &Point3f) -> (Vec<u32>, Vec<Float>) {
        if self.is_edge_on(viewpoint) {
            return (vec![], vec![]);
        }
        ((0..4).collect(), self.edge_lengths().to_vec())
    }

    fn sample_precomputed_silhouette(&self, viewpoint: &Point3f, index: u32, u: Float) -> SilhouetteSample {
        let k = (index as usize).min(3);
        let (uv, _) = self.edge_point(k, u);
        match view_direction(viewpoint, &self.point(&uv)) {
            Some(d) => self.edge_sample(k, u, d, 1.0 / self.edge_lengths()[k]),
            None => SilhouetteSample::default(),
        }
    }

    /// Moves the point to the closest edge in local coordinates.
    fn primitive_silhouette_projection(
        &self,
        viewpoint: &Point3f,
        si: &SurfaceInteraction,
        flags: DiscontinuityFlags,
        _u: Float,
    ) -> SilhouetteSample {
        if !flags.contains(DiscontinuityFlags::PERIMETER) || self.is_edge_on(viewpoint) {
            return SilhouetteSample::default();
        }
        let (k, f) = Self::nearest_edge(&si.prim_uv);
        self.sample_precomputed_silhouette(viewpoint, k as u32, f)
    }

    fn traverse(&mut self, cb: &mut dyn FnMut(&str, &mut Real)) {
        let id = self.data.id.clone();
        traverse_vector(&param_key(&id, "center"), &mut self.center, cb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use materials::*;
    use prb_core::spectrum::*;
    use proptest::prelude::*;

    fn rect() -> Rectangle {
        Rectangle::new(
            "occluder",
            Point3f::new(1.5, 0.0, 2.0),
            Vector3f::new(1.5, 0.0, 0.0),
            Vector3f::new(0.0, 1.0, 0.0),
            Box::new(Diffuse::new(SpectrumF::zero())),
        )
    }

    #[test]
    fn hit_reports_local_coordinates() {
        let r = rect();
        let ray = Ray::new(Point3f::new(0.75, 0.5, 5.0), Vector3f::new(0.0, 0.0, -1.0));
        let (t, _, uv) = r.ray_intersect_preliminary(&ray).unwrap();
        assert!(approx_eq!(f32, t, 3.0, epsilon = 1e-5));
        assert!(approx_eq!(f32, uv.x, 0.25, epsilon = 1e-5));
        assert!(approx_eq!(f32, uv.y, 0.75, epsilon = 1e-5));
        assert!(r.ray_intersect_preliminary(&Ray::new(Point3f::new(3.5, 0.0, 5.0), ray.d)).is_none());
    }

    proptest! {
        #[test]
        fn perimeter_samples_invert(x in 0.0f32..0.999, y in 0.01f32..0.99, z in 0.0f32..0.999) {
            let r = rect();
            let ss = r.sample_silhouette(&Point3f::new(x, y, z), DiscontinuityFlags::ALL);
            prop_assume!(ss.is_valid());
            prop_assert!(ss.n.dot(&ss.d).abs() < 1e-4);
            prop_assert!(ss.n.dot(&(r.center.value() - ss.p)) <= 1e-4);
            let u = r.invert_silhouette_sample(&ss);
            prop_assert!((u.x - x).abs() < 1e-3);
        }
    }

    #[test]
    fn edge_motion_follows_center() {
        let mut r = rect();
        r.center.x = Real::variable(1.5, 0);
        let ss = r.sample_precomputed_silhouette(&Point3f::new(0.0, -6.0, 1.0), 1, 0.5);
        assert!(ss.is_valid());
        let v = r.differential_motion(&ss);
        assert_eq!(v.x.grad_at(0), 1.0);
        assert_eq!(v.value(), ss.p);
    }
}
