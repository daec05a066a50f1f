//! Spheres

use crate::common::*;
use prb_core::ad::*;
use prb_core::bsdf::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::pbrt::*;
use prb_core::sampling::*;
use prb_core::shape::*;

/// A sphere with differentiable center and radius. Local coordinates are
/// `(φ / 2π, θ / π)` in spherical coordinates around the center.
pub struct Sphere {
    /// Common shape data.
    pub data: ShapeData,

    /// Center of the sphere.
    pub center: Vector3r,

    /// Radius of sphere.
    pub radius: Real,
}

impl Sphere {
    /// Create a new sphere.
    ///
    /// * `id`     - Identifier.
    /// * `center` - Center of the sphere.
    /// * `radius` - Radius of sphere.
    /// * `bsdf`   - Surface scattering model.
    pub fn new(id: &str, center: Point3f, radius: Float, bsdf: Box<dyn BSDF>) -> Self {
        Self {
            data: ShapeData::new(id, bsdf),
            center: Vector3r::from(center),
            radius: Real::from(radius),
        }
    }

    /// Returns the detached center and radius.
    fn values(&self) -> (Point3f, Float) {
        (self.center.value(), self.radius.value())
    }

    /// Returns the unit direction of local coordinates.
    ///
    /// * `uv` - Local coordinates.
    fn direction(uv: &Point2f) -> Vector3f {
        let (phi, theta) = (TWO_PI * uv.x, PI * uv.y);
        Vector3f::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
    }

    /// Returns the local coordinates of a unit direction.
    ///
    /// * `d` - Unit direction from the center.
    fn local_coordinates(d: &Vector3f) -> Point2f {
        let mut phi = d.y.atan2(d.x);
        if phi < 0.0 {
            phi += TWO_PI;
        }
        Point2f::new(phi * INV_TWO_PI, safe_acos(d.z) * INV_PI)
    }

    /// Returns the center, radius and basis of the circle along which the
    /// sphere is tangent to rays from a viewpoint, or `None` when the
    /// viewpoint is inside.
    ///
    /// * `viewpoint` - The viewpoint.
    fn tangent_circle(&self, viewpoint: &Point3f) -> Option<(Point3f, Float, Framef)> {
        let (c, r) = self.values();
        let v = *viewpoint - c;
        let dist = v.length();
        if dist <= r * (1.0 + 1e-4) {
            return None;
        }
        let axis = v / dist;
        let center = c + axis * (r * r / dist);
        let rho = r * (1.0 - r * r / (dist * dist)).max(0.0).sqrt();
        Some((center, rho, Framef::from_normal(&axis)))
    }

    /// Builds the silhouette sample for a point on the tangent circle.
    ///
    /// * `viewpoint` - The viewpoint.
    /// * `p`         - Point on the tangent circle.
    /// * `pdf`       - Sampling density.
    fn tangent_sample(&self, viewpoint: &Point3f, p: Point3f, pdf: Float) -> SilhouetteSample {
        let (c, r) = self.values();
        let n = (p - c) / r;
        match view_direction(viewpoint, &p) {
            Some(d) => {
                let mut ss = interior_sample(p, n, d, pdf, 1.0 / r);
                ss.prim_uv = Self::local_coordinates(&n);
                ss
            }
            None => SilhouetteSample::default(),
        }
    }
}

impl Shape for Sphere {
    fn get_type(&self) -> &'static str {
        "sphere"
    }

    fn get_data(&self) -> &ShapeData {
        &self.data
    }

    fn get_data_mut(&mut self) -> &mut ShapeData {
        &mut self.data
    }

    fn bbox(&self) -> Bounds3f {
        let (c, r) = self.values();
        Bounds3f::new(c - Vector3f::splat(r), c + Vector3f::splat(r))
    }

    fn ray_intersect_preliminary(&self, ray: &Ray) -> Option<(Float, u32, Point2f)> {
        let (c, r) = self.values();
        let o = ray.o - c;
        let b = o.dot(&ray.d);
        let cc = o.dot(&o) - r * r;
        let disc = b * b - cc;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        let t = [-b - sq, -b + sq].into_iter().find(|t| *t > T_MIN && *t < ray.t_max)?;
        let d = (ray.at(t) - c).normalize();
        Some((t, 0, Self::local_coordinates(&d)))
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
        let (phi, theta) = (TWO_PI * prim_uv.x, PI * prim_uv.y);
        let d = Self::direction(prim_uv);
        let n = Vector3r::from(d);
        let p = self.center + n * self.radius;
        let dp_du = Vector3r::from(Vector3f::new(-theta.sin() * phi.sin(), theta.sin() * phi.cos(), 0.0) * TWO_PI)
            * self.radius;
        let dp_dv = Vector3r::from(Vector3f::new(theta.cos() * phi.cos(), theta.cos() * phi.sin(), -theta.sin()) * PI)
            * self.radius;
        let mut si = SurfaceInteraction::new(
            Real::from(0.0),
            p,
            n,
            Point2r::from(*prim_uv),
            dp_du,
            dp_dv,
            &n,
        );
        si.prim_uv = *prim_uv;
        si
    }

    fn surface_area(&self) -> Float {
        let r = self.radius.value();
        FOUR_PI * r * r
    }

    fn sample_position(&self, u: &Point2f) -> PositionSample {
        let d = uniform_sample_sphere(u);
        let prim_uv = Self::local_coordinates(&d);
        let si = self.eval_parameterization(0, &prim_uv);
        PositionSample {
            p: si.p,
            n: Normal3r::from(d),
            pdf: 1.0 / self.surface_area(),
            delta: false,
            prim_index: 0,
            prim_uv,
        }
    }

    fn is_differentiable(&self) -> bool {
        self.center.is_attached() || self.radius.is_attached()
    }

    fn silhouette_discontinuity_types(&self) -> DiscontinuityFlags {
        DiscontinuityFlags::INTERIOR
    }

    /// Samples a point uniformly on the sphere with `(u.x, u.y)` and a
    /// tangent direction with `u.z`.
    fn sample_silhouette(&self, u: &Point3f, flags: DiscontinuityFlags) -> SilhouetteSample {
        if !flags.contains(DiscontinuityFlags::INTERIOR) {
            return SilhouetteSample::default();
        }
        let (c, r) = self.values();
        let n = uniform_sample_sphere(&Point2f::new(u.x, u.y));
        let frame = Framef::from_normal(&n);
        let alpha = TWO_PI * u.z;
        let d = frame.s * alpha.cos() + frame.t * alpha.sin();
        let pdf = INV_TWO_PI / self.surface_area();
        let mut ss = interior_sample(c + n * r, n, d, pdf, 1.0 / r);
        ss.prim_uv = Self::local_coordinates(&n);
        ss
    }

    fn invert_silhouette_sample(&self, ss: &SilhouetteSample) -> Point3f {
        let (c, _) = self.values();
        let n = (ss.p - c).normalize();
        let uv = uniform_sphere_to_square(&n);
        let frame = Framef::from_normal(&n);
        let mut alpha = ss.d.dot(&frame.t).atan2(ss.d.dot(&frame.s)) * INV_TWO_PI;
        if alpha < 0.0 {
            alpha += 1.0;
        }
        Point3f::new(uv.x, uv.y, clamp(alpha, 0.0, ONE_MINUS_EPSILON))
    }

    fn precompute_silhouette(&self, viewpoint: &Point3f) -> (Vec<u32>, Vec<Float>) {
        match self.tangent_circle(viewpoint) {
            Some((_, rho, _)) => (vec![0], vec![TWO_PI * rho]),
            None => (vec![], vec![]),
        }
    }

    fn sample_precomputed_silhouette(&self, viewpoint: &Point3f, _index: u32, u: Float) -> SilhouetteSample {
        match self.tangent_circle(viewpoint) {
            Some((center, rho, frame)) => {
                let phi = TWO_PI * u;
                let p = center + (frame.s * phi.cos() + frame.t * phi.sin()) * rho;
                self.tangent_sample(viewpoint, p, 1.0 / (TWO_PI * rho))
            }
            None => SilhouetteSample::default(),
        }
    }

    /// Moves the point within the plane through the viewpoint, the center
    /// and the point until it lies on the tangent circle.
    fn primitive_silhouette_projection(
        &self,
        viewpoint: &Point3f,
        si: &SurfaceInteraction,
        flags: DiscontinuityFlags,
        u: Float,
    ) -> SilhouetteSample {
        if !flags.contains(DiscontinuityFlags::INTERIOR) {
            return SilhouetteSample::default();
        }
        let (center, rho, frame) = match self.tangent_circle(viewpoint) {
            Some(circle) => circle,
            None => return SilhouetteSample::default(),
        };
        let v = si.p_f() - center;
        let mut w = v - frame.n * v.dot(&frame.n);
        let len = w.length();
        if len < 1e-6 {
            let phi = TWO_PI * u;
            w = frame.s * phi.cos() + frame.t * phi.sin();
        } else {
            w = w / len;
        }
        self.tangent_sample(viewpoint, center + w * rho, 1.0 / (TWO_PI * rho))
    }

    fn traverse(&mut self, cb: &mut dyn FnMut(&str, &mut Real)) {
        let id = self.data.id.clone();
        traverse_vector(&param_key(&id, "center"), &mut self.center, cb);
        cb(&param_key(&id, "radius"), &mut self.radius);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use materials::*;
    use prb_core::spectrum::*;
    use proptest::prelude::*;

    fn sphere() -> Sphere {
        Sphere::new("ball", Point3f::new(0.0, 0.0, 1.0), 0.5, Box::new(Diffuse::new(SpectrumF::splat(0.5))))
    }

    fn hit_top(s: &Sphere, flags: RayFlags) -> SurfaceInteraction {
        let ray = Ray::new(Point3f::new(0.0, 0.0, 5.0), Vector3f::new(0.0, 0.0, -1.0));
        let (t, prim_index, prim_uv) = s.ray_intersect_preliminary(&ray).unwrap();
        let pi = PreliminaryIntersection {
            t,
            shape: Some(0),
            prim_index,
            prim_uv,
        };
        s.compute_surface_interaction(&ray, &pi, flags)
    }

    #[test]
    fn ray_following_distance_tracks_the_center() {
        let mut s = sphere();
        s.center.z = Real::variable(1.0, 0);
        let si = hit_top(&s, RayFlags::empty());
        assert!(approx_eq!(f32, si.t.value(), 3.5, epsilon = 1e-5));
        assert!(approx_eq!(f32, si.t.grad_at(0), -1.0, epsilon = 1e-4));
        // The point slides along the ray, so its x does not move.
        assert_eq!(si.p.x.grad_at(0), 0.0);
    }

    #[test]
    fn follow_shape_point_moves_rigidly() {
        let mut s = sphere();
        s.center.x = Real::variable(0.0, 2);
        let si = hit_top(&s, RayFlags::FOLLOW_SHAPE);
        assert!(approx_eq!(f32, si.p.x.grad_at(2), 1.0, epsilon = 1e-6));
        assert!(approx_eq!(f32, si.p.z.value(), 1.5, epsilon = 1e-5));
    }

    proptest! {
        #[test]
        fn silhouette_samples_are_tangent(x in 0.0f32..1.0, y in 0.0f32..1.0, z in 0.0f32..0.999) {
            let s = sphere();
            let ss = s.sample_silhouette(&Point3f::new(x, y, z), DiscontinuityFlags::ALL);
            prop_assume!(ss.is_valid());
            prop_assert!(ss.n.dot(&ss.d).abs() < 1e-4);
            let u = s.invert_silhouette_sample(&ss);
            prop_assert!((u.x - x).abs() < 1e-3 && (u.z - z).abs() < 1e-3);
        }
    }

    #[test]
    fn precomputed_silhouette_is_seen_edge_on() {
        let s = sphere();
        let vp = Point3f::new(0.0, -4.0, 1.0);
        let (prims, weights) = s.precompute_silhouette(&vp);
        assert_eq!(prims, vec![0]);
        for u in [0.1, 0.4, 0.8] {
            let ss = s.sample_precomputed_silhouette(&vp, 0, u);
            assert!(ss.is_valid());
            assert!((ss.p - vp).dot(&ss.n).abs() < 1e-4);
            assert!(approx_eq!(f32, 1.0 / ss.pdf, weights[0], epsilon = 1e-3));
        }
    }

    #[test]
    fn projection_lands_on_silhouette() {
        let s = sphere();
        let vp = Point3f::new(0.0, -4.0, 1.0);
        let si = s.eval_parameterization(0, &Point2f::new(0.3, 0.4));
        let ss = s.primitive_silhouette_projection(&vp, &si, DiscontinuityFlags::ALL, 0.5);
        assert!(ss.is_valid());
        assert!(approx_eq!(f32, ss.p.distance(&Point3f::new(0.0, 0.0, 1.0)), 0.5, epsilon = 1e-4));
        assert!((ss.p - vp).dot(&ss.n).abs() < 1e-4);
    }
}
