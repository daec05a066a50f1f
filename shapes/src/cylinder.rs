//! Cylinders

use crate::common::*;
use prb_core::ad::*;
use prb_core::bsdf::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::pbrt::*;
use prb_core::sampling::*;
use prb_core::shape::*;

/// An open cylinder (no caps) with differentiable base center, radius and
/// height. Local coordinates are `(φ / 2π, v)` where `v` is the fractional
/// height along the axis.
///
/// The boundary sample space is split in half along `u.x`: the lower half
/// samples the two rims, the upper half samples lateral tangent lines.
pub struct Cylinder {
    /// Common shape data.
    pub data: ShapeData,

    /// Center of the base rim.
    pub center: Vector3r,

    /// Radius.
    pub radius: Real,

    /// Height along the axis.
    pub height: Real,

    /// Basis whose normal is the axis.
    frame: Framef,
}

impl Cylinder {
    /// Create a new cylinder.
    ///
    /// * `id`     - Identifier.
    /// * `center` - Center of the base rim.
    /// * `axis`   - Direction of the axis.
    /// * `radius` - Radius.
    /// * `height` - Height along the axis.
    /// * `bsdf`   - Surface scattering model.
    pub fn new(id: &str, center: Point3f, axis: Vector3f, radius: Float, height: Float, bsdf: Box<dyn BSDF>) -> Self {
        Self {
            data: ShapeData::new(id, bsdf),
            center: Vector3r::from(center),
            radius: Real::from(radius),
            height: Real::from(height),
            frame: Framef::from_normal(&axis.normalize()),
        }
    }

    /// Returns the unit radial direction at angle `phi`.
    fn radial(&self, phi: Float) -> Vector3f {
        self.frame.s * phi.cos() + self.frame.t * phi.sin()
    }

    /// Returns the unit circumferential tangent at angle `phi`.
    fn tangent(&self, phi: Float) -> Vector3f {
        self.frame.t * phi.cos() - self.frame.s * phi.sin()
    }

    /// Returns the detached point at local coordinates.
    fn point(&self, phi: Float, v: Float) -> Point3f {
        self.center.value() + self.frame.n * (v * self.height.value()) + self.radial(phi) * self.radius.value()
    }

    /// Returns the two lateral tangent angles and the perpendicular distance
    /// of the viewpoint from the axis, or `None` if it is inside.
    fn lateral_angles(&self, viewpoint: &Point3f) -> Option<[Float; 2]> {
        let q = self.frame.to_local(&(*viewpoint - self.center.value()));
        let dist = (q.x * q.x + q.y * q.y).sqrt();
        let r = self.radius.value();
        if dist <= r * (1.0 + 1e-4) {
            return None;
        }
        let phi_q = q.y.atan2(q.x);
        let beta = (r / dist).acos();
        Some([phi_q - beta, phi_q + beta])
    }

    /// Builds the silhouette sample on a rim.
    ///
    /// * `top` - `true` for the rim at `v = 1`.
    /// * `phi` - Angle on the rim.
    /// * `d`   - Direction of the boundary segment.
    /// * `pdf` - Sampling density.
    fn rim_sample(&self, top: bool, phi: Float, d: Vector3f, pdf: Float) -> SilhouetteSample {
        let v = if top { 1.0 } else { 0.0 };
        let inward = if top { -self.frame.n } else { self.frame.n };
        let mut ss = perimeter_sample(self.point(phi, v), self.tangent(phi), d, &inward, pdf);
        ss.prim_uv = Point2f::new(wrap_unit(phi * INV_TWO_PI), v);
        ss
    }

    /// Builds the silhouette sample on the lateral surface.
    ///
    /// * `phi` - Angle of the tangent line.
    /// * `v`   - Fractional height.
    /// * `d`   - Direction of the boundary segment, tangent to the surface.
    /// * `pdf` - Sampling density.
    fn lateral_sample(&self, phi: Float, v: Float, d: Vector3f, pdf: Float) -> SilhouetteSample {
        let t_phi = self.tangent(phi);
        let along = d.dot(&t_phi);
        let foreshortening = along * along / self.radius.value();
        let mut ss = interior_sample(self.point(phi, v), self.radial(phi), d, pdf, foreshortening);
        ss.prim_uv = Point2f::new(wrap_unit(phi * INV_TWO_PI), v);
        ss
    }
}

/// Wraps a value into `[0, 1)`.
fn wrap_unit(x: Float) -> Float {
    let f = x - x.floor();
    if f >= 1.0 {
        0.0
    } else {
        f
    }
}

impl Shape for Cylinder {
    fn get_type(&self) -> &'static str {
        "cylinder"
    }

    fn get_data(&self) -> &ShapeData {
        &self.data
    }

    fn get_data_mut(&mut self) -> &mut ShapeData {
        &mut self.data
    }

    fn bbox(&self) -> Bounds3f {
        let r = Vector3f::splat(self.radius.value());
        let base = self.center.value();
        let top = base + self.frame.n * self.height.value();
        Bounds3f::new(base - r, base + r).union(&Bounds3f::new(top - r, top + r))
    }

    fn ray_intersect_preliminary(&self, ray: &Ray) -> Option<(Float, u32, Point2f)> {
        let o = self.frame.to_local(&(ray.o - self.center.value()));
        let d = self.frame.to_local(&ray.d);
        let r = self.radius.value();
        let h = self.height.value();
        let a = d.x * d.x + d.y * d.y;
        if a == 0.0 {
            return None;
        }
        let b = o.x * d.x + o.y * d.y;
        let c = o.x * o.x + o.y * o.y - r * r;
        let disc = b * b - a * c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        [(-b - sq) / a, (-b + sq) / a].into_iter().find_map(|t| {
            let z = o.z + t * d.z;
            if t > T_MIN && t < ray.t_max && (0.0..=h).contains(&z) {
                let mut phi = (o.y + t * d.y).atan2(o.x + t * d.x);
                if phi < 0.0 {
                    phi += TWO_PI;
                }
                Some((t, 0, Point2f::new(phi * INV_TWO_PI, z / h)))
            } else {
                None
            }
        })
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
        let phi = TWO_PI * prim_uv.x;
        let radial = Vector3r::from(self.radial(phi));
        let axis = Vector3r::from(self.frame.n);
        let p = self.center + axis * (self.height * prim_uv.y) + radial * self.radius;
        let dp_du = Vector3r::from(self.tangent(phi) * TWO_PI) * self.radius;
        let dp_dv = axis * self.height;
        let mut si = SurfaceInteraction::new(Real::from(0.0), p, radial, Point2r::from(*prim_uv), dp_du, dp_dv, &radial);
        si.prim_uv = *prim_uv;
        si
    }

    fn surface_area(&self) -> Float {
        TWO_PI * self.radius.value() * self.height.value()
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
        self.center.is_attached() || self.radius.is_attached() || self.height.is_attached()
    }

    fn silhouette_discontinuity_types(&self) -> DiscontinuityFlags {
        DiscontinuityFlags::ALL
    }

    /// `u.x < 0.5` selects a rim (which one and the angle come from
    /// `4 u.x`) and a direction on the sphere from `(u.y, u.z)`. Otherwise
    /// `2 u.x - 1` is the angle, `u.y` the height and `u.z` the direction
    /// within the tangent plane.
    fn sample_silhouette(&self, u: &Point3f, flags: DiscontinuityFlags) -> SilhouetteSample {
        if u.x < 0.5 {
            if !flags.contains(DiscontinuityFlags::PERIMETER) {
                return SilhouetteSample::default();
            }
            let s = 4.0 * u.x;
            let top = s >= 1.0;
            let phi = TWO_PI * (s - s.floor());
            let d = uniform_sample_sphere(&Point2f::new(u.y, u.z));
            let pdf = 0.5 * INV_FOUR_PI / (2.0 * TWO_PI * self.radius.value());
            self.rim_sample(top, phi, d, pdf)
        } else {
            if !flags.contains(DiscontinuityFlags::INTERIOR) {
                return SilhouetteSample::default();
            }
            let phi = TWO_PI * (2.0 * u.x - 1.0);
            let alpha = TWO_PI * u.z;
            let d = self.frame.n * alpha.cos() + self.tangent(phi) * alpha.sin();
            let pdf = 0.5 * INV_TWO_PI / self.surface_area();
            self.lateral_sample(phi, u.y, d, pdf)
        }
    }

    fn invert_silhouette_sample(&self, ss: &SilhouetteSample) -> Point3f {
        if ss.discontinuity.contains(DiscontinuityFlags::PERIMETER) {
            let rim = if ss.prim_uv.y > 0.5 { 1.0 } else { 0.0 };
            let uv = uniform_sphere_to_square(&ss.d);
            Point3f::new(0.25 * (rim + ss.prim_uv.x), uv.x, uv.y)
        } else {
            let t_phi = self.tangent(TWO_PI * ss.prim_uv.x);
            let alpha = wrap_unit(ss.d.dot(&t_phi).atan2(ss.d.dot(&self.frame.n)) * INV_TWO_PI);
            Point3f::new(
                clamp(0.5 + 0.5 * ss.prim_uv.x, 0.5, ONE_MINUS_EPSILON),
                ss.prim_uv.y,
                alpha,
            )
        }
    }

    /// Rims are primitives 0 (base) and 1 (top); lateral tangent lines are
    /// primitives 2 and 3.
    fn precompute_silhouette(&self, viewpoint: &Point3f) -> (Vec<u32>, Vec<Float>) {
        let rim_length = TWO_PI * self.radius.value();
        let mut prims = vec![0, 1];
        let mut weights = vec![rim_length, rim_length];
        if self.lateral_angles(viewpoint).is_some() {
            prims.extend([2, 3]);
            weights.extend([self.height.value(); 2]);
        }
        (prims, weights)
    }

    fn sample_precomputed_silhouette(&self, viewpoint: &Point3f, index: u32, u: Float) -> SilhouetteSample {
        match index {
            0 | 1 => {
                let phi = TWO_PI * u;
                let top = index == 1;
                let p = self.point(phi, if top { 1.0 } else { 0.0 });
                match view_direction(viewpoint, &p) {
                    Some(d) => self.rim_sample(top, phi, d, 1.0 / (TWO_PI * self.radius.value())),
                    None => SilhouetteSample::default(),
                }
            }
            _ => match self.lateral_angles(viewpoint) {
                Some(angles) => {
                    let phi = angles[(index as usize - 2).min(1)];
                    match view_direction(viewpoint, &self.point(phi, u)) {
                        Some(d) => self.lateral_sample(phi, u, d, 1.0 / self.height.value()),
                        None => SilhouetteSample::default(),
                    }
                }
                None => SilhouetteSample::default(),
            },
        }
    }

    /// Lateral points move around the axis to the nearest tangent line and
    /// keep their height. Rim projections keep the angle.
    fn primitive_silhouette_projection(
        &self,
        viewpoint: &Point3f,
        si: &SurfaceInteraction,
        flags: DiscontinuityFlags,
        _u: Float,
    ) -> SilhouetteSample {
        if flags.contains(DiscontinuityFlags::INTERIOR) {
            if let Some(angles) = self.lateral_angles(viewpoint) {
                let phi = TWO_PI * si.prim_uv.x;
                let dist = |a: Float| {
                    let diff = wrap_unit((a - phi) * INV_TWO_PI);
                    diff.min(1.0 - diff)
                };
                let index = if dist(angles[0]) <= dist(angles[1]) { 2 } else { 3 };
                return self.sample_precomputed_silhouette(viewpoint, index, si.prim_uv.y);
            }
        }
        if flags.contains(DiscontinuityFlags::PERIMETER) {
            let index = if si.prim_uv.y > 0.5 { 1 } else { 0 };
            return self.sample_precomputed_silhouette(viewpoint, index, si.prim_uv.x);
        }
        SilhouetteSample::default()
    }

    fn traverse(&mut self, cb: &mut dyn FnMut(&str, &mut Real)) {
        let id = self.data.id.clone();
        traverse_vector(&param_key(&id, "center"), &mut self.center, cb);
        cb(&param_key(&id, "radius"), &mut self.radius);
        cb(&param_key(&id, "height"), &mut self.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use materials::*;
    use prb_core::spectrum::*;
    use proptest::prelude::*;

    fn cylinder() -> Cylinder {
        Cylinder::new(
            "pillar",
            Point3f::new(0.0, 0.0, 0.0),
            Vector3f::new(0.0, 0.0, 1.0),
            0.5,
            2.0,
            Box::new(Diffuse::new(SpectrumF::splat(0.4))),
        )
    }

    #[test]
    fn side_hit_reports_height() {
        let c = cylinder();
        let ray = Ray::new(Point3f::new(3.0, 0.0, 0.5), Vector3f::new(-1.0, 0.0, 0.0));
        let (t, _, uv) = c.ray_intersect_preliminary(&ray).unwrap();
        assert!(approx_eq!(f32, t, 2.5, epsilon = 1e-5));
        assert!(approx_eq!(f32, uv.y, 0.25, epsilon = 1e-5));
        let above = Ray::new(Point3f::new(3.0, 0.0, 2.5), ray.d);
        assert!(c.ray_intersect_preliminary(&above).is_none());
    }

    proptest! {
        #[test]
        fn lateral_samples_invert(x in 0.5f32..0.999, y in 0.0f32..1.0, z in 0.001f32..0.999) {
            let c = cylinder();
            let ss = c.sample_silhouette(&Point3f::new(x, y, z), DiscontinuityFlags::ALL);
            prop_assume!(ss.is_valid());
            prop_assert_eq!(ss.discontinuity, DiscontinuityFlags::INTERIOR);
            prop_assert!(ss.n.dot(&ss.d).abs() < 1e-4);
            let u = c.invert_silhouette_sample(&ss);
            prop_assert!((u.x - x).abs() < 1e-3 && (u.y - y).abs() < 1e-4 && (u.z - z).abs() < 1e-3);
        }

        #[test]
        fn rim_samples_invert(x in 0.0f32..0.499, y in 0.01f32..0.99, z in 0.0f32..0.999) {
            let c = cylinder();
            let ss = c.sample_silhouette(&Point3f::new(x, y, z), DiscontinuityFlags::ALL);
            prop_assume!(ss.is_valid());
            prop_assert_eq!(ss.discontinuity, DiscontinuityFlags::PERIMETER);
            let u = c.invert_silhouette_sample(&ss);
            prop_assert!((u.x - x).abs() < 1e-3);
        }
    }

    #[test]
    fn lateral_lines_are_seen_edge_on() {
        let c = cylinder();
        let vp = Point3f::new(0.0, -3.0, 1.0);
        let (prims, weights) = c.precompute_silhouette(&vp);
        assert_eq!(prims, vec![0, 1, 2, 3]);
        assert_eq!(weights[2], 2.0);
        for index in [2, 3] {
            let ss = c.sample_precomputed_silhouette(&vp, index, 0.3);
            assert!(ss.is_valid());
            assert!((ss.p - vp).dot(&ss.n).abs() < 1e-4);
        }
    }

    #[test]
    fn projection_keeps_height() {
        let c = cylinder();
        let vp = Point3f::new(0.0, -3.0, 1.0);
        let si = c.eval_parameterization(0, &Point2f::new(0.75, 0.6));
        let ss = c.primitive_silhouette_projection(&vp, &si, DiscontinuityFlags::ALL, 0.5);
        assert!(ss.is_valid());
        assert!(approx_eq!(f32, ss.p.z, 1.2, epsilon = 1e-5));
        assert!((ss.p - vp).dot(&ss.n).abs() < 1e-4);
    }

    #[test]
    fn rim_moves_with_height() {
        let mut c = cylinder();
        c.height = Real::variable(2.0, 3);
        let ss = c.sample_precomputed_silhouette(&Point3f::new(0.0, -3.0, 5.0), 1, 0.1);
        assert!(ss.is_valid());
        let v = c.differential_motion(&ss);
        assert!(approx_eq!(f32, v.z.grad_at(3), 1.0, epsilon = 1e-6));
    }
}
