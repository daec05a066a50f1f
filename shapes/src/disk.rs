//! Disks

use crate::common::*;
use prb_core::ad::*;
use prb_core::bsdf::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::pbrt::*;
use prb_core::sampling::*;
use prb_core::shape::*;

/// A flat disk with differentiable center and radius. Local coordinates are
/// the fractional radius and `φ / 2π`.
pub struct Disk {
    /// Common shape data.
    pub data: ShapeData,

    /// Center.
    pub center: Vector3r,

    /// Radius.
    pub radius: Real,

    /// Basis whose normal is the disk normal.
    frame: Framef,
}

impl Disk {
    /// Create a new disk.
    ///
    /// * `id`     - Identifier.
    /// * `center` - Center.
    /// * `normal` - Normal of the front side.
    /// * `radius` - Radius.
    /// * `bsdf`   - Surface scattering model.
    pub fn new(id: &str, center: Point3f, normal: Normal3f, radius: Float, bsdf: Box<dyn BSDF>) -> Self {
        Self {
            data: ShapeData::new(id, bsdf),
            center: Vector3r::from(center),
            radius: Real::from(radius),
            frame: Framef::from_normal(&normal.normalize()),
        }
    }

    /// Returns the unit radial direction at angle `phi`.
    fn radial(&self, phi: Float) -> Vector3f {
        self.frame.s * phi.cos() + self.frame.t * phi.sin()
    }

    /// Returns the unit rim tangent at angle `phi`.
    fn tangent(&self, phi: Float) -> Vector3f {
        self.frame.t * phi.cos() - self.frame.s * phi.sin()
    }

    /// Builds the silhouette sample on the rim at angle `phi`.
    fn rim_sample(&self, phi: Float, d: Vector3f, pdf: Float) -> SilhouetteSample {
        let radial = self.radial(phi);
        let p = self.center.value() + radial * self.radius.value();
        let mut ss = perimeter_sample(p, self.tangent(phi), d, &-radial, pdf);
        ss.prim_uv = Point2f::new(1.0, phi * INV_TWO_PI);
        ss
    }

    /// Returns `true` if the viewpoint lies in the plane of the disk.
    fn is_edge_on(&self, viewpoint: &Point3f) -> bool {
        self.frame.n.dot(&(*viewpoint - self.center.value())).abs() < 1e-6
    }
}

impl Shape for Disk {
    fn get_type(&self) -> &'static str {
        "disk"
    }

    fn get_data(&self) -> &ShapeData {
        &self.data
    }

    fn get_data_mut(&mut self) -> &mut ShapeData {
        &mut self.data
    }

    fn bbox(&self) -> Bounds3f {
        let c = self.center.value();
        let r = self.radius.value();
        let ext = Vector3f::new(
            r * (1.0 - self.frame.n.x * self.frame.n.x).max(0.0).sqrt(),
            r * (1.0 - self.frame.n.y * self.frame.n.y).max(0.0).sqrt(),
            r * (1.0 - self.frame.n.z * self.frame.n.z).max(0.0).sqrt(),
        );
        Bounds3f::new(c - ext, c + ext)
    }

    fn ray_intersect_preliminary(&self, ray: &Ray) -> Option<(Float, u32, Point2f)> {
        let c = self.center.value();
        let denom = self.frame.n.dot(&ray.d);
        if denom == 0.0 {
            return None;
        }
        let t = self.frame.n.dot(&(c - ray.o)) / denom;
        if !(t > T_MIN && t < ray.t_max) {
            return None;
        }
        let local = self.frame.to_local(&(ray.at(t) - c));
        let rho = (local.x * local.x + local.y * local.y).sqrt() / self.radius.value();
        if rho > 1.0 {
            return None;
        }
        let mut phi = local.y.atan2(local.x);
        if phi < 0.0 {
            phi += TWO_PI;
        }
        Some((t, 0, Point2f::new(rho, phi * INV_TWO_PI)))
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
        let phi = TWO_PI * prim_uv.y;
        let radial = Vector3r::from(self.radial(phi));
        let p = self.center + radial * (self.radius * prim_uv.x);
        let n = Vector3r::from(self.frame.n);
        let dp_du = radial * self.radius;
        let dp_dv = Vector3r::from(self.tangent(phi) * (TWO_PI * prim_uv.x)) * self.radius;
        let mut si = SurfaceInteraction::new(Real::from(0.0), p, n, Point2r::from(*prim_uv), dp_du, dp_dv, &n);
        si.prim_uv = *prim_uv;
        si
    }

    fn surface_area(&self) -> Float {
        let r = self.radius.value();
        PI * r * r
    }

    fn sample_position(&self, u: &Point2f) -> PositionSample {
        let pd = concentric_sample_disk(u);
        let rho = (pd.x * pd.x + pd.y * pd.y).sqrt().min(1.0);
        let mut phi = pd.y.atan2(pd.x);
        if phi < 0.0 {
            phi += TWO_PI;
        }
        let prim_uv = Point2f::new(rho, phi * INV_TWO_PI);
        let si = self.eval_parameterization(0, &prim_uv);
        PositionSample {
            p: si.p,
            n: si.n,
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
        DiscontinuityFlags::PERIMETER
    }

    /// Samples a rim angle with `u.x` and a direction on the sphere with
    /// `(u.y, u.z)`.
    fn sample_silhouette(&self, u: &Point3f, flags: DiscontinuityFlags) -> SilhouetteSample {
        if !flags.contains(DiscontinuityFlags::PERIMETER) {
            return SilhouetteSample::default();
        }
        let d = uniform_sample_sphere(&Point2f::new(u.y, u.z));
        let pdf = INV_FOUR_PI / (TWO_PI * self.radius.value());
        self.rim_sample(TWO_PI * u.x, d, pdf)
    }

    fn invert_silhouette_sample(&self, ss: &SilhouetteSample) -> Point3f {
        let uv = uniform_sphere_to_square(&ss.d);
        Point3f::new(clamp(ss.prim_uv.y, 0.0, ONE_MINUS_EPSILON), uv.x, uv.y)
    }

    fn precompute_silhouette(&self, viewpoint: &Point3f) -> (Vec<u32>, Vec<Float>) {
        if self.is_edge_on(viewpoint) {
            (vec![], vec![])
        } else {
            (vec![0], vec![TWO_PI * self.radius.value()])
        }
    }

    fn sample_precomputed_silhouette(&self, viewpoint: &Point3f, _index: u32, u: Float) -> SilhouetteSample {
        let phi = TWO_PI * u;
        let p = self.center.value() + self.radial(phi) * self.radius.value();
        match view_direction(viewpoint, &p) {
            Some(d) => self.rim_sample(phi, d, 1.0 / (TWO_PI * self.radius.value())),
            None => SilhouetteSample::default(),
        }
    }

    /// Moves the point radially onto the rim.
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
        self.sample_precomputed_silhouette(viewpoint, 0, si.prim_uv.y)
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

    fn disk() -> Disk {
        Disk::new(
            "lamp",
            Point3f::new(0.0, 0.0, 2.0),
            Normal3f::new(0.0, 0.0, -1.0),
            1.0,
            Box::new(Diffuse::new(SpectrumF::zero())),
        )
    }

    #[test]
    fn area_samples_lie_on_disk() {
        let d = disk();
        for u in [Point2f::new(0.1, 0.7), Point2f::new(0.9, 0.2), Point2f::new(0.5, 0.5)] {
            let ps = d.sample_position(&u);
            let p = ps.p.value();
            assert!(approx_eq!(f32, p.z, 2.0, epsilon = 1e-5));
            assert!(p.x * p.x + p.y * p.y <= 1.0 + 1e-5);
            assert!(approx_eq!(f32, ps.pdf, 1.0 / PI, epsilon = 1e-6));
        }
    }

    #[test]
    fn rim_grows_with_radius() {
        let mut d = disk();
        d.radius = Real::variable(1.0, 1);
        let ss = d.sample_precomputed_silhouette(&Point3f::zero(), 0, 0.0);
        assert!(ss.is_valid());
        let radial = ss.p - Point3f::new(0.0, 0.0, 2.0);
        assert!(approx_eq!(f32, radial.length(), 1.0, epsilon = 1e-5));
        let v = d.differential_motion(&ss);
        let dv = Vector3f::new(v.x.grad_at(1), v.y.grad_at(1), v.z.grad_at(1));
        assert!(approx_eq!(f32, dv.dot(&radial), 1.0, epsilon = 1e-5));
        // The normal points out of the disk.
        assert!(ss.n.dot(&radial) > 0.0);
        assert!(approx_eq!(f32, d.invert_silhouette_sample(&ss).x, 0.0, epsilon = 1e-6));
    }

    #[test]
    fn edge_on_viewpoint_has_no_silhouette() {
        let d = disk();
        assert!(d.precompute_silhouette(&Point3f::new(5.0, 0.0, 2.0)).0.is_empty());
    }
}
