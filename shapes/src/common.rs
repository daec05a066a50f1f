//! Helpers shared by the shape implementations

use prb_core::ad::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::pbrt::*;
use prb_core::shape::*;

/// Smallest accepted ray parameter of a hit.
pub const T_MIN: Float = 1e-6;

/// Completes a shape-following surface interaction. `si` is the result of
/// `eval_parameterization`; the distance is recomputed from the attached
/// point and `wi` is the detached reverse ray direction.
///
/// * `ray` - The ray that produced the intersection.
/// * `si`  - Interaction at the hit's local coordinates.
pub fn follow_shape_interaction(ray: &Ray, si: SurfaceInteraction) -> SurfaceInteraction {
    let t = (si.p - ray.o).length();
    let wi = si.to_local(&Vector3r::from(-ray.d));
    SurfaceInteraction { t, wi, ..si }
}

/// Builds a ray-following surface interaction: the point slides along the
/// detached ray and only the distance `t` is attached. The distance is the
/// intersection with the attached tangent plane, which has the same
/// derivative as the intersection with the surface itself.
///
/// * `ray` - The ray that produced the intersection.
/// * `pi`  - The preliminary intersection.
/// * `si`  - Interaction at the hit's local coordinates.
pub fn ray_following_interaction(ray: &Ray, pi: &PreliminaryIntersection, si: SurfaceInteraction) -> SurfaceInteraction {
    let d = Vector3r::from(ray.d);
    let denom = si.n.dot(&d);
    let t_plane = si.n.dot(&(si.p - ray.o)) / denom;
    let t = if denom.value() != 0.0 && t_plane.is_finite() {
        Real::replace_grad(Real::from(pi.t), t_plane)
    } else {
        Real::from(pi.t)
    };
    let p = Vector3r::from(ray.o) + d * t;
    SurfaceInteraction {
        t,
        p,
        wi: si.to_local(&-d),
        ..si
    }
}

/// Dispatches to the follow-shape or ray-following reconstruction.
///
/// * `ray`   - The ray that produced the intersection.
/// * `pi`    - The preliminary intersection.
/// * `flags` - Reconstruction flags.
/// * `si`    - Interaction at the hit's local coordinates.
pub fn finish_interaction(
    ray: &Ray,
    pi: &PreliminaryIntersection,
    flags: RayFlags,
    si: SurfaceInteraction,
) -> SurfaceInteraction {
    if SurfaceInteraction::follows_shape(flags) {
        follow_shape_interaction(ray, si)
    } else {
        ray_following_interaction(ray, pi, si)
    }
}

/// Builds the silhouette sample of a point on a boundary curve (rim, edge)
/// of an open surface. It is invalid when `d` is parallel to the curve.
///
/// * `p`      - Point on the curve.
/// * `e`      - Unit tangent of the curve.
/// * `d`      - Unit direction of the boundary segment.
/// * `inward` - Vector from the curve into the surface.
/// * `pdf`    - Sampling density.
pub fn perimeter_sample(p: Point3f, e: Vector3f, d: Vector3f, inward: &Vector3f, pdf: Float) -> SilhouetteSample {
    match boundary_normal(&e, &d, inward) {
        Some(n) => SilhouetteSample {
            p,
            n,
            d,
            e,
            pdf,
            foreshortening: e.cross(&d).length(),
            discontinuity: DiscontinuityFlags::PERIMETER,
            valid: true,
            ..Default::default()
        },
        None => SilhouetteSample::default(),
    }
}

/// Builds the silhouette sample of a point on the smooth interior of a
/// surface whose normal is perpendicular to `d`.
///
/// * `p`              - Point on the surface.
/// * `n`              - Outward unit surface normal.
/// * `d`              - Unit direction tangent to the surface.
/// * `pdf`            - Sampling density.
/// * `foreshortening` - Normal curvature of the surface along `d`.
pub fn interior_sample(p: Point3f, n: Normal3f, d: Vector3f, pdf: Float, foreshortening: Float) -> SilhouetteSample {
    let e = n.cross(&d);
    let len = e.length();
    if len < 1e-6 {
        return SilhouetteSample::default();
    }
    SilhouetteSample {
        p,
        n,
        d,
        e: e / len,
        pdf,
        foreshortening,
        discontinuity: DiscontinuityFlags::INTERIOR,
        valid: true,
        ..Default::default()
    }
}

/// Returns the unit direction from `viewpoint` to `p`, or `None` if they
/// coincide.
///
/// * `viewpoint` - The viewpoint.
/// * `p`         - The point.
pub fn view_direction(viewpoint: &Point3f, p: &Point3f) -> Option<Vector3f> {
    let v = *p - *viewpoint;
    let len = v.length();
    if len > 0.0 {
        Some(v / len)
    } else {
        None
    }
}

/// Intersects a ray with a triangle (Möller-Trumbore). Returns `t` and the
/// barycentric coordinates `(b1, b2)` of `v1` and `v2`.
///
/// * `ray` - The ray.
/// * `v0`  - First vertex.
/// * `v1`  - Second vertex.
/// * `v2`  - Third vertex.
pub fn intersect_triangle(ray: &Ray, v0: &Point3f, v1: &Point3f, v2: &Point3f) -> Option<(Float, Point2f)> {
    let e1 = *v1 - *v0;
    let e2 = *v2 - *v0;
    let pv = ray.d.cross(&e2);
    let det = e1.dot(&pv);
    if abs(det) < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    let tv = ray.o - *v0;
    let b1 = tv.dot(&pv) * inv_det;
    if !(0.0..=1.0).contains(&b1) {
        return None;
    }
    let qv = tv.cross(&e1);
    let b2 = ray.d.dot(&qv) * inv_det;
    if b2 < 0.0 || b1 + b2 > 1.0 {
        return None;
    }
    let t = e2.dot(&qv) * inv_det;
    if t > T_MIN && t < ray.t_max {
        Some((t, Point2f::new(b1, b2)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_hit_reports_barycentrics() {
        let ray = Ray::new(Point3f::new(0.25, 0.25, 1.0), Vector3f::new(0.0, 0.0, -1.0));
        let (t, b) = intersect_triangle(
            &ray,
            &Point3f::new(0.0, 0.0, 0.0),
            &Point3f::new(1.0, 0.0, 0.0),
            &Point3f::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        assert_eq!(t, 1.0);
        assert!((b.x - 0.25).abs() < 1e-6 && (b.y - 0.25).abs() < 1e-6);
    }

    #[test]
    fn perimeter_normal_points_away_from_surface() {
        let ss = perimeter_sample(
            Point3f::zero(),
            Vector3f::new(1.0, 0.0, 0.0),
            Vector3f::new(0.0, 0.0, -1.0),
            &Vector3f::new(0.0, 1.0, 0.0),
            1.0,
        );
        assert!(ss.is_valid());
        assert!(ss.n.y < 0.0);
        assert_eq!(ss.foreshortening, 1.0);
    }
}
