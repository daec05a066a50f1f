//! Rays

use crate::geometry::*;
use crate::pbrt::*;

/// A semi-infinite line with detached origin and direction.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Ray {
    /// Origin.
    pub o: Point3f,

    /// Direction (normalized).
    pub d: Vector3f,

    /// Maximum extent of the ray.
    pub t_max: Float,
}

impl Ray {
    /// Returns a new unbounded ray.
    ///
    /// * `o` - Origin.
    /// * `d` - Direction.
    pub fn new(o: Point3f, d: Vector3f) -> Self {
        Self { o, d, t_max: INFINITY }
    }

    /// Returns a new ray with a maximum extent.
    ///
    /// * `o`     - Origin.
    /// * `d`     - Direction.
    /// * `t_max` - Maximum extent.
    pub fn with_max(o: Point3f, d: Vector3f, t_max: Float) -> Self {
        Self { o, d, t_max }
    }

    /// Returns the point at parametric distance `t`.
    ///
    /// * `t` - Distance along the ray.
    pub fn at(&self, t: Float) -> Point3f {
        self.o + self.d * t
    }
}

/// Offsets a surface point along its normal so a spawned ray in direction
/// `d` does not re-intersect the surface.
///
/// * `p` - Surface point.
/// * `n` - Geometric normal.
/// * `d` - Direction of the spawned ray.
pub fn offset_ray_origin(p: &Point3f, n: &Normal3f, d: &Vector3f) -> Point3f {
    let mag = (1.0 + p.abs().max_component()) * RAY_EPSILON;
    let offset = if n.dot(d) < 0.0 { -*n * mag } else { *n * mag };
    *p + offset
}
