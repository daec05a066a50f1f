//! Silhouette samples

use crate::geometry::*;
use crate::pbrt::*;
use bitflags::bitflags;

bitflags! {
    /// Kinds of visibility discontinuities a shape can produce.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct DiscontinuityFlags: u8 {
        /// Boundary of an open surface (disk rim, rectangle edge, mesh
        /// border).
        const PERIMETER = 1;

        /// Silhouette across the interior of a smooth or faceted surface.
        const INTERIOR = 2;

        /// Both kinds.
        const ALL = Self::PERIMETER.bits() | Self::INTERIOR.bits();
    }
}

/// A point on a visibility discontinuity together with the direction along
/// which it is a silhouette.
#[derive(Copy, Clone, Debug, Default)]
pub struct SilhouetteSample {
    /// Point on the silhouette.
    pub p: Point3f,

    /// Normal of the discontinuity: perpendicular to `d` and to the
    /// silhouette tangent, pointing away from the occluder.
    pub n: Normal3f,

    /// Direction along which `p` is a silhouette.
    pub d: Vector3f,

    /// Tangent of the discontinuity curve at `p`.
    pub e: Vector3f,

    /// Density of the sample in boundary sample space.
    pub pdf: Float,

    /// Jacobian from boundary sample space to the discontinuity measure.
    pub foreshortening: Float,

    /// Kind of discontinuity.
    pub discontinuity: DiscontinuityFlags,

    /// Index of the shape in the scene.
    pub shape: Option<usize>,

    /// Primitive index within the shape.
    pub prim_index: u32,

    /// Local coordinates on the primitive.
    pub prim_uv: Point2f,

    /// Whether the sample lies on an actual silhouette.
    pub valid: bool,
}

impl SilhouetteSample {
    /// Returns `true` if the sample lies on a silhouette.
    pub fn is_valid(&self) -> bool {
        self.valid && self.pdf > 0.0
    }

    /// Spawns the ray from the silhouette point in direction `-d`, used to
    /// find the opposite end of the boundary segment.
    pub fn spawn_ray(&self) -> Ray {
        let o = self.p - self.d * ((1.0 + self.p.abs().max_component()) * RAY_EPSILON);
        Ray::new(o, -self.d)
    }

    /// Returns the point offset slightly to one side of the discontinuity.
    ///
    /// * `side` - `1.0` for the non-occluded side, `-1.0` for the occluded
    ///            side.
    pub fn offset_point(&self, side: Float) -> Point3f {
        let eps = (1.0 + self.p.abs().max_component()) * RAY_EPSILON * 10.0;
        self.p + self.n * (side * eps)
    }
}
