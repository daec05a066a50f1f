//! Interactions

use crate::geometry::*;
use crate::pbrt::*;
use bitflags::bitflags;

mod samples;
mod silhouette;
mod surface_interaction;

pub use samples::*;
pub use silhouette::*;
pub use surface_interaction::*;

bitflags! {
    /// Controls how a surface interaction is reconstructed from a
    /// preliminary intersection.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct RayFlags: u8 {
        /// Positions move with the shape parameters (material-point
        /// parameterization) instead of being tied to the ray.
        const FOLLOW_SHAPE = 1;

        /// Compute shading frame and surface derivatives.
        const ALL = 2;
    }
}

/// Lightweight intersection record found during traversal. Only the
/// shape index, primitive index and local coordinates are stored; the full
/// `SurfaceInteraction` is computed on demand.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PreliminaryIntersection {
    /// Distance along the ray.
    pub t: Float,

    /// Index of the intersected shape in the scene.
    pub shape: Option<usize>,

    /// Primitive index within the shape (triangle, rim, ...).
    pub prim_index: u32,

    /// Local coordinates on the primitive.
    pub prim_uv: Point2f,
}

impl PreliminaryIntersection {
    /// Returns a record describing a miss.
    pub fn miss() -> Self {
        Self {
            t: INFINITY,
            ..Default::default()
        }
    }

    /// Returns `true` if a shape was hit.
    pub fn is_valid(&self) -> bool {
        self.shape.is_some() && self.t < INFINITY
    }
}
