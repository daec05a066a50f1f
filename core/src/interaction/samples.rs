//! Position and direction samples

use super::SurfaceInteraction;
use crate::geometry::*;
use crate::pbrt::*;

/// A point sampled on a surface, emitter or sensor.
#[derive(Copy, Clone, Debug, Default)]
pub struct PositionSample {
    /// Sampled position.
    pub p: Point3r,

    /// Surface normal at the position.
    pub n: Normal3r,

    /// Area density of the sample.
    pub pdf: Float,

    /// Set when the position was drawn from a Dirac delta.
    pub delta: bool,

    /// Primitive index within the shape.
    pub prim_index: u32,

    /// Local coordinates on the primitive.
    pub prim_uv: Point2f,
}

/// A direction from a reference point towards a sampled emitter or sensor
/// position.
#[derive(Copy, Clone, Debug, Default)]
pub struct DirectionSample {
    /// Sampled position.
    pub p: Point3r,

    /// Surface normal at the position.
    pub n: Normal3r,

    /// Unit direction from the reference point to `p`.
    pub d: Vector3f,

    /// Distance from the reference point to `p`.
    pub dist: Float,

    /// Solid angle density of the sample; one for delta samples.
    pub pdf: Float,

    /// Set when the position was drawn from a Dirac delta.
    pub delta: bool,

    /// Index of the emitter in the scene.
    pub emitter: Option<usize>,

    /// Primitive index within the emitter's shape.
    pub prim_index: u32,

    /// Local coordinates on the primitive.
    pub prim_uv: Point2f,

    /// Raster position for sensor samples.
    pub uv: Point2f,
}

impl DirectionSample {
    /// Builds a direction sample from a position sample and a reference
    /// point, converting the area density to solid angle.
    ///
    /// * `ps`    - Position sample.
    /// * `p_ref` - Reference point.
    pub fn from_position(ps: &PositionSample, p_ref: &Point3f) -> Self {
        let v = ps.p.value() - *p_ref;
        let dist = v.length();
        let d = v / dist;
        let pdf = if ps.delta {
            1.0
        } else {
            let cos = ps.n.value().abs_dot(&d);
            if cos > 0.0 {
                ps.pdf * dist * dist / cos
            } else {
                0.0
            }
        };
        Self {
            p: ps.p,
            n: ps.n,
            d,
            dist,
            pdf,
            delta: ps.delta,
            emitter: None,
            prim_index: ps.prim_index,
            prim_uv: ps.prim_uv,
            uv: Point2f::default(),
        }
    }
}

impl DirectionSample {
    /// Builds a direction sample describing an emitter that was hit by a
    /// ray leaving `p_ref`, so its density can be queried for MIS. For
    /// escaped rays the direction is the negated `si.wi`.
    ///
    /// * `si`      - Interaction on the emitter.
    /// * `p_ref`   - Origin of the ray.
    /// * `emitter` - Index of the emitter.
    pub fn from_interaction(si: &SurfaceInteraction, p_ref: &Point3f, emitter: Option<usize>) -> Self {
        let (d, dist) = if si.is_valid() {
            let v = si.p_f() - *p_ref;
            let dist = v.length();
            (v / dist, dist)
        } else {
            (-si.wi.value(), INFINITY)
        };
        Self {
            p: si.p,
            n: si.n,
            d,
            dist,
            pdf: 0.0,
            delta: false,
            emitter,
            prim_index: si.prim_index,
            prim_uv: si.prim_uv,
            uv: Point2f::default(),
        }
    }
}
