//! Surface Interactions

use super::RayFlags;
use crate::ad::*;
use crate::geometry::*;
use crate::pbrt::*;

/// Geometry of a particular point on a surface. Values are attached when
/// they depend on enabled scene parameters.
#[derive(Copy, Clone, Debug, Default)]
pub struct SurfaceInteraction {
    /// Distance along the generating ray.
    pub t: Real,

    /// Point of interaction.
    pub p: Point3r,

    /// Geometric normal.
    pub n: Normal3r,

    /// Shading frame.
    pub sh_frame: Framer,

    /// Surface parameterization coordinates.
    pub uv: Point2r,

    /// Parametric partial derivative of the point ∂p/∂u.
    pub dp_du: Vector3r,

    /// Parametric partial derivative of the point ∂p/∂v.
    pub dp_dv: Vector3r,

    /// Incident direction (towards the ray origin) in the local frame.
    pub wi: Vector3r,

    /// Index of the shape in the scene.
    pub shape: Option<usize>,

    /// Primitive index within the shape.
    pub prim_index: u32,

    /// Local coordinates on the primitive.
    pub prim_uv: Point2f,

    /// Whether the ray hit a surface.
    pub valid: bool,
}

impl SurfaceInteraction {
    /// Create a new surface interaction. The shading frame is built from the
    /// normal and `wi` is converted into it.
    ///
    /// * `t`          - Distance along the generating ray.
    /// * `p`          - Point of interaction.
    /// * `n`          - Unit geometric normal.
    /// * `uv`         - Surface parameterization coordinates.
    /// * `dp_du`      - Parametric partial derivative of the point ∂p/∂u.
    /// * `dp_dv`      - Parametric partial derivative of the point ∂p/∂v.
    /// * `wi_world`   - Direction towards the ray origin in world space.
    pub fn new(
        t: Real,
        p: Point3r,
        n: Normal3r,
        uv: Point2r,
        dp_du: Vector3r,
        dp_dv: Vector3r,
        wi_world: &Vector3r,
    ) -> Self {
        let sh_frame = Framer::from_normal(&n);
        Self {
            t,
            p,
            n,
            sh_frame,
            uv,
            dp_du,
            dp_dv,
            wi: sh_frame.to_local(wi_world),
            shape: None,
            prim_index: 0,
            prim_uv: Point2f::default(),
            valid: true,
        }
    }

    /// Returns an interaction for a ray that escaped the scene. `wi` holds
    /// the negated ray direction in world space.
    ///
    /// * `ray` - The escaping ray.
    pub fn escaped(ray: &Ray) -> Self {
        Self {
            t: Real::from(INFINITY),
            sh_frame: Framer::identity(),
            wi: Vector3r::from(-ray.d),
            valid: false,
            ..Default::default()
        }
    }

    /// Returns `true` if the ray hit a surface.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns the detached position.
    #[inline(always)]
    pub fn p_f(&self) -> Point3f {
        self.p.value()
    }

    /// Returns the detached geometric normal.
    #[inline(always)]
    pub fn n_f(&self) -> Normal3f {
        self.n.value()
    }

    /// Converts a world space direction to the shading frame.
    ///
    /// * `v` - The direction.
    pub fn to_local(&self, v: &Vector3r) -> Vector3r {
        self.sh_frame.to_local(v)
    }

    /// Converts a detached world space direction to the shading frame.
    ///
    /// * `v` - The direction.
    pub fn to_local_f(&self, v: &Vector3f) -> Vector3f {
        self.sh_frame.value().to_local(v)
    }

    /// Converts a local direction to world space.
    ///
    /// * `v` - The direction.
    pub fn to_world(&self, v: &Vector3r) -> Vector3r {
        self.sh_frame.to_world(v)
    }

    /// Converts a detached local direction to world space.
    ///
    /// * `v` - The direction.
    pub fn to_world_f(&self, v: &Vector3f) -> Vector3f {
        self.sh_frame.value().to_world(v)
    }

    /// Returns the world space direction towards the ray origin.
    pub fn wi_world(&self) -> Vector3r {
        self.to_world(&self.wi)
    }

    /// Spawns a ray leaving the surface in direction `d`.
    ///
    /// * `d` - Unit direction.
    pub fn spawn_ray(&self, d: &Vector3f) -> Ray {
        Ray::new(offset_ray_origin(&self.p_f(), &self.n_f(), d), *d)
    }

    /// Spawns a ray from the surface towards a point; the ray stops just
    /// short of the target.
    ///
    /// * `target` - The target point.
    pub fn spawn_ray_to(&self, target: &Point3f) -> Ray {
        let d = *target - self.p_f();
        let o = offset_ray_origin(&self.p_f(), &self.n_f(), &d);
        let d = *target - o;
        let dist = d.length();
        Ray::with_max(o, d / dist, dist * (1.0 - SHADOW_EPSILON))
    }

    /// Returns a copy with derivative tracking removed.
    pub fn detach(&self) -> Self {
        Self {
            t: self.t.detach(),
            p: self.p.detach(),
            n: self.n.detach(),
            sh_frame: Framer {
                s: self.sh_frame.s.detach(),
                t: self.sh_frame.t.detach(),
                n: self.sh_frame.n.detach(),
            },
            uv: self.uv.detach(),
            dp_du: self.dp_du.detach(),
            dp_dv: self.dp_dv.detach(),
            wi: self.wi.detach(),
            ..*self
        }
    }

    /// Re-expresses the interaction with an incident direction computed from
    /// an attached previous vertex so derivatives flow through `wi`.
    ///
    /// * `prev` - Previous path vertex.
    pub fn with_wi_from(&self, prev: &Point3r) -> Self {
        let wi_world = (*prev - self.p).normalize();
        Self {
            wi: self.to_local(&wi_world),
            ..*self
        }
    }

    /// Returns `true` when the flags ask for a shape-following
    /// reconstruction.
    ///
    /// * `flags` - Ray flags.
    pub fn follows_shape(flags: RayFlags) -> bool {
        flags.contains(RayFlags::FOLLOW_SHAPE)
    }
}
