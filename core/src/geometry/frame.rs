//! Orthonormal frames

use crate::ad::*;
use crate::geometry::*;
use crate::pbrt::*;

/// Orthonormal basis `(s, t, n)` used for shading computations. Local
/// directions have `z` along the normal.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Frame<T> {
    /// First tangent.
    pub s: Vector3<T>,

    /// Second tangent.
    pub t: Vector3<T>,

    /// Normal.
    pub n: Vector3<T>,
}

/// Frame with `Float` axes.
pub type Framef = Frame<Float>;

/// Frame with differentiable axes.
pub type Framer = Frame<Real>;

impl<T: Scalar> Frame<T> {
    /// Builds a frame around a unit normal.
    ///
    /// * `n` - The normal.
    pub fn from_normal(n: &Vector3<T>) -> Self {
        let sign = T::from(1.0_f32.copysign(n.z.value()));
        let a = T::from(-1.0) / (sign + n.z);
        let b = n.x * n.y * a;
        Self {
            s: Vector3::new(T::from(1.0) + sign * n.x * n.x * a, sign * b, -sign * n.x),
            t: Vector3::new(b, sign + n.y * n.y * a, -n.y),
            n: *n,
        }
    }

    /// Returns the identity frame.
    pub fn identity() -> Self {
        let (zero, one) = (T::from(0.0), T::from(1.0));
        Self {
            s: Vector3::new(one, zero, zero),
            t: Vector3::new(zero, one, zero),
            n: Vector3::new(zero, zero, one),
        }
    }

    /// Converts a world space vector to local coordinates.
    ///
    /// * `v` - The vector.
    pub fn to_local(&self, v: &Vector3<T>) -> Vector3<T> {
        Vector3::new(v.dot(&self.s), v.dot(&self.t), v.dot(&self.n))
    }

    /// Converts a local vector to world coordinates.
    ///
    /// * `v` - The vector.
    pub fn to_world(&self, v: &Vector3<T>) -> Vector3<T> {
        self.s * v.x + self.t * v.y + self.n * v.z
    }

    /// Returns the detached frame.
    pub fn value(&self) -> Framef {
        Framef {
            s: self.s.value(),
            t: self.t.value(),
            n: self.n.value(),
        }
    }
}

/// Returns cos(θ) of a local direction.
#[inline(always)]
pub fn cos_theta<T: Scalar>(w: &Vector3<T>) -> T {
    w.z
}

/// Reflects a local direction about the normal.
#[inline(always)]
pub fn reflect<T: Scalar>(wi: &Vector3<T>) -> Vector3<T> {
    Vector3::new(-wi.x, -wi.y, wi.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn local_world_round_trip(
            nx in -1.0..1.0f32, ny in -1.0..1.0f32, nz in -1.0..1.0f32,
            vx in -1.0..1.0f32, vy in -1.0..1.0f32, vz in -1.0..1.0f32,
        ) {
            let n = Vector3f::new(nx, ny, nz);
            prop_assume!(n.length() > 0.1);
            let frame = Framef::from_normal(&n.normalize());
            let v = Vector3f::new(vx, vy, vz);
            let w = frame.to_world(&frame.to_local(&v));
            prop_assert!((w - v).length() < 1e-4);
        }
    }
}
