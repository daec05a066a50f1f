//! 3-D Vectors

use crate::ad::*;
use crate::pbrt::*;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

/// A 3-D vector containing numeric values. Points and normals share this
/// representation.
#[derive(Copy, Clone, Default, PartialEq)]
pub struct Vector3<T> {
    /// X-coordinate.
    pub x: T,

    /// Y-coordinate.
    pub y: T,

    /// Z-coordinate.
    pub z: T,
}

/// 3-D vector containing `Float` values.
pub type Vector3f = Vector3<Float>;

/// 3-D vector containing differentiable `Real` values.
pub type Vector3r = Vector3<Real>;

/// 3-D point containing `Float` values.
pub type Point3f = Vector3f;

/// 3-D point containing differentiable `Real` values.
pub type Point3r = Vector3r;

/// 3-D normal containing `Float` values.
pub type Normal3f = Vector3f;

/// 3-D normal containing differentiable `Real` values.
pub type Normal3r = Vector3r;

impl<T> Vector3<T> {
    /// Creates a new 3-D vector.
    ///
    /// * `x` - X-coordinate.
    /// * `y` - Y-coordinate.
    /// * `z` - Z-coordinate.
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

impl<T: Scalar> Vector3<T> {
    /// Returns a vector with all components set to `v`.
    ///
    /// * `v` - The value.
    pub fn splat(v: T) -> Self {
        Self::new(v, v, v)
    }

    /// Returns the zero vector.
    pub fn zero() -> Self {
        Self::splat(T::from(0.0))
    }

    /// Returns the square of the vector's length.
    pub fn length_squared(&self) -> T {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Returns the vector's length.
    pub fn length(&self) -> T {
        self.length_squared().sqrt()
    }

    /// Returns a unit vector in the same direction.
    pub fn normalize(&self) -> Self {
        *self / self.length()
    }

    /// Returns the dot product with another vector.
    ///
    /// * `v` - The other vector.
    pub fn dot(&self, v: &Self) -> T {
        self.x * v.x + self.y * v.y + self.z * v.z
    }

    /// Returns the absolute value of the dot product with another vector.
    ///
    /// * `v` - The other vector.
    pub fn abs_dot(&self, v: &Self) -> T {
        self.dot(v).abs()
    }

    /// Returns the cross product with another vector.
    ///
    /// * `v` - The other vector.
    pub fn cross(&self, v: &Self) -> Self {
        Self::new(
            self.y * v.z - self.z * v.y,
            self.z * v.x - self.x * v.z,
            self.x * v.y - self.y * v.x,
        )
    }

    /// Returns the distance to another point.
    ///
    /// * `p` - The other point.
    pub fn distance(&self, p: &Self) -> T {
        (*self - *p).length()
    }

    /// Returns the component-wise product with another vector.
    ///
    /// * `v` - The other vector.
    pub fn mul_elem(&self, v: &Self) -> Self {
        Self::new(self.x * v.x, self.y * v.y, self.z * v.z)
    }

    /// Returns a vector containing absolute values of the components.
    pub fn abs(&self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    /// Returns the largest component value.
    pub fn max_component(&self) -> T {
        self.x.max(self.y).max(self.z)
    }

    /// Scales the vector by a detached factor.
    ///
    /// * `s` - The factor.
    pub fn scale(&self, s: Float) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    /// Returns the detached primal values.
    pub fn value(&self) -> Vector3f {
        Vector3f::new(self.x.value(), self.y.value(), self.z.value())
    }

    /// Returns a copy with derivative tracking removed.
    pub fn detach(&self) -> Self {
        Self::new(self.x.detached(), self.y.detached(), self.z.detached())
    }

    /// Returns `true` if any component is NaN or infinite.
    pub fn has_non_finite(&self) -> bool {
        !(self.x.value().is_finite() && self.y.value().is_finite() && self.z.value().is_finite())
    }
}

impl Vector3f {
    /// Returns two vectors that together with this unit vector form an
    /// orthonormal basis.
    pub fn coordinate_system(&self) -> (Vector3f, Vector3f) {
        let sign = 1.0_f32.copysign(self.z);
        let a = -1.0 / (sign + self.z);
        let b = self.x * self.y * a;
        (
            Vector3f::new(1.0 + sign * self.x * self.x * a, sign * b, -sign * self.x),
            Vector3f::new(b, sign + self.y * self.y * a, -self.y),
        )
    }

    /// Returns `true` if every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Returns the component-wise minimum with another vector.
    ///
    /// * `v` - The other vector.
    pub fn min_elem(&self, v: &Self) -> Self {
        Self::new(self.x.min(v.x), self.y.min(v.y), self.z.min(v.z))
    }

    /// Returns the component-wise maximum with another vector.
    ///
    /// * `v` - The other vector.
    pub fn max_elem(&self, v: &Self) -> Self {
        Self::new(self.x.max(v.x), self.y.max(v.y), self.z.max(v.z))
    }
}

impl Vector3r {
    /// Returns `true` if any component depends on an enabled parameter.
    pub fn is_attached(&self) -> bool {
        self.x.is_attached() || self.y.is_attached() || self.z.is_attached()
    }

    /// Returns a vector with the value of `primal` and the derivatives of
    /// `grad_src`.
    ///
    /// * `primal`   - Value to report.
    /// * `grad_src` - Vector whose derivatives are kept.
    pub fn replace_grad(primal: &Vector3f, grad_src: &Vector3r) -> Self {
        Self::new(
            Real::replace_grad(Real::from(primal.x), grad_src.x),
            Real::replace_grad(Real::from(primal.y), grad_src.y),
            Real::replace_grad(Real::from(primal.z), grad_src.z),
        )
    }
}

impl From<Vector3f> for Vector3r {
    fn from(v: Vector3f) -> Self {
        Self::new(Real::from(v.x), Real::from(v.y), Real::from(v.z))
    }
}

impl<T: fmt::Debug> fmt::Debug for Vector3<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}, {:?}, {:?}]", self.x, self.y, self.z)
    }
}

impl<T: fmt::Display> fmt::Display for Vector3<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

impl<T> Index<usize> for Vector3<T> {
    type Output = T;

    /// Index the vector by an axis to get the immutable coordinate axis value.
    ///
    /// * `axis` - A 3-D coordinate axis.
    fn index(&self, axis: usize) -> &Self::Output {
        match axis {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        }
    }
}

impl<T> IndexMut<usize> for Vector3<T> {
    /// Index the vector by an axis to get a mutable coordinate axis value.
    ///
    /// * `axis` - A 3-D coordinate axis.
    fn index_mut(&mut self, axis: usize) -> &mut Self::Output {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => &mut self.z,
        }
    }
}

impl<T: Scalar> Add for Vector3<T> {
    type Output = Self;

    fn add(self, v: Self) -> Self {
        Self::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }
}

impl<T: Scalar> AddAssign for Vector3<T> {
    fn add_assign(&mut self, v: Self) {
        *self = *self + v;
    }
}

impl<T: Scalar> Sub for Vector3<T> {
    type Output = Self;

    fn sub(self, v: Self) -> Self {
        Self::new(self.x - v.x, self.y - v.y, self.z - v.z)
    }
}

impl<T: Scalar> SubAssign for Vector3<T> {
    fn sub_assign(&mut self, v: Self) {
        *self = *self - v;
    }
}

impl<T: Scalar> Mul<T> for Vector3<T> {
    type Output = Self;

    fn mul(self, s: T) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl<T: Scalar> MulAssign<T> for Vector3<T> {
    fn mul_assign(&mut self, s: T) {
        *self = *self * s;
    }
}

impl<T: Scalar> Div<T> for Vector3<T> {
    type Output = Self;

    fn div(self, s: T) -> Self {
        let inv = T::from(1.0) / s;
        Self::new(self.x * inv, self.y * inv, self.z * inv)
    }
}

impl<T: Scalar> DivAssign<T> for Vector3<T> {
    fn div_assign(&mut self, s: T) {
        *self = *self / s;
    }
}

impl<T: Scalar> Neg for Vector3<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<Float> for Vector3r {
    type Output = Vector3r;

    fn mul(self, s: Float) -> Vector3r {
        self.scale(s)
    }
}

impl Div<Float> for Vector3r {
    type Output = Vector3r;

    fn div(self, s: Float) -> Vector3r {
        self.scale(1.0 / s)
    }
}

impl Add<Vector3f> for Vector3r {
    type Output = Vector3r;

    fn add(self, v: Vector3f) -> Vector3r {
        Vector3r::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }
}

impl Sub<Vector3f> for Vector3r {
    type Output = Vector3r;

    fn sub(self, v: Vector3f) -> Vector3r {
        Vector3r::new(self.x - v.x, self.y - v.y, self.z - v.z)
    }
}

impl Mul<Vector3f> for Float {
    type Output = Vector3f;

    fn mul(self, v: Vector3f) -> Vector3f {
        v * self
    }
}

impl Mul<Vector3r> for Real {
    type Output = Vector3r;

    fn mul(self, v: Vector3r) -> Vector3r {
        v * self
    }
}

impl Mul<Vector3r> for Float {
    type Output = Vector3r;

    fn mul(self, v: Vector3r) -> Vector3r {
        v.scale(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::*;
    use proptest::prelude::*;

    #[test]
    fn cross_of_axes() {
        let x = Vector3f::new(1.0, 0.0, 0.0);
        let y = Vector3f::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(&y), Vector3f::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn attached_length_derivative() {
        let v = Vector3r::new(Real::variable(3.0, 0), Real::constant(4.0), Real::constant(0.0));
        let l = v.length();
        assert_eq!(l.value(), 5.0);
        assert!(approx_eq!(f32, l.grad_at(0), 0.6, ulps = 4));
    }

    proptest! {
        #[test]
        fn coordinate_system_is_orthonormal(
            x in -1.0..1.0f32,
            y in -1.0..1.0f32,
            z in -1.0..1.0f32,
        ) {
            let n = Vector3f::new(x, y, z);
            prop_assume!(n.length() > 0.1);
            let n = n.normalize();
            let (s, t) = n.coordinate_system();
            prop_assert!(s.dot(&t).abs() < 1e-4);
            prop_assert!(s.dot(&n).abs() < 1e-4);
            prop_assert!((s.length() - 1.0).abs() < 1e-4);
        }
    }
}
