//! Differentiable real number

use super::GRAD_WIDTH;
use crate::pbrt::*;
use num_traits::{One, Zero};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// A forward-mode dual number carrying up to `GRAD_WIDTH` partial derivatives,
/// one per enabled scene parameter. A value is attached when it depends on at
/// least one enabled parameter.
#[derive(Copy, Clone, Default)]
pub struct Real {
    v: Float,
    d: [Float; GRAD_WIDTH],
    attached: bool,
}

impl Real {
    /// Returns a detached constant.
    ///
    /// * `v` - The value.
    #[inline]
    pub const fn constant(v: Float) -> Self {
        Self {
            v,
            d: [0.0; GRAD_WIDTH],
            attached: false,
        }
    }

    /// Returns an attached variable whose derivative with respect to the
    /// parameter in gradient `slot` is one.
    ///
    /// * `v`    - The value.
    /// * `slot` - Gradient slot of the parameter.
    pub fn variable(v: Float, slot: usize) -> Self {
        debug_assert!(slot < GRAD_WIDTH);
        let mut d = [0.0; GRAD_WIDTH];
        d[slot] = 1.0;
        Self { v, d, attached: true }
    }

    /// Returns the primal value.
    #[inline(always)]
    pub fn value(&self) -> Float {
        self.v
    }

    /// Returns the partial derivatives.
    #[inline(always)]
    pub fn grad(&self) -> &[Float; GRAD_WIDTH] {
        &self.d
    }

    /// Returns the partial derivative for a gradient slot.
    #[inline(always)]
    pub fn grad_at(&self, slot: usize) -> Float {
        self.d[slot]
    }

    /// Returns `true` if the value depends on an enabled parameter.
    #[inline(always)]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Returns a copy with derivative tracking removed.
    #[inline(always)]
    pub fn detach(&self) -> Self {
        Self::constant(self.v)
    }

    /// Returns a value with the primal of `primal` and the derivatives of
    /// `grad_src`.
    ///
    /// * `primal`   - Supplies the value.
    /// * `grad_src` - Supplies the derivatives.
    #[inline]
    pub fn replace_grad(primal: Real, grad_src: Real) -> Self {
        Self {
            v: primal.v,
            d: grad_src.d,
            attached: grad_src.attached,
        }
    }

    /// Dot product of the derivatives with a tangent vector.
    ///
    /// * `tangents` - Tangent per gradient slot.
    pub fn directional(&self, tangents: &[Float; GRAD_WIDTH]) -> Float {
        self.d.iter().zip(tangents.iter()).map(|(d, t)| d * t).sum()
    }

    /// Returns `true` if the value is neither infinite nor NaN.
    #[inline(always)]
    pub fn is_finite(&self) -> bool {
        self.v.is_finite()
    }

    /// Applies the chain rule for a unary function with value `v` and local
    /// derivative `dv`.
    #[inline]
    pub(crate) fn chain(self, v: Float, dv: Float) -> Self {
        if !self.attached {
            return Self::constant(v);
        }
        let mut d = self.d;
        d.iter_mut().for_each(|x| *x *= dv);
        Self { v, d, attached: true }
    }

    /// Applies the chain rule for a binary function with value `v` and local
    /// derivatives `da` and `db`.
    #[inline]
    pub(crate) fn chain2(a: Self, b: Self, v: Float, da: Float, db: Float) -> Self {
        match (a.attached, b.attached) {
            (false, false) => Self::constant(v),
            (true, false) => a.chain(v, da),
            (false, true) => b.chain(v, db),
            (true, true) => {
                let mut d = [0.0; GRAD_WIDTH];
                for (i, x) in d.iter_mut().enumerate() {
                    *x = a.d[i] * da + b.d[i] * db;
                }
                Self { v, d, attached: true }
            }
        }
    }
}

impl From<Float> for Real {
    fn from(v: Float) -> Self {
        Self::constant(v)
    }
}

impl PartialEq for Real {
    /// Compares primal values only.
    fn eq(&self, other: &Self) -> bool {
        self.v == other.v
    }
}

impl PartialOrd for Real {
    /// Orders by primal values only.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.v.partial_cmp(&other.v)
    }
}

impl fmt::Debug for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attached {
            write!(f, "Real({}, d={:?})", self.v, self.d)
        } else {
            write!(f, "Real({})", self.v)
        }
    }
}

impl fmt::Display for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.v)
    }
}

impl Add for Real {
    type Output = Real;

    fn add(self, rhs: Real) -> Real {
        Real::chain2(self, rhs, self.v + rhs.v, 1.0, 1.0)
    }
}

impl Sub for Real {
    type Output = Real;

    fn sub(self, rhs: Real) -> Real {
        Real::chain2(self, rhs, self.v - rhs.v, 1.0, -1.0)
    }
}

impl Mul for Real {
    type Output = Real;

    fn mul(self, rhs: Real) -> Real {
        Real::chain2(self, rhs, self.v * rhs.v, rhs.v, self.v)
    }
}

impl Div for Real {
    type Output = Real;

    fn div(self, rhs: Real) -> Real {
        let inv = 1.0 / rhs.v;
        let v = self.v * inv;
        Real::chain2(self, rhs, v, inv, -v * inv)
    }
}

impl Neg for Real {
    type Output = Real;

    fn neg(self) -> Real {
        self.chain(-self.v, -1.0)
    }
}

impl Add<Float> for Real {
    type Output = Real;

    fn add(self, rhs: Float) -> Real {
        self.chain(self.v + rhs, 1.0)
    }
}

impl Sub<Float> for Real {
    type Output = Real;

    fn sub(self, rhs: Float) -> Real {
        self.chain(self.v - rhs, 1.0)
    }
}

impl Mul<Float> for Real {
    type Output = Real;

    fn mul(self, rhs: Float) -> Real {
        self.chain(self.v * rhs, rhs)
    }
}

impl Div<Float> for Real {
    type Output = Real;

    fn div(self, rhs: Float) -> Real {
        let inv = 1.0 / rhs;
        self.chain(self.v * inv, inv)
    }
}

impl Add<Real> for Float {
    type Output = Real;

    fn add(self, rhs: Real) -> Real {
        rhs + self
    }
}

impl Sub<Real> for Float {
    type Output = Real;

    fn sub(self, rhs: Real) -> Real {
        rhs.chain(self - rhs.v, -1.0)
    }
}

impl Mul<Real> for Float {
    type Output = Real;

    fn mul(self, rhs: Real) -> Real {
        rhs * self
    }
}

impl Div<Real> for Float {
    type Output = Real;

    fn div(self, rhs: Real) -> Real {
        let v = self / rhs.v;
        rhs.chain(v, -v / rhs.v)
    }
}

macro_rules! real_assign_op {
    ($tr: ident, $func: ident, $op: tt) => {
        impl $tr for Real {
            fn $func(&mut self, rhs: Real) {
                *self = *self $op rhs;
            }
        }

        impl $tr<Float> for Real {
            fn $func(&mut self, rhs: Float) {
                *self = *self $op rhs;
            }
        }
    };
}

real_assign_op!(AddAssign, add_assign, +);
real_assign_op!(SubAssign, sub_assign, -);
real_assign_op!(MulAssign, mul_assign, *);
real_assign_op!(DivAssign, div_assign, /);

impl Zero for Real {
    fn zero() -> Self {
        Self::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.v == 0.0
    }
}

impl One for Real {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Sum for Real {
    fn sum<I: Iterator<Item = Real>>(iter: I) -> Self {
        iter.fold(Real::constant(0.0), |acc, x| acc + x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::*;
    use proptest::prelude::*;

    #[test]
    fn product_rule() {
        let x = Real::variable(3.0, 0);
        let y = Real::variable(2.0, 1);
        let z = x * y + x;
        assert_eq!(z.value(), 9.0);
        assert_eq!(z.grad_at(0), 3.0);
        assert_eq!(z.grad_at(1), 3.0);
    }

    #[test]
    fn quotient_rule() {
        let x = Real::variable(2.0, 0);
        let z = 1.0 / x;
        assert!(approx_eq!(f32, z.grad_at(0), -0.25, ulps = 2));
    }

    #[test]
    fn detach_drops_derivatives() {
        let x = Real::variable(2.0, 0);
        let z = (x * x).detach();
        assert!(!z.is_attached());
        assert_eq!(z.grad_at(0), 0.0);
    }

    #[test]
    fn replace_grad_keeps_primal() {
        let x = Real::variable(5.0, 2);
        let z = Real::replace_grad(Real::constant(1.0), x / x.detach());
        assert_eq!(z.value(), 1.0);
        assert!(approx_eq!(f32, z.grad_at(2), 0.2, ulps = 2));
    }

    #[test]
    fn constants_stay_detached() {
        let z = Real::constant(1.0) * 4.0 + Real::constant(2.0);
        assert!(!z.is_attached());
    }

    proptest! {
        #[test]
        fn linear_combination_derivative(a in -10.0..10.0f32, b in -10.0..10.0f32) {
            let x = Real::variable(a, 0);
            let z = x * b - 2.0 * x;
            prop_assert!(approx_eq!(f32, z.grad_at(0), b - 2.0, epsilon = 1e-4));
        }
    }
}
