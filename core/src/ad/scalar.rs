//! Scalar abstraction over plain and differentiable floats

use super::Real;
use crate::pbrt::*;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Arithmetic shared by `Float` and `Real` so geometry code can be written
/// once for detached and attached values.
pub trait Scalar:
    Copy
    + Debug
    + Default
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + From<Float>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<Float, Output = Self>
    + Sub<Float, Output = Self>
    + Mul<Float, Output = Self>
    + Div<Float, Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + 'static
{
    /// Returns the primal value.
    fn value(self) -> Float;

    /// Returns the value with derivative tracking removed.
    fn detached(self) -> Self;

    fn sqrt(self) -> Self;
    fn abs(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn acos(self) -> Self;
    fn atan2(self, x: Self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn powf(self, e: Float) -> Self;

    /// Returns the smaller of two values.
    fn min(self, other: Self) -> Self {
        if other.value() < self.value() {
            other
        } else {
            self
        }
    }

    /// Returns the larger of two values.
    fn max(self, other: Self) -> Self {
        if other.value() > self.value() {
            other
        } else {
            self
        }
    }

    /// Square root clamped at zero; the derivative vanishes at the clamp.
    fn safe_sqrt(self) -> Self {
        if self.value() > 0.0 {
            self.sqrt()
        } else {
            Self::from(0.0)
        }
    }

    /// Arc cosine with the argument clamped to [-1, 1].
    fn safe_acos(self) -> Self {
        if self.value() >= 1.0 {
            Self::from(0.0)
        } else if self.value() <= -1.0 {
            Self::from(PI)
        } else {
            self.acos()
        }
    }

    /// Returns x².
    fn sqr(self) -> Self {
        self * self
    }

    /// Returns 1/x.
    fn recip(self) -> Self {
        Self::from(1.0) / self
    }
}

impl Scalar for Float {
    #[inline(always)]
    fn value(self) -> Float {
        self
    }

    #[inline(always)]
    fn detached(self) -> Self {
        self
    }

    #[inline(always)]
    fn sqrt(self) -> Self {
        Float::sqrt(self)
    }

    #[inline(always)]
    fn abs(self) -> Self {
        Float::abs(self)
    }

    #[inline(always)]
    fn sin(self) -> Self {
        Float::sin(self)
    }

    #[inline(always)]
    fn cos(self) -> Self {
        Float::cos(self)
    }

    #[inline(always)]
    fn acos(self) -> Self {
        Float::acos(self)
    }

    #[inline(always)]
    fn atan2(self, x: Self) -> Self {
        Float::atan2(self, x)
    }

    #[inline(always)]
    fn exp(self) -> Self {
        Float::exp(self)
    }

    #[inline(always)]
    fn ln(self) -> Self {
        Float::ln(self)
    }

    #[inline(always)]
    fn powf(self, e: Float) -> Self {
        Float::powf(self, e)
    }
}

impl Scalar for Real {
    #[inline(always)]
    fn value(self) -> Float {
        Real::value(&self)
    }

    #[inline(always)]
    fn detached(self) -> Self {
        self.detach()
    }

    fn sqrt(self) -> Self {
        let v = self.value().sqrt();
        self.chain(v, 0.5 / v)
    }

    fn abs(self) -> Self {
        let x = self.value();
        self.chain(x.abs(), if x < 0.0 { -1.0 } else { 1.0 })
    }

    fn sin(self) -> Self {
        let x = self.value();
        self.chain(x.sin(), x.cos())
    }

    fn cos(self) -> Self {
        let x = self.value();
        self.chain(x.cos(), -x.sin())
    }

    fn acos(self) -> Self {
        let x = self.value();
        self.chain(x.acos(), -1.0 / (1.0 - x * x).sqrt())
    }

    fn atan2(self, x: Self) -> Self {
        let (yv, xv) = (self.value(), x.value());
        let r2 = xv * xv + yv * yv;
        Real::chain2(self, x, yv.atan2(xv), xv / r2, -yv / r2)
    }

    fn exp(self) -> Self {
        let v = self.value().exp();
        self.chain(v, v)
    }

    fn ln(self) -> Self {
        let x = self.value();
        self.chain(x.ln(), 1.0 / x)
    }

    fn powf(self, e: Float) -> Self {
        let x = self.value();
        self.chain(x.powf(e), e * x.powf(e - 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::*;

    fn f<T: Scalar>(x: T) -> T {
        (x * x + 1.0).sqrt()
    }

    #[test]
    fn generic_code_matches_plain_floats() {
        let x = Real::variable(2.0, 0);
        let y = f(x);
        assert!(approx_eq!(f32, y.value(), f(2.0f32), ulps = 2));
        // d/dx sqrt(x² + 1) = x / sqrt(x² + 1)
        assert!(approx_eq!(f32, y.grad_at(0), 2.0 / 5.0f32.sqrt(), ulps = 4));
    }

    #[test]
    fn safe_sqrt_is_flat_below_zero() {
        let x = Real::variable(-1.0, 0);
        let y = x.safe_sqrt();
        assert_eq!(y.value(), 0.0);
        assert_eq!(y.grad_at(0), 0.0);
    }

    #[test]
    fn atan2_derivative() {
        let y = Real::variable(1.0, 0);
        let a = y.atan2(Real::constant(1.0));
        assert!(approx_eq!(f32, a.grad_at(0), 0.5, ulps = 4));
    }
}
