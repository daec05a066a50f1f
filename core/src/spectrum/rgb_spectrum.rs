//! RGB Spectrum

use super::{Spectrum, SpectrumF, SPECTRUM_SAMPLES};
use crate::ad::*;
use crate::pbrt::*;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

/// Stores a spectral power distribution as red, green and blue coefficients.
#[derive(Copy, Clone, Default, PartialEq)]
pub struct RGBSpectrum<T> {
    /// The RGB coefficients.
    pub c: [T; SPECTRUM_SAMPLES],
}

impl<T: Scalar> RGBSpectrum<T> {
    /// Returns a new `RGBSpectrum`.
    ///
    /// * `r` - Red.
    /// * `g` - Green.
    /// * `b` - Blue.
    pub fn new(r: T, g: T, b: T) -> Self {
        Self { c: [r, g, b] }
    }

    /// Returns a spectrum with all channels set to `v`.
    ///
    /// * `v` - The value.
    pub fn splat(v: T) -> Self {
        Self { c: [v; SPECTRUM_SAMPLES] }
    }

    /// Returns a black spectrum.
    pub fn zero() -> Self {
        Self::splat(T::from(0.0))
    }

    /// Returns a spectrum with all channels set to one.
    pub fn one() -> Self {
        Self::splat(T::from(1.0))
    }

    /// Returns `true` if all channels are zero.
    pub fn is_black(&self) -> bool {
        self.c.iter().all(|v| v.value() == 0.0)
    }

    /// Returns `true` if any channel is NaN.
    pub fn has_nans(&self) -> bool {
        self.c.iter().any(|v| v.value().is_nan())
    }

    /// Returns the largest channel value.
    pub fn max_value(&self) -> T {
        self.c[0].max(self.c[1]).max(self.c[2])
    }

    /// Returns the channel average.
    pub fn average(&self) -> T {
        (self.c[0] + self.c[1] + self.c[2]) / 3.0
    }

    /// Returns the luminance (Y of CIE XYZ).
    pub fn y(&self) -> T {
        self.c[0] * 0.212671 + self.c[1] * 0.715160 + self.c[2] * 0.072169
    }

    /// Returns per-channel absolute values.
    pub fn abs(&self) -> Self {
        self.map(|v| v.abs())
    }

    /// Returns the detached primal values.
    pub fn value(&self) -> SpectrumF {
        SpectrumF::new(self.c[0].value(), self.c[1].value(), self.c[2].value())
    }

    /// Returns a copy with derivative tracking removed.
    pub fn detach(&self) -> Self {
        self.map(|v| v.detached())
    }

    /// Replaces non-finite channels with zero.
    pub fn finite_or_zero(&self) -> Self {
        self.map(|v| if v.value().is_finite() { v } else { T::from(0.0) })
    }

    /// Applies a function to each channel.
    ///
    /// * `f` - The function.
    pub fn map<F: Fn(T) -> T>(&self, f: F) -> Self {
        Self {
            c: [f(self.c[0]), f(self.c[1]), f(self.c[2])],
        }
    }

    /// Scales all channels by a detached factor.
    ///
    /// * `s` - The factor.
    pub fn scale(&self, s: Float) -> Self {
        self.map(|v| v * s)
    }
}

impl Spectrum {
    /// Returns `true` if any channel depends on an enabled parameter.
    pub fn is_attached(&self) -> bool {
        self.c.iter().any(|v| v.is_attached())
    }

    /// Returns a spectrum with the primal of `primal` and the derivatives of
    /// `grad_src`.
    ///
    /// * `primal`   - Supplies the values.
    /// * `grad_src` - Supplies the derivatives.
    pub fn replace_grad(primal: &Spectrum, grad_src: &Spectrum) -> Spectrum {
        Spectrum::new(
            Real::replace_grad(primal[0], grad_src[0]),
            Real::replace_grad(primal[1], grad_src[1]),
            Real::replace_grad(primal[2], grad_src[2]),
        )
    }

    /// Returns the sum of all channels.
    pub fn sum(&self) -> Real {
        self.c[0] + self.c[1] + self.c[2]
    }
}

impl From<SpectrumF> for Spectrum {
    fn from(s: SpectrumF) -> Self {
        Spectrum::new(Real::from(s.c[0]), Real::from(s.c[1]), Real::from(s.c[2]))
    }
}

impl From<[Float; 3]> for SpectrumF {
    fn from(c: [Float; 3]) -> Self {
        Self { c }
    }
}

impl<T: Scalar> Index<usize> for RGBSpectrum<T> {
    type Output = T;

    fn index(&self, i: usize) -> &Self::Output {
        &self.c[i]
    }
}

impl<T: Scalar> IndexMut<usize> for RGBSpectrum<T> {
    fn index_mut(&mut self, i: usize) -> &mut Self::Output {
        &mut self.c[i]
    }
}

impl<T: fmt::Debug> fmt::Debug for RGBSpectrum<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RGB[{:?}, {:?}, {:?}]", self.c[0], self.c[1], self.c[2])
    }
}

impl<T: fmt::Display> fmt::Display for RGBSpectrum<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.c[0], self.c[1], self.c[2])
    }
}

macro_rules! spectrum_binary_op {
    ($tr: ident, $func: ident, $op: tt, $atr: ident, $afunc: ident) => {
        impl<T: Scalar> $tr for RGBSpectrum<T> {
            type Output = Self;

            fn $func(self, rhs: Self) -> Self {
                Self {
                    c: [self.c[0] $op rhs.c[0], self.c[1] $op rhs.c[1], self.c[2] $op rhs.c[2]],
                }
            }
        }

        impl<T: Scalar> $tr<T> for RGBSpectrum<T> {
            type Output = Self;

            fn $func(self, rhs: T) -> Self {
                Self {
                    c: [self.c[0] $op rhs, self.c[1] $op rhs, self.c[2] $op rhs],
                }
            }
        }

        impl $tr<SpectrumF> for Spectrum {
            type Output = Spectrum;

            fn $func(self, rhs: SpectrumF) -> Spectrum {
                Spectrum {
                    c: [self.c[0] $op rhs.c[0], self.c[1] $op rhs.c[1], self.c[2] $op rhs.c[2]],
                }
            }
        }

        impl $tr<Float> for Spectrum {
            type Output = Spectrum;

            fn $func(self, rhs: Float) -> Spectrum {
                Spectrum {
                    c: [self.c[0] $op rhs, self.c[1] $op rhs, self.c[2] $op rhs],
                }
            }
        }

        impl<T: Scalar> $atr for RGBSpectrum<T> {
            fn $afunc(&mut self, rhs: Self) {
                *self = *self $op rhs;
            }
        }

        impl<T: Scalar> $atr<T> for RGBSpectrum<T> {
            fn $afunc(&mut self, rhs: T) {
                *self = *self $op rhs;
            }
        }

        impl $atr<SpectrumF> for Spectrum {
            fn $afunc(&mut self, rhs: SpectrumF) {
                *self = *self $op rhs;
            }
        }
    };
}

spectrum_binary_op!(Add, add, +, AddAssign, add_assign);
spectrum_binary_op!(Sub, sub, -, SubAssign, sub_assign);
spectrum_binary_op!(Mul, mul, *, MulAssign, mul_assign);
spectrum_binary_op!(Div, div, /, DivAssign, div_assign);

impl<T: Scalar> Neg for RGBSpectrum<T> {
    type Output = Self;

    fn neg(self) -> Self {
        self.map(|v| -v)
    }
}

impl Mul<Spectrum> for Real {
    type Output = Spectrum;

    fn mul(self, rhs: Spectrum) -> Spectrum {
        rhs * self
    }
}

impl Mul<SpectrumF> for Float {
    type Output = SpectrumF;

    fn mul(self, rhs: SpectrumF) -> SpectrumF {
        rhs * self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_value_and_black() {
        let s = SpectrumF::new(0.1, 0.7, 0.3);
        assert_eq!(s.max_value(), 0.7);
        assert!(!s.is_black());
        assert!(SpectrumF::zero().is_black());
    }

    #[test]
    fn attached_times_detached() {
        let x = Real::variable(2.0, 0);
        let s = Spectrum::splat(x) * SpectrumF::new(1.0, 2.0, 3.0);
        assert_eq!(s[2].value(), 6.0);
        assert_eq!(s[2].grad_at(0), 3.0);
        assert!(s.is_attached());
        assert!(!s.detach().is_attached());
    }

    #[test]
    fn replace_grad_per_channel() {
        let x = Real::variable(4.0, 0);
        let s = Spectrum::replace_grad(&Spectrum::one(), &Spectrum::splat(x));
        assert_eq!(s[1].value(), 1.0);
        assert_eq!(s[1].grad_at(0), 1.0);
    }
}
