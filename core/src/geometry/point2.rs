//! 2-D Points

use crate::ad::*;
use crate::pbrt::*;
use std::fmt;
use std::ops::{Add, Index, IndexMut, Mul, Sub};

/// A 2-D point containing numeric values.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point2<T> {
    /// X-coordinate.
    pub x: T,

    /// Y-coordinate.
    pub y: T,
}

/// 2-D point containing `Float` values.
pub type Point2f = Point2<Float>;

/// 2-D point containing `Int` values.
pub type Point2i = Point2<Int>;

/// 2-D point containing differentiable `Real` values.
pub type Point2r = Point2<Real>;

/// 2-D vectors share the point representation.
pub type Vector2f = Point2f;

impl<T> Point2<T> {
    /// Creates a new 2-D point.
    ///
    /// * `x` - X-coordinate.
    /// * `y` - Y-coordinate.
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl Point2f {
    /// Returns a new point containing floor of values of the components.
    pub fn floor(&self) -> Self {
        Self::new(self.x.floor(), self.y.floor())
    }
}

impl Point2r {
    /// Returns the detached primal values.
    pub fn value(&self) -> Point2f {
        Point2f::new(self.x.value(), self.y.value())
    }

    /// Returns a copy with derivative tracking removed.
    pub fn detach(&self) -> Self {
        Self::new(self.x.detach(), self.y.detach())
    }
}

impl From<Point2f> for Point2r {
    fn from(p: Point2f) -> Self {
        Self::new(Real::from(p.x), Real::from(p.y))
    }
}

impl From<Point2i> for Point2f {
    /// Convert a 2-D integer point to floating point.
    ///
    /// * `p` - The point.
    fn from(p: Point2i) -> Self {
        Self::new(p.x as Float, p.y as Float)
    }
}

impl<T: Add<Output = T>> Add for Point2<T> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl<T: Sub<Output = T>> Sub for Point2<T> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl<T: Mul<Output = T> + Copy> Mul<T> for Point2<T> {
    type Output = Self;

    fn mul(self, s: T) -> Self {
        Self::new(self.x * s, self.y * s)
    }
}

impl<T> Index<usize> for Point2<T> {
    type Output = T;

    fn index(&self, axis: usize) -> &Self::Output {
        match axis {
            0 => &self.x,
            _ => &self.y,
        }
    }
}

impl<T> IndexMut<usize> for Point2<T> {
    fn index_mut(&mut self, axis: usize) -> &mut Self::Output {
        match axis {
            0 => &mut self.x,
            _ => &mut self.y,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Point2<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}
