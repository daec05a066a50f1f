//! 3D Axis Aligned Bounding Boxes.

use crate::geometry::*;
use crate::pbrt::*;

/// 3D axis aligned bounding box with `Float` corners.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds3f {
    /// Minimum bounds.
    pub p_min: Point3f,

    /// Maximum bounds.
    pub p_max: Point3f,
}

impl Default for Bounds3f {
    /// Returns an empty box that can be grown with `union_point`.
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds3f {
    /// Box where minimum and maximum bounds are swapped extremes so it can be
    /// grown from nothing iteratively.
    pub const EMPTY: Self = Self {
        p_min: Point3f::new(INFINITY, INFINITY, INFINITY),
        p_max: Point3f::new(-INFINITY, -INFINITY, -INFINITY),
    };

    /// Unit cube [0, 1]³.
    pub const UNIT: Self = Self {
        p_min: Point3f::new(0.0, 0.0, 0.0),
        p_max: Point3f::new(1.0, 1.0, 1.0),
    };

    /// Creates a new bounding box from two corners.
    ///
    /// * `p1` - First corner.
    /// * `p2` - Second corner.
    pub fn new(p1: Point3f, p2: Point3f) -> Self {
        Self {
            p_min: p1.min_elem(&p2),
            p_max: p1.max_elem(&p2),
        }
    }

    /// Returns `true` if the box contains no points.
    pub fn is_empty(&self) -> bool {
        self.p_min.x > self.p_max.x || self.p_min.y > self.p_max.y || self.p_min.z > self.p_max.z
    }

    /// Returns the box grown to contain a point.
    ///
    /// * `p` - The point.
    pub fn union_point(&self, p: &Point3f) -> Self {
        Self {
            p_min: self.p_min.min_elem(p),
            p_max: self.p_max.max_elem(p),
        }
    }

    /// Returns the box grown to contain another box.
    ///
    /// * `b` - The other box.
    pub fn union(&self, b: &Self) -> Self {
        Self {
            p_min: self.p_min.min_elem(&b.p_min),
            p_max: self.p_max.max_elem(&b.p_max),
        }
    }

    /// Returns the vector from the minimum to the maximum corner.
    pub fn diagonal(&self) -> Vector3f {
        self.p_max - self.p_min
    }

    /// Returns the center of the box.
    pub fn center(&self) -> Point3f {
        (self.p_min + self.p_max) * 0.5
    }

    /// Returns the volume.
    pub fn volume(&self) -> Float {
        let d = self.diagonal();
        d.x * d.y * d.z
    }

    /// Returns the radius of the bounding sphere.
    pub fn bounding_radius(&self) -> Float {
        0.5 * self.diagonal().length()
    }

    /// Returns `true` if the point lies inside (closed on all faces).
    ///
    /// * `p` - The point.
    pub fn contains(&self, p: &Point3f) -> bool {
        p.x >= self.p_min.x
            && p.x <= self.p_max.x
            && p.y >= self.p_min.y
            && p.y <= self.p_max.y
            && p.z >= self.p_min.z
            && p.z <= self.p_max.z
    }

    /// Maps a point in [0, 1]³ into the box.
    ///
    /// * `t` - Relative position.
    pub fn lerp(&self, t: &Point3f) -> Point3f {
        self.p_min + self.diagonal().mul_elem(t)
    }

    /// Returns the child octant selected by the bits of `i` (x = bit 0,
    /// y = bit 1, z = bit 2).
    ///
    /// * `i` - Child index in [0, 8).
    pub fn octant(&self, i: usize) -> Self {
        let c = self.center();
        let pick = |bit: usize, axis: usize| {
            if i & bit == 0 {
                (self.p_min[axis], c[axis])
            } else {
                (c[axis], self.p_max[axis])
            }
        };
        let (x0, x1) = pick(1, 0);
        let (y0, y1) = pick(2, 1);
        let (z0, z1) = pick(4, 2);
        Self {
            p_min: Point3f::new(x0, y0, z0),
            p_max: Point3f::new(x1, y1, z1),
        }
    }

    /// Slab test. Returns the parametric entry and exit distances.
    ///
    /// * `ray` - The ray.
    pub fn intersect_p(&self, ray: &Ray) -> Option<(Float, Float)> {
        let (mut t0, mut t1) = (0.0, ray.t_max);
        for axis in 0..3 {
            let inv = 1.0 / ray.d[axis];
            let mut t_near = (self.p_min[axis] - ray.o[axis]) * inv;
            let mut t_far = (self.p_max[axis] - ray.o[axis]) * inv;
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            t0 = if t_near > t0 { t_near } else { t0 };
            t1 = if t_far < t1 { t_far } else { t1 };
            if t0 > t1 {
                return None;
            }
        }
        Some((t0, t1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octants_partition_the_box() {
        let b = Bounds3f::UNIT;
        let total: Float = (0..8).map(|i| b.octant(i).volume()).sum();
        assert_eq!(total, 1.0);
        assert!(b.octant(7).contains(&Point3f::new(0.9, 0.9, 0.9)));
        assert!(b.octant(1).contains(&Point3f::new(0.9, 0.1, 0.1)));
    }

    #[test]
    fn ray_hits_box() {
        let b = Bounds3f::new(Point3f::new(-1.0, -1.0, -1.0), Point3f::new(1.0, 1.0, 1.0));
        let r = Ray::new(Point3f::new(0.0, 0.0, -5.0), Vector3f::new(0.0, 0.0, 1.0));
        let (t0, t1) = b.intersect_p(&r).unwrap();
        assert_eq!((t0, t1), (4.0, 6.0));
    }
}
