//! 2D Axis Aligned Bounding Boxes.

use crate::geometry::*;
use crate::pbrt::*;
use itertools::iproduct;

/// 2D integer bounding box with an exclusive upper corner; used for pixel
/// and tile ranges.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Bounds2i {
    /// Minimum bounds.
    pub p_min: Point2i,

    /// Maximum bounds (exclusive).
    pub p_max: Point2i,
}

impl Bounds2i {
    /// Creates a new bounding box.
    ///
    /// * `p_min` - Minimum bounds.
    /// * `p_max` - Maximum bounds (exclusive).
    pub fn new(p_min: Point2i, p_max: Point2i) -> Self {
        Self { p_min, p_max }
    }

    /// Returns the extent in x and y.
    pub fn diagonal(&self) -> Point2i {
        Point2i::new(self.p_max.x - self.p_min.x, self.p_max.y - self.p_min.y)
    }

    /// Returns the number of pixels covered.
    pub fn area(&self) -> usize {
        let d = self.diagonal();
        (d.x.max(0) * d.y.max(0)) as usize
    }

    /// Returns the intersection with another box.
    ///
    /// * `other` - The other box.
    pub fn intersect(&self, other: &Self) -> Self {
        Self::new(
            Point2i::new(self.p_min.x.max(other.p_min.x), self.p_min.y.max(other.p_min.y)),
            Point2i::new(self.p_max.x.min(other.p_max.x), self.p_max.y.min(other.p_max.y)),
        )
    }

    /// Returns `true` if the point lies inside.
    ///
    /// * `p` - The point.
    pub fn contains(&self, p: &Point2i) -> bool {
        p.x >= self.p_min.x && p.x < self.p_max.x && p.y >= self.p_min.y && p.y < self.p_max.y
    }

    /// Iterates the pixels row by row.
    pub fn pixels(&self) -> impl Iterator<Item = Point2i> {
        iproduct!(self.p_min.y..self.p_max.y, self.p_min.x..self.p_max.x).map(|(y, x)| Point2i::new(x, y))
    }

    /// Splits the box into square tiles.
    ///
    /// * `tile_size` - Tile edge length in pixels.
    pub fn tiles(&self, tile_size: Int) -> Vec<Bounds2i> {
        let tile_size = tile_size.max(1);
        let d = self.diagonal();
        let nx = (d.x + tile_size - 1) / tile_size;
        let ny = (d.y + tile_size - 1) / tile_size;
        iproduct!(0..ny, 0..nx)
            .map(|(ty, tx)| {
                let p0 = Point2i::new(self.p_min.x + tx * tile_size, self.p_min.y + ty * tile_size);
                let p1 = Point2i::new(
                    (p0.x + tile_size).min(self.p_max.x),
                    (p0.y + tile_size).min(self.p_max.y),
                );
                Bounds2i::new(p0, p1)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiles_cover_every_pixel_once() {
        let b = Bounds2i::new(Point2i::new(0, 0), Point2i::new(37, 21));
        let tiles = b.tiles(16);
        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles.iter().map(|t| t.area()).sum::<usize>(), b.area());
    }

    #[test]
    fn pixels_iterates_row_major() {
        let b = Bounds2i::new(Point2i::new(1, 1), Point2i::new(3, 2));
        let v: Vec<Point2i> = b.pixels().collect();
        assert_eq!(v, vec![Point2i::new(1, 1), Point2i::new(2, 1)]);
    }
}
