//! Images

use crate::error::*;
use crate::geometry::*;
use crate::image_io;
use crate::pbrt::*;
use crate::spectrum::*;

/// A developed RGB image stored in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    /// Resolution in pixels.
    pub size: Point2i,

    /// The pixels.
    pub pixels: Vec<SpectrumF>,
}

impl Image {
    /// Returns a black image.
    ///
    /// * `size` - Resolution in pixels.
    pub fn new(size: Point2i) -> Self {
        Self::constant(size, SpectrumF::zero())
    }

    /// Returns an image where every pixel has the same value.
    ///
    /// * `size`  - Resolution in pixels.
    /// * `value` - Pixel value.
    pub fn constant(size: Point2i, value: SpectrumF) -> Self {
        let n = (size.x.max(0) * size.y.max(0)) as usize;
        Self {
            size,
            pixels: vec![value; n],
        }
    }

    /// Wraps existing pixel data.
    ///
    /// * `size`   - Resolution in pixels.
    /// * `pixels` - Pixel data in row-major order.
    pub fn from_pixels(size: Point2i, pixels: Vec<SpectrumF>) -> Self {
        debug_assert_eq!((size.x * size.y) as usize, pixels.len());
        Self { size, pixels }
    }

    /// Returns the pixel at `(x, y)`.
    ///
    /// * `x` - Column.
    /// * `y` - Row.
    pub fn get(&self, x: Int, y: Int) -> SpectrumF {
        self.pixels[(y * self.size.x + x) as usize]
    }

    /// Returns the sum over all pixels.
    pub fn sum(&self) -> SpectrumF {
        self.pixels.iter().fold(SpectrumF::zero(), |acc, p| acc + *p)
    }

    /// Returns `true` if every pixel is black.
    pub fn is_black(&self) -> bool {
        self.pixels.iter().all(|p| p.is_black())
    }

    /// Writes the image; the format follows the file extension.
    ///
    /// * `path` - Output file path.
    pub fn write(&self, path: &str) -> Result<()> {
        image_io::write_image(path, self)
    }

    /// Reads an OpenEXR image.
    ///
    /// * `path` - Input file path.
    pub fn read(path: &str) -> Result<Self> {
        image_io::read_exr(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_and_indexing() {
        let mut img = Image::new(Point2i::new(3, 2));
        img.pixels[4] = SpectrumF::new(1.0, 2.0, 3.0);
        assert_eq!(img.get(1, 1), SpectrumF::new(1.0, 2.0, 3.0));
        assert_eq!(img.sum(), SpectrumF::new(1.0, 2.0, 3.0));
        assert!(!img.is_black());
    }
}
