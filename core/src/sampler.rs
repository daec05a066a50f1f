//! Sampler

use crate::geometry::*;
use crate::pbrt::*;

/// Sampler interface. A sampler produces one independent stream per sample
/// index so that a pass can be replayed exactly by reseeding with the same
/// `(seed, index)` pair.
pub trait Sampler: Send + Sync {
    /// Returns the sampler type for debugging.
    fn get_type(&self) -> &'static str;

    /// Returns the default number of samples per pixel.
    fn sample_count(&self) -> usize;

    /// Positions the sampler at the start of the stream for one sample.
    ///
    /// * `seed`  - Seed of the pass.
    /// * `index` - Global index of the sample within the pass.
    fn seed(&mut self, seed: u64, index: u64);

    /// Returns the sample value for the next dimension.
    fn next_1d(&mut self) -> Float;

    /// Returns the sample value for the next two dimensions.
    fn next_2d(&mut self) -> Point2f {
        let x = self.next_1d();
        let y = self.next_1d();
        Point2f::new(x, y)
    }

    /// Returns the sample value for the next three dimensions.
    fn next_3d(&mut self) -> Point3f {
        let x = self.next_1d();
        let y = self.next_1d();
        let z = self.next_1d();
        Point3f::new(x, y, z)
    }

    /// Generates a new instance for use by a rendering thread.
    fn clone_sampler(&self) -> Box<dyn Sampler>;
}
