//! Film

use crate::filter::*;
use crate::geometry::*;
use std::sync::{RwLock, RwLockWriteGuard};

mod image;
mod image_block;

// Re-export.
pub use image::*;
pub use image_block::*;

/// Accumulated film contents.
struct FilmStorage {
    /// Weighted splats divided by the filter weight sum on development.
    normalized: ImageBlock,

    /// Splats added without weight normalization.
    unnormalized: ImageBlock,
}

/// Models the sensing device. Render passes accumulate into their own
/// `ImageBlock`s and merge them into the film with `put_block`.
pub struct Film {
    /// Image resolution in pixels.
    pub size: Point2i,

    /// Filter function to use for image reconstruction from samples.
    pub filter: ArcFilter,

    /// Accumulated contents.
    storage: RwLock<FilmStorage>,
}

impl Film {
    /// Create a new `Film` instance.
    ///
    /// * `size`   - Image resolution in pixels.
    /// * `filter` - Filter function to use for image reconstruction.
    pub fn new(size: Point2i, filter: ArcFilter) -> Self {
        let storage = FilmStorage {
            normalized: ImageBlock::new(size, ArcFilter::clone(&filter), true),
            unnormalized: ImageBlock::new(size, ArcFilter::clone(&filter), false),
        };
        Self {
            size,
            filter,
            storage: RwLock::new(storage),
        }
    }

    /// Returns the pixel bounds of the image.
    pub fn bounds(&self) -> Bounds2i {
        Bounds2i::new(Point2i::new(0, 0), self.size)
    }

    /// Returns the number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.bounds().area()
    }

    /// Returns an empty block covering the whole film.
    ///
    /// * `normalize` - Whether splats are divided by the accumulated filter
    ///                 weight on development.
    pub fn create_block(&self, normalize: bool) -> ImageBlock {
        ImageBlock::new(self.size, ArcFilter::clone(&self.filter), normalize)
    }

    /// Adds the contents of a block to the film.
    ///
    /// * `block` - The block to merge.
    pub fn put_block(&self, block: &ImageBlock) {
        let mut storage = self.write_storage();
        if block.normalize() {
            storage.normalized.merge(block);
        } else {
            storage.unnormalized.merge(block);
        }
    }

    /// Discards the accumulated contents.
    pub fn clear(&self) {
        let mut storage = self.write_storage();
        storage.normalized.clear();
        storage.unnormalized.clear();
    }

    /// Returns the developed image: normalized splats divided by their
    /// filter weight sums plus the unnormalized splats.
    pub fn develop(&self) -> Image {
        let storage = match self.storage.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut image = storage.normalized.develop();
        let extra = storage.unnormalized.develop();
        for (p, e) in image.pixels.iter_mut().zip(extra.pixels.iter()) {
            *p += *e;
        }
        image
    }

    /// Returns the write guard, recovering from a poisoned lock.
    fn write_storage(&self) -> RwLockWriteGuard<'_, FilmStorage> {
        match self.storage.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

