//! Emitters

use crate::ad::*;
use crate::geometry::*;
use crate::interaction::*;
use crate::pbrt::*;
use crate::scene::*;
use crate::spectrum::*;
use bitflags::bitflags;

bitflags! {
    /// Classification of emitters.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct EmitterFlags: u8 {
        /// Emission from a single point.
        const DELTA_POSITION = 1;

        /// Emission from the surface of a shape.
        const SURFACE = 2;

        /// Emission from infinitely far away.
        const INFINITE = 4;
    }
}

/// Emitter interface.
pub trait Emitter: Send + Sync {
    /// Returns the emitter type for debugging.
    fn get_type(&self) -> &'static str;

    /// Returns the identifier used as the prefix of parameter keys.
    fn id(&self) -> &str;

    /// Returns the emitter classification.
    fn flags(&self) -> EmitterFlags;

    /// Returns the index of the shape an area emitter is attached to.
    fn shape(&self) -> Option<usize> {
        None
    }

    /// Returns `true` for emitters located at a single point.
    fn is_delta_position(&self) -> bool {
        self.flags().contains(EmitterFlags::DELTA_POSITION)
    }

    /// Samples a position on the emitter as seen from a reference point.
    /// Returns the sample and the detached weight `Le / pdf`; visibility is
    /// not tested.
    ///
    /// * `scene` - The scene.
    /// * `p_ref` - Reference point.
    /// * `u`     - Sample value to use.
    fn sample_direction(&self, scene: &Scene, p_ref: &Point3f, u: &Point2f) -> (DirectionSample, SpectrumF);

    /// Returns the solid angle density of `sample_direction`.
    ///
    /// * `scene` - The scene.
    /// * `p_ref` - Reference point.
    /// * `ds`    - The direction sample.
    fn pdf_direction(&self, scene: &Scene, p_ref: &Point3f, ds: &DirectionSample) -> Float;

    /// Returns the radiance leaving the emitter towards `si.wi`. For infinite
    /// emitters `si` is the record of an escaped ray.
    ///
    /// * `si` - Surface interaction on the emitter.
    fn eval(&self, si: &SurfaceInteraction) -> Spectrum;

    /// Re-evaluates the emitted radiance arriving at a reference point along
    /// a previously sampled direction, keeping the value attached to the
    /// emitter parameters and to `ds.p`.
    ///
    /// * `p_ref` - Reference point.
    /// * `ds`    - The direction sample.
    fn eval_direction(&self, p_ref: &Point3r, ds: &DirectionSample) -> Spectrum;

    /// Visits every differentiable parameter.
    ///
    /// * `cb` - Callback.
    fn traverse(&mut self, _cb: &mut dyn FnMut(&str, &mut Real)) {}
}
