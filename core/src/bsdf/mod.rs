//! Surface scattering models

use crate::ad::*;
use crate::geometry::*;
use crate::interaction::*;
use crate::pbrt::*;
use crate::spectrum::*;
use bitflags::bitflags;

mod fresnel;

// Re-export
pub use fresnel::*;

bitflags! {
    /// Lobes of a BSDF.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct BSDFFlags: u8 {
        /// Lambertian-like reflection.
        const DIFFUSE_REFLECTION = 1;

        /// Ideal specular reflection.
        const DELTA_REFLECTION = 2;

        /// Ideal specular transmission.
        const DELTA_TRANSMISSION = 4;

        /// Lobes with a non-degenerate density.
        const SMOOTH = Self::DIFFUSE_REFLECTION.bits();

        /// Lobes described by Dirac deltas.
        const DELTA = Self::DELTA_REFLECTION.bits() | Self::DELTA_TRANSMISSION.bits();
    }
}

impl BSDFFlags {
    /// Returns `true` if any lobe can be sampled by next event estimation.
    pub fn has_smooth(&self) -> bool {
        self.intersects(Self::SMOOTH)
    }

    /// Returns `true` if any lobe is a Dirac delta.
    pub fn has_delta(&self) -> bool {
        self.intersects(Self::DELTA)
    }
}

/// Direction of light transport; affects non-symmetric scattering.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TransportMode {
    /// Paths traced from the sensor.
    #[default]
    Radiance,

    /// Paths traced from an emitter or a discontinuity towards the sensor.
    Importance,
}

/// Evaluation context passed to BSDF queries.
#[derive(Copy, Clone, Debug, Default)]
pub struct BSDFContext {
    /// Transport mode.
    pub mode: TransportMode,
}

impl BSDFContext {
    /// Returns a context for the given transport mode.
    ///
    /// * `mode` - Transport mode.
    pub fn new(mode: TransportMode) -> Self {
        Self { mode }
    }
}

/// Result of sampling a BSDF. All fields are detached.
#[derive(Copy, Clone, Debug, Default)]
pub struct BSDFSample {
    /// Sampled direction in the local shading frame.
    pub wo: Vector3f,

    /// Solid angle density of the sample; for delta lobes, the probability
    /// of the chosen lobe.
    pub pdf: Float,

    /// Relative index of refraction along the sampled direction.
    pub eta: Float,

    /// Lobe that produced the sample.
    pub sampled_type: BSDFFlags,
}

/// Interface for surface scattering models. Directions passed in and out are
/// expressed in the local shading frame; `si.wi` holds the incident
/// direction.
pub trait BSDF: Send + Sync {
    /// Returns the BSDF type for debugging.
    fn get_type(&self) -> &'static str;

    /// Returns the lobes of this BSDF.
    fn flags(&self) -> BSDFFlags;

    /// Samples an outgoing direction. Returns the sample and the detached
    /// weight `f·|cos θo| / pdf`; a zero pdf marks a failed sample.
    ///
    /// * `ctx` - Evaluation context.
    /// * `si`  - Surface interaction.
    /// * `u1`  - Sample value for lobe selection.
    /// * `u2`  - Sample value for direction.
    fn sample(&self, ctx: &BSDFContext, si: &SurfaceInteraction, u1: Float, u2: &Point2f) -> (BSDFSample, SpectrumF);

    /// Evaluates `f·|cos θo|` for the smooth lobes. The value is attached
    /// when the BSDF parameters, `si.wi` or `wo` are.
    ///
    /// * `ctx` - Evaluation context.
    /// * `si`  - Surface interaction.
    /// * `wo`  - Outgoing direction in the local frame.
    fn eval(&self, ctx: &BSDFContext, si: &SurfaceInteraction, wo: &Vector3r) -> Spectrum;

    /// Returns the solid angle density of sampling `wo`; zero for delta
    /// lobes.
    ///
    /// * `ctx` - Evaluation context.
    /// * `si`  - Surface interaction.
    /// * `wo`  - Outgoing direction in the local frame.
    fn pdf(&self, ctx: &BSDFContext, si: &SurfaceInteraction, wo: &Vector3f) -> Float;

    /// Evaluates the BSDF value and density at once.
    ///
    /// * `ctx` - Evaluation context.
    /// * `si`  - Surface interaction.
    /// * `wo`  - Outgoing direction in the local frame.
    fn eval_pdf(&self, ctx: &BSDFContext, si: &SurfaceInteraction, wo: &Vector3r) -> (Spectrum, Float) {
        (self.eval(ctx, si, wo), self.pdf(ctx, si, &wo.value()))
    }

    /// Visits every differentiable parameter.
    ///
    /// * `prefix` - Key prefix.
    /// * `cb`     - Callback.
    fn traverse(&mut self, _prefix: &str, _cb: &mut dyn FnMut(&str, &mut Real)) {}
}

/// Visits the channels of a differentiable spectrum as `<prefix>.r|g|b`.
///
/// * `prefix` - Key prefix.
/// * `s`      - The spectrum.
/// * `cb`     - Callback.
pub fn traverse_spectrum(prefix: &str, s: &mut Spectrum, cb: &mut dyn FnMut(&str, &mut Real)) {
    for (i, c) in ["r", "g", "b"].iter().enumerate() {
        cb(&format!("{}.{}", prefix, c), &mut s[i]);
    }
}
