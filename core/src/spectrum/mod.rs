//! Spectrum

mod rgb_spectrum;

// Re-export
pub use rgb_spectrum::*;

use crate::ad::Real;
use crate::pbrt::Float;

/// Differentiable RGB spectrum used for radiance and throughput.
pub type Spectrum = RGBSpectrum<Real>;

/// Detached RGB spectrum.
pub type SpectrumF = RGBSpectrum<Float>;

/// Number of samples used in `Spectrum`.
pub const SPECTRUM_SAMPLES: usize = 3;
