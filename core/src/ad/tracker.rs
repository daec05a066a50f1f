//! Gradient tracking for forward and backward passes

use super::*;
use crate::pbrt::*;
use crate::spectrum::*;

/// Collects parameter-space derivatives for one differential pass.
///
/// In forward mode the tracker holds one tangent per gradient slot and
/// projects attached values onto them. In backward mode it accumulates
/// `Σ_c δ_c · ∂L_c/∂π` into per-slot gradients.
#[derive(Clone, Debug, Default)]
pub struct GradientTracker {
    /// Tangent per gradient slot (forward mode).
    pub tangents: [Float; GRAD_WIDTH],

    /// Accumulated gradient per gradient slot (backward mode).
    pub gradients: [Float; GRAD_WIDTH],

    /// Set once any attached contribution reached the tracker.
    pub attached_seen: bool,
}

impl GradientTracker {
    /// Returns a tracker for a forward pass with the given tangents.
    ///
    /// * `tangents` - Tangent per gradient slot.
    pub fn with_tangents(tangents: [Float; GRAD_WIDTH]) -> Self {
        Self {
            tangents,
            ..Default::default()
        }
    }

    /// Projects an attached spectrum onto the tangents and returns the
    /// resulting per-channel derivative.
    ///
    /// * `s` - The attached spectrum.
    pub fn forward_to(&mut self, s: &Spectrum) -> SpectrumF {
        if s.is_attached() {
            self.attached_seen = true;
        }
        SpectrumF::new(
            s[0].directional(&self.tangents),
            s[1].directional(&self.tangents),
            s[2].directional(&self.tangents),
        )
    }

    /// Projects an attached scalar onto the tangents.
    ///
    /// * `r` - The attached scalar.
    pub fn forward_scalar(&mut self, r: &Real) -> Float {
        if r.is_attached() {
            self.attached_seen = true;
        }
        r.directional(&self.tangents)
    }

    /// Accumulates the gradient of `Σ_c s_c` where `s` already carries the
    /// adjoint weights.
    ///
    /// * `s` - The weighted attached spectrum.
    pub fn backward_from(&mut self, s: &Spectrum) {
        if !s.is_attached() {
            return;
        }
        self.attached_seen = true;
        for c in 0..3 {
            for (g, d) in self.gradients.iter_mut().zip(s[c].grad().iter()) {
                *g += d;
            }
        }
    }

    /// Accumulates the gradient of a scalar weighted by `weight`.
    ///
    /// * `r`      - The attached scalar.
    /// * `weight` - Adjoint weight.
    pub fn backward_scalar(&mut self, r: &Real, weight: Float) {
        if !r.is_attached() || weight == 0.0 {
            return;
        }
        self.attached_seen = true;
        for (g, d) in self.gradients.iter_mut().zip(r.grad().iter()) {
            *g += weight * d;
        }
    }

    /// Merges the results of another tracker, typically from another worker
    /// thread.
    ///
    /// * `other` - The other tracker.
    pub fn merge(&mut self, other: &GradientTracker) {
        for (g, o) in self.gradients.iter_mut().zip(other.gradients.iter()) {
            *g += o;
        }
        self.attached_seen |= other.attached_seen;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backward_accumulates_weighted_channels() {
        let x = Real::variable(2.0, 1);
        let s = Spectrum::new(x, x * 2.0, Real::constant(1.0));
        let mut tracker = GradientTracker::default();
        tracker.backward_from(&(s * SpectrumF::new(1.0, 0.5, 3.0)));
        assert_eq!(tracker.gradients[1], 2.0);
        assert!(tracker.attached_seen);
    }

    #[test]
    fn forward_projects_onto_tangents() {
        let x = Real::variable(2.0, 0);
        let y = Real::variable(1.0, 3);
        let mut t = [0.0; GRAD_WIDTH];
        t[0] = 1.0;
        t[3] = -2.0;
        let mut tracker = GradientTracker::with_tangents(t);
        let d = tracker.forward_to(&Spectrum::splat(x + y));
        assert_eq!(d[0], -1.0);
    }

    #[test]
    fn detached_contributions_are_not_seen() {
        let mut tracker = GradientTracker::default();
        tracker.backward_from(&Spectrum::splat(Real::constant(3.0)));
        assert!(!tracker.attached_seen);
    }
}
