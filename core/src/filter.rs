//! Reconstruction filters

use crate::geometry::*;
use crate::pbrt::*;
use std::sync::Arc;

/// Common filter parameters.
#[derive(Copy, Clone, Debug)]
pub struct FilterData {
    /// Half extent of the filter footprint in pixels.
    pub radius: Float,

    /// Reciprocal of `radius`.
    pub inv_radius: Float,
}

impl FilterData {
    /// Returns a new `FilterData`.
    ///
    /// * `radius` - Half extent of the footprint in pixels.
    pub fn new(radius: Float) -> Self {
        Self {
            radius,
            inv_radius: 1.0 / radius,
        }
    }
}

/// Separable pixel reconstruction filter. Image blocks use the 1-D profile
/// along both axes.
pub trait Filter: Send + Sync {
    /// Returns the filter type for debugging.
    fn get_type(&self) -> &'static str;

    /// Return the filter parameters.
    fn get_data(&self) -> &FilterData;

    /// Returns the 1-D profile at offset `x` from the filter center.
    ///
    /// * `x` - Offset in pixels.
    fn eval(&self, x: Float) -> Float;

    /// Returns the derivative of the 1-D profile.
    ///
    /// * `x` - Offset in pixels.
    fn eval_derivative(&self, x: Float) -> Float;

    /// Returns the integral of the 1-D profile.
    fn integral_1d(&self) -> Float;

    /// Returns `false` when the profile has a zero derivative almost
    /// everywhere, so splat positions carry no gradient.
    fn is_differentiable(&self) -> bool {
        true
    }

    /// Returns the filter radius in pixels.
    fn radius(&self) -> Float {
        self.get_data().radius
    }

    /// Returns the 2-D filter value.
    ///
    /// * `d` - Offset from the filter center.
    fn eval_2d(&self, d: &Vector2f) -> Float {
        self.eval(d.x) * self.eval(d.y)
    }

    /// Returns the gradient of the 2-D filter with respect to the offset.
    ///
    /// * `d` - Offset from the filter center.
    fn gradient_2d(&self, d: &Vector2f) -> Vector2f {
        Vector2f::new(
            self.eval_derivative(d.x) * self.eval(d.y),
            self.eval(d.x) * self.eval_derivative(d.y),
        )
    }

    /// Returns the integral of the 2-D filter.
    fn integral(&self) -> Float {
        let i = self.integral_1d();
        i * i
    }
}

/// Atomic reference counted `Filter`.
pub type ArcFilter = Arc<dyn Filter>;
