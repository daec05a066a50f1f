//! Gaussian Filter

use prb_core::filter::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;

/// Number of Simpson intervals used to integrate the profile.
const INTEGRAL_STEPS: usize = 256;

/// Implements a Gaussian filter truncated at four standard deviations. The
/// value at the radius is subtracted so the profile goes to zero at the
/// boundary.
pub struct GaussianFilter {
    /// Filter data.
    pub data: FilterData,

    /// Exponent scale `-1 / (2σ²)`.
    pub alpha: Float,

    /// Value of the Gaussian at the radius.
    pub bias: Float,

    /// Integral of the 1-D profile.
    integral: Float,
}

impl GaussianFilter {
    /// Returns a new instance of `GaussianFilter`.
    ///
    /// * `stddev` - Standard deviation in pixels.
    pub fn new(stddev: Float) -> Self {
        let radius = 4.0 * stddev;
        let alpha = -1.0 / (2.0 * stddev * stddev);
        let mut filter = Self {
            data: FilterData::new(radius),
            alpha,
            bias: (alpha * radius * radius).exp(),
            integral: 0.0,
        };
        filter.integral = filter.simpson();
        filter
    }

    /// Integrates the profile with Simpson's rule.
    fn simpson(&self) -> Float {
        let r = self.data.radius;
        let h = 2.0 * r / INTEGRAL_STEPS as Float;
        let mut sum = self.eval(-r) + self.eval(r);
        for i in 1..INTEGRAL_STEPS {
            let w = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += w * self.eval(-r + i as Float * h);
        }
        sum * h / 3.0
    }
}

impl Filter for GaussianFilter {
    fn get_type(&self) -> &'static str {
        "gaussian"
    }

    fn get_data(&self) -> &FilterData {
        &self.data
    }

    fn eval(&self, x: Float) -> Float {
        max(0.0, (self.alpha * x * x).exp() - self.bias)
    }

    fn eval_derivative(&self, x: Float) -> Float {
        if abs(x) >= self.data.radius {
            0.0
        } else {
            2.0 * self.alpha * x * (self.alpha * x * x).exp()
        }
    }

    fn integral_1d(&self) -> Float {
        self.integral
    }
}

impl From<&ParamSet> for GaussianFilter {
    /// Create a `GaussianFilter` from `ParamSet`.
    ///
    /// * `params` - Parameter set.
    fn from(params: &ParamSet) -> Self {
        Self::new(params.find_one_float("stddev", 0.5))
    }
}
