//! Box Filter

use prb_core::filter::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;

/// Implements a box filter that gives equal weight to every sample within
/// its extent. It has no useful derivative, so splat positions of
/// three-point integrators carry no gradient through it.
pub struct BoxFilter {
    /// Filter data.
    pub data: FilterData,
}

impl BoxFilter {
    /// Returns a new instance of `BoxFilter`.
    ///
    /// * `radius` - Half extent of the filter; beyond this filter is 0.
    pub fn new(radius: Float) -> Self {
        Self {
            data: FilterData::new(radius),
        }
    }
}

impl Filter for BoxFilter {
    fn get_type(&self) -> &'static str {
        "box"
    }

    fn get_data(&self) -> &FilterData {
        &self.data
    }

    fn eval(&self, x: Float) -> Float {
        // Half-open so that adjacent pixels never both receive a sample.
        if x > -self.data.radius && x <= self.data.radius {
            1.0
        } else {
            0.0
        }
    }

    fn eval_derivative(&self, _x: Float) -> Float {
        0.0
    }

    fn integral_1d(&self) -> Float {
        2.0 * self.data.radius
    }

    fn is_differentiable(&self) -> bool {
        false
    }
}

impl From<&ParamSet> for BoxFilter {
    /// Create a `BoxFilter` from `ParamSet`.
    ///
    /// * `params` - Parameter set.
    fn from(params: &ParamSet) -> Self {
        Self::new(params.find_one_float("radius", 0.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_exactly_one_pixel() {
        let f = BoxFilter::new(0.5);
        assert_eq!(f.eval(0.5), 1.0);
        assert_eq!(f.eval(-0.5), 0.0);
        assert_eq!(f.integral(), 1.0);
        assert!(!f.is_differentiable());
    }
}
