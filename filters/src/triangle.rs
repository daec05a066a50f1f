//! Triangle Filter

use prb_core::filter::*;
use prb_core::paramset::*;
use prb_core::pbrt::*;

/// Implements the triangle (tent) filter in which the weight falls off
/// linearly from the filter center over the extent of the filter.
pub struct TriangleFilter {
    /// Filter data.
    pub data: FilterData,
}

impl TriangleFilter {
    /// Returns a new instance of `TriangleFilter`.
    ///
    /// * `radius` - Radius of the filter; beyond this filter is 0.
    pub fn new(radius: Float) -> Self {
        Self {
            data: FilterData::new(radius),
        }
    }
}

impl Filter for TriangleFilter {
    fn get_type(&self) -> &'static str {
        "tent"
    }

    fn get_data(&self) -> &FilterData {
        &self.data
    }

    /// Returns value of the filter at a given offset.
    ///
    /// * `x` - The offset of the sample point relative to the center of the
    ///         filter.
    fn eval(&self, x: Float) -> Float {
        max(0.0, 1.0 - abs(x) * self.data.inv_radius)
    }

    fn eval_derivative(&self, x: Float) -> Float {
        if abs(x) >= self.data.radius || x == 0.0 {
            0.0
        } else {
            -x.signum() * self.data.inv_radius
        }
    }

    fn integral_1d(&self) -> Float {
        self.data.radius
    }
}

impl From<&ParamSet> for TriangleFilter {
    /// Create a `TriangleFilter` from `ParamSet`.
    ///
    /// * `params` - Parameter set.
    fn from(params: &ParamSet) -> Self {
        Self::new(params.find_one_float("radius", 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn derivative_matches_finite_difference(x in -0.95f32..0.95f32) {
            prop_assume!(x.abs() > 0.01);
            let f = TriangleFilter::new(1.0);
            let h = 1e-3;
            let fd = (f.eval(x + h) - f.eval(x - h)) / (2.0 * h);
            prop_assert!(approx_eq!(f32, fd, f.eval_derivative(x), epsilon = 1e-2));
        }
    }

    #[test]
    fn integral_of_unit_tent() {
        let f = TriangleFilter::new(1.0);
        assert_eq!(f.integral(), 1.0);
        assert_eq!(f.eval(0.0), 1.0);
        assert_eq!(f.eval(1.5), 0.0);
    }
}
