//! Filters

mod boxf; // box is reserved keyword
mod gaussian;
mod triangle;

// Re-export.
pub use boxf::*;
pub use gaussian::*;
pub use triangle::*;

use prb_core::error::*;
use prb_core::filter::*;
use prb_core::paramset::*;
use std::sync::Arc;

/// Creates a reconstruction filter by name.
///
/// * `name`   - One of `box`, `tent`, `gaussian`.
/// * `params` - Filter parameters.
pub fn create_filter(name: &str, params: &ParamSet) -> Result<ArcFilter> {
    match name {
        "box" => Ok(Arc::new(BoxFilter::from(params))),
        "tent" | "triangle" => Ok(Arc::new(TriangleFilter::from(params))),
        "gaussian" => Ok(Arc::new(GaussianFilter::from(params))),
        _ => Err(Error::Config("filter".to_string(), format!("unknown filter '{}'", name))),
    }
}
