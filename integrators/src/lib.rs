//! Integrators

#[macro_use]
extern crate log;

mod ad_threepoint;
mod common;
mod prb_acoustic;
mod prb_projective;
mod prb_threepoint;
mod projective;

use prb_core::error::*;
use prb_core::integrator::*;
use prb_core::paramset::*;

// Re-export.
pub use ad_threepoint::*;
pub use common::*;
pub use prb_acoustic::*;
pub use prb_projective::*;
pub use prb_threepoint::*;
pub use projective::*;

/// Names of the available integrators.
pub const INTEGRATOR_NAMES: [&str; 4] = ["prb_threepoint", "ad_threepoint", "prb_projective", "prb_acoustic"];

/// Create an integrator by name.
///
/// * `name`   - Integrator name.
/// * `params` - Parameter set.
pub fn create_integrator(name: &str, params: &ParamSet) -> Result<Box<dyn ADIntegrator>> {
    let integrator: Box<dyn ADIntegrator> = match name {
        "prb_threepoint" => Box::new(PRBThreePointIntegrator::try_from(params)?),
        "ad_threepoint" => Box::new(ADThreePointIntegrator::try_from(params)?),
        "prb_projective" => Box::new(PRBProjectiveIntegrator::try_from(params)?),
        "prb_acoustic" => Box::new(PRBAcousticIntegrator::try_from(params)?),
        _ => {
            return Err(Error::Config(
                "integrator".to_string(),
                format!("'{}' (expected one of {})", name, INTEGRATOR_NAMES.join(", ")),
            ))
        }
    };
    debug!("Created integrator '{}'", integrator.get_type());
    Ok(integrator)
}
