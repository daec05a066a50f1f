//! Materials

#[macro_use]
extern crate log;

mod conductor;
mod dielectric;
mod diffuse;

// Re-export
pub use conductor::*;
pub use dielectric::*;
pub use diffuse::*;

use prb_core::bsdf::*;
use prb_core::error::*;
use prb_core::paramset::*;

/// Create a BSDF by name.
///
/// * `name`   - BSDF name.
/// * `params` - Parameter set.
pub fn create_bsdf(name: &str, params: &ParamSet) -> Result<Box<dyn BSDF>> {
    match name {
        "diffuse" => Ok(Box::new(Diffuse::from(params))),
        "conductor" | "mirror" => Ok(Box::new(Conductor::from(params))),
        "dielectric" | "glass" => Ok(Box::new(Dielectric::try_from(params)?)),
        _ => Err(Error::Config("bsdf".to_string(), format!("unknown BSDF '{}'", name))),
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use prb_core::ad::*;
    use prb_core::geometry::*;
    use prb_core::interaction::*;

    /// Returns an interaction on the `z = 0` plane facing `+z`, lit from
    /// `wi` (world space, towards the light).
    pub fn flat_interaction(wi: Vector3f) -> SurfaceInteraction {
        let n = Normal3r::from(Vector3f::new(0.0, 0.0, 1.0));
        SurfaceInteraction::new(
            Real::from(1.0),
            Point3r::from(Vector3f::zero()),
            n,
            Point2r::default(),
            Vector3r::from(Vector3f::new(1.0, 0.0, 0.0)),
            Vector3r::from(Vector3f::new(0.0, 1.0, 0.0)),
            &Vector3r::from(wi.normalize()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_bsdf_is_rejected() {
        assert!(create_bsdf("velvet", &ParamSet::new()).is_err());
        assert_eq!(create_bsdf("glass", &ParamSet::new()).unwrap().get_type(), "dielectric");
    }
}
