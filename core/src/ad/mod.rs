//! Automatic differentiation

mod real;
mod scalar;
mod tracker;

// Re-export
pub use real::*;
pub use scalar::*;
pub use tracker::*;

/// Number of scene parameters whose derivatives can be tracked at once.
pub const GRAD_WIDTH: usize = 8;

/// Differentiation mode of an integrator pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ADMode {
    /// Plain rendering; no derivative tracking.
    Primal,

    /// Propagate parameter tangents to image tangents.
    Forward,

    /// Propagate image adjoints back to parameter gradients.
    Backward,
}

impl ADMode {
    /// Returns `true` for the primal mode.
    pub fn is_primal(&self) -> bool {
        *self == ADMode::Primal
    }
}
