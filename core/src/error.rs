//! Errors

use crate::ad::GRAD_WIDTH;

/// Errors reported by scene setup and the differentiable integrators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid configuration value.
    #[error("Invalid configuration for '{0}': {1}")]
    Config(String, String),

    /// A scene parameter key that no scene object exposes.
    #[error("Unknown scene parameter '{0}'")]
    UnknownParameter(String),

    /// Too many parameters enabled for differentiation.
    #[error("At most {} parameters can be differentiated at once; '{}' exceeds the limit", GRAD_WIDTH, .0)]
    TooManyParameters(String),

    /// A differential pass was requested while no scene parameter has
    /// gradients enabled.
    #[error("The {0} pass needs at least one scene parameter with gradients enabled; call Scene::enable_grad first")]
    NotAttached(&'static str),

    /// The requested number of samples exceeds the wavefront limit.
    #[error("Sample count {0} exceeds the limit of 2^32 samples per pass; reduce spp or split the render into several passes")]
    WavefrontOverflow(u64),

    /// The adjoint image does not match the film size.
    #[error("Adjoint image has {0} values but the film needs {1}")]
    ImageSize(usize, usize),

    /// The guiding octree exceeded its leaf budget.
    #[error("Octree construction produced more than {0} leaves; increase octree_max_leaf_count")]
    OctreeOverflow(usize),

    /// Image encoding or decoding failure.
    #[error("{0}")]
    Image(String),

    /// I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type used across the renderer.
pub type Result<T> = std::result::Result<T, Error>;
