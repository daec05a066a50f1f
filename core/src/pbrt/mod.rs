//! PBRT common stuff

mod common;

// Re-export
pub use common::*;
