//! Core

#[macro_use]
extern crate hexf;
#[macro_use]
extern crate log;

// Re-export.
pub mod ad;
pub mod app;
pub mod bsdf;
pub mod emitter;
pub mod error;
pub mod film;
pub mod filter;
pub mod geometry;
pub mod image_io;
pub mod integrator;
pub mod interaction;
pub mod paramset;
pub mod pbrt;
pub mod rng;
pub mod sampler;
pub mod sampling;
pub mod scene;
pub mod sensor;
pub mod shape;
pub mod spectrum;
