//! Shapes

#[macro_use]
extern crate log;

mod common;
mod cylinder;
mod disk;
mod mesh;
mod rectangle;
mod sphere;

// Re-export.
pub use common::*;
pub use cylinder::*;
pub use disk::*;
pub use mesh::*;
pub use rectangle::*;
pub use sphere::*;
