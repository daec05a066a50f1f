//! Camera

#[macro_use]
extern crate log;

mod perspective_camera;
mod receiver;

// Re-export
pub use perspective_camera::*;
pub use receiver::*;
