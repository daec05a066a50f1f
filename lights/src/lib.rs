//! Lights

#[macro_use]
extern crate log;

mod area;
mod constant;
mod point;

// Re-export
pub use area::*;
pub use constant::*;
pub use point::*;
