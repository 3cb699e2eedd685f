//! Core data the renderer consumes: vertex formats, frames and cameras.

pub mod camera;
pub mod frame;
pub mod vertex;

pub use camera::*;
pub use frame::*;
pub use vertex::*;
