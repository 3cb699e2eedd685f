//! Everything that talks to the GPU.
//!
//! Models generate their shaders from their configuration, share programs
//! and textures through the [`AssetCache`] and are drawn through a
//! [`RenderContext`], which keeps track of the bound program and texture
//! units so redundant state changes are skipped.

pub mod backend;
pub mod cache;
mod context;
mod draw_order;
pub mod lights;
mod material;
mod model;
mod program;
pub mod shader_gen;
mod texture;
mod vertex_buffer;

pub use self::cache::*;
pub use self::context::*;
pub use self::draw_order::*;
pub use self::lights::{Light, LightSet, MAX_LIGHTS};
pub use self::material::*;
pub use self::model::*;
pub use self::program::*;
pub use self::shader_gen::{GeneratedShader, ShaderDialect, ShaderGen};
pub use self::texture::*;
pub use self::vertex_buffer::*;
