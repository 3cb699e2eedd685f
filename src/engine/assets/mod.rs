//! CPU side asset data.
//!
//! Decoded textures and model files live here. Nothing in this module talks
//! to the GPU; uploading goes through the [`AssetCache`](crate::rendering::AssetCache).

mod model_file;
mod texture;

pub use self::model_file::*;
pub use self::texture::*;
