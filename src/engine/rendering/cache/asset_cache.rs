use super::{H, ResourceCache};
use crate::engine::assets::{TextureData, TextureError, TextureKey};
use crate::engine::rendering::backend::GraphicsApi;
use crate::engine::rendering::context::RenderContext;
use crate::engine::rendering::program::{ShaderError, ShaderProgram};
use crate::engine::rendering::shader_gen::GeneratedShader;
use crate::engine::rendering::texture::GpuTexture;
use image::RgbaImage;
use log::debug;
use std::path::Path;

pub type HShader = H<ShaderProgram>;
pub type HTexture = H<GpuTexture>;

/// The shader and texture caches shared by every model of a context.
#[derive(Default)]
pub struct AssetCache {
    pub shaders: ResourceCache<String, ShaderProgram>,
    pub textures: ResourceCache<TextureKey, GpuTexture>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shader(&self, handle: HShader) -> Option<&ShaderProgram> {
        self.shaders.resolve(handle)
    }

    pub fn texture(&self, handle: HTexture) -> Option<&GpuTexture> {
        self.textures.resolve(handle)
    }

    /// Compiles `generated` unless a program with the same key already exists.
    pub fn load_shader(
        &mut self,
        api: &mut dyn GraphicsApi,
        generated: &GeneratedShader,
    ) -> Result<HShader, ShaderError> {
        self.shaders
            .load_with(generated.key.clone(), |key| ShaderProgram::new(api, key.as_str(), &generated.code))
    }

    /// Decodes and uploads an image file, once per path.
    pub fn load_texture_file(
        &mut self,
        api: &mut dyn GraphicsApi,
        path: impl AsRef<Path>,
    ) -> Result<HTexture, TextureError> {
        let path = path.as_ref();
        self.textures.load_with(TextureKey::File(path.to_path_buf()), |key| {
            let data = TextureData::load_image(path)?;
            GpuTexture::upload(api, key, &data)
        })
    }

    /// Uploads an in-memory image under `name`. A second image under the same
    /// name resolves to the first upload.
    pub fn load_texture_image(
        &mut self,
        api: &mut dyn GraphicsApi,
        name: impl Into<String>,
        image: &RgbaImage,
    ) -> Result<HTexture, TextureError> {
        self.load_texture_data(api, TextureKey::Named(name.into()), || TextureData::from_image(image))
    }

    pub fn load_texture_data(
        &mut self,
        api: &mut dyn GraphicsApi,
        key: TextureKey,
        data: impl FnOnce() -> TextureData,
    ) -> Result<HTexture, TextureError> {
        self.textures
            .load_with(key, |key| GpuTexture::upload(api, key, &data()))
    }

    /// Releases every cached program and texture.
    pub fn teardown<A: GraphicsApi>(&mut self, ctx: &mut RenderContext<A>) {
        debug!(
            "[Asset Cache] Tearing down {} shaders and {} textures",
            self.shaders.len(),
            self.textures.len()
        );

        self.shaders.drain_into(|_, program| {
            ctx.forget_program(program.id());
            program.release(ctx.api_mut());
        });
        ctx.deactivate_rest(0);
        self.textures.clear(ctx.api_mut());
    }
}
