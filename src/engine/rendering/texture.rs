use crate::engine::assets::{TextureData, TextureError, TextureKey, UploadSnafu};
use crate::engine::rendering::backend::{GraphicsApi, TextureId};
use crate::engine::rendering::cache::CacheType;
use snafu::ResultExt;

/// A texture living on the GPU, owned by the texture cache.
#[derive(Debug, PartialEq, Eq)]
pub struct GpuTexture {
    id: TextureId,
    width: u32,
    height: u32,
}

impl GpuTexture {
    pub fn upload(api: &mut dyn GraphicsApi, key: &TextureKey, data: &TextureData) -> Result<Self, TextureError> {
        let id = api
            .create_texture(data.width, data.height, &data.rgba)
            .context(UploadSnafu { key: key.clone() })?;

        Ok(GpuTexture {
            id,
            width: data.width,
            height: data.height,
        })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl CacheType for GpuTexture {
    fn name() -> &'static str {
        "Texture"
    }

    fn release(self, api: &mut dyn GraphicsApi) {
        api.delete_texture(self.id);
    }
}
