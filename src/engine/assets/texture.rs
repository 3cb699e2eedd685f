use image::RgbaImage;
use snafu::{ResultExt, Snafu};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TextureError {
    #[snafu(display("Failed to load texture image {}: {source}", path.display()))]
    Open { path: PathBuf, source: image::ImageError },

    #[snafu(display("Failed to decode texture image: {source}"))]
    Decode { source: image::ImageError },

    #[snafu(display("Failed to upload texture {key}: {source}"))]
    Upload {
        key: TextureKey,
        source: crate::engine::rendering::backend::BackendError,
    },
}

/// What a cached texture was created from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureKey {
    /// Decoded from this file.
    File(PathBuf),
    /// Provided in memory under a caller chosen name.
    Named(String),
}

impl TextureKey {
    /// The string stored for this texture in model files.
    pub fn filename(&self) -> String {
        match self {
            TextureKey::File(path) => path.to_string_lossy().into_owned(),
            TextureKey::Named(name) => name.clone(),
        }
    }
}

impl Display for TextureKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureKey::File(path) => write!(f, "file \"{}\"", path.display()),
            TextureKey::Named(name) => write!(f, "\"{name}\""),
        }
    }
}

/// Decoded RGBA8 pixels, ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn load_image(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let image = image::open(path).context(OpenSnafu { path })?;
        Ok(Self::from_image(&image.into_rgba8()))
    }

    pub fn load_image_from_memory(bytes: &[u8]) -> Result<Self, TextureError> {
        let image = image::load_from_memory(bytes).context(DecodeSnafu)?;
        Ok(Self::from_image(&image.into_rgba8()))
    }

    pub fn from_image(image: &RgbaImage) -> Self {
        TextureData {
            width: image.width(),
            height: image.height(),
            rgba: image.as_raw().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Cursor;

    #[test]
    fn decodes_png_from_memory() {
        let image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let data = TextureData::load_image_from_memory(&png).unwrap();

        assert_eq!((data.width, data.height), (3, 2));
        assert_eq!(&data.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = TextureData::load_image("does/not/exist.png").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.png"));
    }
}
