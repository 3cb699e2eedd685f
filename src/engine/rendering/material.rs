use crate::engine::rendering::backend::UniformLocation;
use crate::engine::rendering::cache::H;
use crate::engine::rendering::texture::GpuTexture;
use bon::Builder;
use nalgebra::{Vector3, Vector4};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// The capability set a [`MaterialModel`](crate::rendering::MaterialModel) is built for.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Perspective scene geometry with per-fragment lighting and a scale uniform.
    #[default]
    Scene,
    /// Flat geometry in the xy plane, unlit, with a scale uniform.
    Flat,
    /// Pixel space overlay geometry, unlit and unscaled.
    Gui,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProjectionKind {
    Perspective3D,
    Planar2D,
}

impl ModelKind {
    pub const fn has_lighting(&self) -> bool {
        matches!(self, ModelKind::Scene)
    }

    pub const fn has_scale_uniform(&self) -> bool {
        matches!(self, ModelKind::Scene | ModelKind::Flat)
    }

    pub const fn projection(&self) -> ProjectionKind {
        match self {
            ModelKind::Scene => ProjectionKind::Perspective3D,
            ModelKind::Flat | ModelKind::Gui => ProjectionKind::Planar2D,
        }
    }

    /// Literal every generated shader cache key of this kind starts with.
    pub const fn key_prefix(&self) -> &'static str {
        match self {
            ModelKind::Scene => "Model",
            ModelKind::Flat => "Flat",
            ModelKind::Gui => "Gui",
        }
    }
}

/// What a bound texture is used for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextureSemantic {
    Diffuse,
    /// Accepted and bound, not applied to shading yet.
    Normal,
    /// Accepted and bound, not applied to shading yet.
    Reflection,
    /// Any other non-empty type name. Bound, never sampled.
    Other(String),
}

impl TextureSemantic {
    /// Returns `None` for an empty type name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "" => None,
            "diffuse" => Some(TextureSemantic::Diffuse),
            "normal" => Some(TextureSemantic::Normal),
            "reflection" => Some(TextureSemantic::Reflection),
            other => Some(TextureSemantic::Other(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TextureSemantic::Diffuse => "diffuse",
            TextureSemantic::Normal => "normal",
            TextureSemantic::Reflection => "reflection",
            TextureSemantic::Other(name) => name,
        }
    }

    /// Token naming this type in shader cache keys.
    ///
    /// Known types use their first letter. Any other name is spelled out as
    /// `x`, its byte length, `:` and the name, so no two types share a token.
    pub fn key_token(&self) -> Cow<'_, str> {
        match self {
            TextureSemantic::Diffuse => Cow::Borrowed("d"),
            TextureSemantic::Normal => Cow::Borrowed("n"),
            TextureSemantic::Reflection => Cow::Borrowed("r"),
            TextureSemantic::Other(name) => Cow::Owned(format!("x{}:{name}", name.len())),
        }
    }
}

impl Display for TextureSemantic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One texture a model samples, in binding order.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureBinding {
    pub texture: H<GpuTexture>,
    pub semantic: TextureSemantic,
    pub uv_index: u32,
    pub(crate) sampler: Option<UniformLocation>,
}

impl TextureBinding {
    pub fn new(texture: H<GpuTexture>, semantic: TextureSemantic, uv_index: u32) -> Self {
        Self {
            texture,
            semantic,
            uv_index,
            sampler: None,
        }
    }

    /// Sampler location in the current program, known after a commit.
    pub fn sampler_location(&self) -> Option<UniformLocation> {
        self.sampler
    }
}

#[derive(Debug, Clone, PartialEq, Builder)]
pub struct MaterialConstants {
    #[builder(default = Vector3::zeros())]
    pub emit: Vector3<f32>,
    #[builder(default = Vector4::new(1.0, 1.0, 1.0, 1.0))]
    pub diffuse: Vector4<f32>,
    #[builder(default = 1)]
    pub specular_level: u32,
    #[builder(default = 0.0)]
    pub specular_strength: f32,
}

impl Default for MaterialConstants {
    fn default() -> Self {
        MaterialConstants::builder().build()
    }
}

impl MaterialConstants {
    /// Clamps the specular constants into their valid ranges.
    pub fn normalized(mut self) -> Self {
        self.specular_level = self.specular_level.max(1);
        self.specular_strength = self.specular_strength.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_names_round_trip() {
        for name in ["diffuse", "normal", "reflection", "detail"] {
            assert_eq!(TextureSemantic::parse(name).unwrap().as_str(), name);
        }
        assert_eq!(TextureSemantic::parse(""), None);
    }

    #[test]
    fn unknown_semantics_are_spelled_out() {
        assert_eq!(TextureSemantic::Diffuse.key_token(), "d");
        assert_eq!(TextureSemantic::parse("detail").unwrap().key_token(), "x6:detail");
        assert_eq!(TextureSemantic::parse("7up").unwrap().key_token(), "x3:7up");
        assert_ne!(
            TextureSemantic::parse("dirt").unwrap().key_token(),
            TextureSemantic::parse("specular").unwrap().key_token()
        );
    }

    #[test]
    fn specular_constants_are_clamped() {
        let material = MaterialConstants::builder()
            .specular_level(0)
            .specular_strength(-2.0)
            .build()
            .normalized();

        assert_eq!(material.specular_level, 1);
        assert_eq!(material.specular_strength, 0.0);
    }

    #[test]
    fn capabilities() {
        assert!(ModelKind::Scene.has_lighting());
        assert!(!ModelKind::Flat.has_lighting());
        assert!(ModelKind::Flat.has_scale_uniform());
        assert!(!ModelKind::Gui.has_scale_uniform());
        assert_eq!(ModelKind::Gui.projection(), ProjectionKind::Planar2D);
    }
}
