//! Builds the vertex and fragment source for a model configuration.
//!
//! The generated source only depends on the model kind, the vertex format and
//! the ordered (semantic, uv index) list of its textures. The cache key encodes
//! exactly that tuple, so two configurations with equal keys always produce
//! equal source.

use crate::engine::core::VertexFormat;
use crate::engine::rendering::lights::MAX_LIGHTS;
use crate::engine::rendering::material::{ModelKind, ProjectionKind, TextureBinding, TextureSemantic};
use crate::engine::rendering::program::ShaderCode;
use log::debug;
use std::fmt::Write;

pub const UNIFORM_WORLD_VIEW: &str = "uWorldView";
pub const UNIFORM_PROJECTION: &str = "uProjection";
pub const UNIFORM_SCALE: &str = "uScale";
pub const UNIFORM_EMIT_COLOR: &str = "uEmitColor";
pub const UNIFORM_DIFFUSE_COLOR: &str = "uDiffuseColor";
pub const UNIFORM_LIGHT_POSITIONS: &str = "uLightPositions";
pub const UNIFORM_LIGHT_COLORS: &str = "uLightColors";
pub const UNIFORM_SPECULAR_LEVEL: &str = "uSpecularLevel";
pub const UNIFORM_SPECULAR_STRENGTH: &str = "uSpecularStrength";

pub fn sampler_uniform(index: usize) -> String {
    format!("uSampler{index}")
}

/// GLSL flavor the generated source targets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderDialect {
    /// `#version 120` with `attribute`/`varying`.
    Glsl120,
    /// `#version 150` with `in`/`out`.
    Glsl150,
}

impl ShaderDialect {
    pub fn for_glsl_version(version: (u32, u32)) -> Self {
        if version >= (1, 50) {
            ShaderDialect::Glsl150
        } else {
            ShaderDialect::Glsl120
        }
    }

    fn version_line(&self) -> &'static str {
        match self {
            ShaderDialect::Glsl120 => "#version 120",
            ShaderDialect::Glsl150 => "#version 150",
        }
    }

    fn vertex_in(&self) -> &'static str {
        match self {
            ShaderDialect::Glsl120 => "attribute",
            ShaderDialect::Glsl150 => "in",
        }
    }

    fn vertex_out(&self) -> &'static str {
        match self {
            ShaderDialect::Glsl120 => "varying",
            ShaderDialect::Glsl150 => "out",
        }
    }

    fn fragment_in(&self) -> &'static str {
        match self {
            ShaderDialect::Glsl120 => "varying",
            ShaderDialect::Glsl150 => "in",
        }
    }

    fn sample(&self) -> &'static str {
        match self {
            ShaderDialect::Glsl120 => "texture2D",
            ShaderDialect::Glsl150 => "texture",
        }
    }

    fn frag_color(&self) -> &'static str {
        match self {
            ShaderDialect::Glsl120 => "gl_FragColor",
            ShaderDialect::Glsl150 => "fragColor",
        }
    }
}

/// Output of [`ShaderGen::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedShader {
    pub key: String,
    pub code: ShaderCode,
}

pub struct ShaderGen<'a> {
    kind: ModelKind,
    dialect: ShaderDialect,
    format: &'a VertexFormat,
    textures: &'a [TextureBinding],
}

struct Varying {
    ty: &'static str,
    name: String,
}

impl<'a> ShaderGen<'a> {
    pub fn new(
        kind: ModelKind,
        dialect: ShaderDialect,
        format: &'a VertexFormat,
        textures: &'a [TextureBinding],
    ) -> Self {
        Self {
            kind,
            dialect,
            format,
            textures,
        }
    }

    fn is_lit(&self) -> bool {
        self.kind.has_lighting() && self.format.has_normal
    }

    /// Prefix, component flags, uv count, then a type token and uv index per
    /// texture.
    pub fn cache_key(&self) -> String {
        let format = self.format;
        let mut key = String::from(self.kind.key_prefix());

        if format.has_normal {
            key.push('n');
        }
        if format.has_tangent {
            key.push('t');
        }
        if format.has_color {
            key.push('c');
        }
        let _ = write!(key, "{}", format.uv_channels);

        for texture in self.textures {
            key.push_str(&texture.semantic.key_token());
            let _ = write!(key, "{}", texture.uv_index);
        }

        key
    }

    fn varyings(&self) -> Vec<Varying> {
        let format = self.format;
        let mut varyings = vec![Varying {
            ty: "vec3",
            name: "vPosition".to_string(),
        }];

        if format.has_normal {
            varyings.push(Varying {
                ty: "vec3",
                name: "vNormal".to_string(),
            });
        }
        if format.has_tangent {
            varyings.push(Varying {
                ty: "vec3",
                name: "vTangent".to_string(),
            });
        }
        if format.has_color {
            varyings.push(Varying {
                ty: "vec4",
                name: "vColor".to_string(),
            });
        }
        for channel in 0..format.uv_channels {
            varyings.push(Varying {
                ty: "vec2",
                name: format!("vUV{channel}"),
            });
        }

        varyings
    }

    pub fn generate(self) -> GeneratedShader {
        let key = self.cache_key();
        let varyings = self.varyings();
        let code = ShaderCode {
            vertex: self.vertex_source(&varyings),
            fragment: self.fragment_source(&varyings),
        };

        debug!("[Shader Gen] Generated {key}");

        GeneratedShader { key, code }
    }

    fn vertex_source(&self, varyings: &[Varying]) -> String {
        let d = self.dialect;
        let format = self.format;
        let mut src = String::new();

        src.push_str(d.version_line());
        src.push('\n');

        let _ = writeln!(src, "uniform mat4 {UNIFORM_WORLD_VIEW};");
        let _ = writeln!(src, "uniform mat4 {UNIFORM_PROJECTION};");
        if self.kind.has_scale_uniform() {
            let _ = writeln!(src, "uniform float {UNIFORM_SCALE};");
        }

        let input = d.vertex_in();
        let _ = writeln!(src, "{input} vec3 aPosition;");
        if format.has_normal {
            let _ = writeln!(src, "{input} vec3 aNormal;");
        }
        if format.has_tangent {
            let _ = writeln!(src, "{input} vec3 aTangent;");
        }
        if format.has_color {
            let _ = writeln!(src, "{input} vec4 aColor;");
        }
        for channel in 0..format.uv_channels {
            let _ = writeln!(src, "{input} vec2 aUV{channel};");
        }

        for varying in varyings {
            let _ = writeln!(src, "{} {} {};", d.vertex_out(), varying.ty, varying.name);
        }

        src.push_str("void main()\n{\n");

        if self.kind.has_scale_uniform() {
            let _ = writeln!(src, "\tvec3 position = {UNIFORM_SCALE} * aPosition;");
        } else {
            src.push_str("\tvec3 position = aPosition;\n");
        }

        let homogeneous = match self.kind.projection() {
            ProjectionKind::Perspective3D => "vec4(position, 1.0)",
            ProjectionKind::Planar2D => "vec4(position.xy, 0.0, 1.0)",
        };
        let _ = writeln!(src, "\tvec4 viewPosition = {UNIFORM_WORLD_VIEW} * {homogeneous};");
        let _ = writeln!(src, "\tgl_Position = {UNIFORM_PROJECTION} * viewPosition;");
        src.push_str("\tvPosition = viewPosition.xyz;\n");

        if format.has_normal {
            let _ = writeln!(src, "\tvNormal = ({UNIFORM_WORLD_VIEW} * vec4(aNormal, 0.0)).xyz;");
        }
        if format.has_tangent {
            let _ = writeln!(src, "\tvTangent = ({UNIFORM_WORLD_VIEW} * vec4(aTangent, 0.0)).xyz;");
        }
        if format.has_color {
            src.push_str("\tvColor = aColor;\n");
        }
        for channel in 0..format.uv_channels {
            let _ = writeln!(src, "\tvUV{channel} = aUV{channel};");
        }

        src.push_str("}\n");
        src
    }

    fn fragment_source(&self, varyings: &[Varying]) -> String {
        let d = self.dialect;
        let mut src = String::new();

        src.push_str(d.version_line());
        src.push('\n');

        let _ = writeln!(src, "uniform vec3 {UNIFORM_EMIT_COLOR};");
        if !self.format.has_color {
            let _ = writeln!(src, "uniform vec4 {UNIFORM_DIFFUSE_COLOR};");
        }
        if self.is_lit() {
            let _ = writeln!(src, "uniform vec3 {UNIFORM_LIGHT_POSITIONS}[{MAX_LIGHTS}];");
            let _ = writeln!(src, "uniform vec3 {UNIFORM_LIGHT_COLORS}[{MAX_LIGHTS}];");
        }
        for i in 0..self.textures.len() {
            let _ = writeln!(src, "uniform sampler2D {};", sampler_uniform(i));
        }

        for varying in varyings {
            let _ = writeln!(src, "{} {} {};", d.fragment_in(), varying.ty, varying.name);
        }
        if d == ShaderDialect::Glsl150 {
            let _ = writeln!(src, "out vec4 {};", d.frag_color());
        }

        src.push_str("void main()\n{\n");

        if self.format.has_color {
            src.push_str("\tvec4 color = vColor;\n");
        } else {
            let _ = writeln!(src, "\tvec4 color = {UNIFORM_DIFFUSE_COLOR};");
        }

        for (i, texture) in self.textures.iter().enumerate() {
            let sampler = sampler_uniform(i);
            match texture.semantic {
                TextureSemantic::Diffuse => {
                    let _ = writeln!(
                        src,
                        "\tvec4 textureColor{i} = {}({sampler}, vUV{});",
                        d.sample(),
                        texture.uv_index
                    );
                    let _ = writeln!(
                        src,
                        "\tcolor = (1.0 - textureColor{i}.a) * color + textureColor{i}.a * textureColor{i};"
                    );
                }
                // bound so the unit layout stays stable, shading doesn't use them yet
                TextureSemantic::Normal | TextureSemantic::Reflection | TextureSemantic::Other(_) => {
                    let _ = writeln!(src, "\t// {sampler}: {} texture, not applied", texture.semantic);
                }
            }
        }

        if self.is_lit() {
            src.push_str("\tvec3 normal = normalize(vNormal);\n");
            src.push_str("\tvec4 outColor = vec4(0.0, 0.0, 0.0, color.a);\n");
            let _ = writeln!(src, "\tfor (int i = 0; i < {MAX_LIGHTS}; i++)");
            src.push_str("\t{\n");
            let _ = writeln!(
                src,
                "\t\tfloat dotLight = dot(normalize({UNIFORM_LIGHT_POSITIONS}[i] - vPosition), normal);"
            );
            src.push_str("\t\tif (dotLight > 0.0)\n\t\t{\n");
            let _ = writeln!(
                src,
                "\t\t\toutColor.rgb += color.rgb * {UNIFORM_LIGHT_COLORS}[i] * dotLight;"
            );
            src.push_str("\t\t}\n\t}\n");
        } else {
            src.push_str("\tvec4 outColor = color;\n");
        }

        src.push_str("\tif (outColor.a == 0.0)\n\t{\n\t\tdiscard;\n\t}\n");
        let _ = writeln!(src, "\toutColor.rgb += {UNIFORM_EMIT_COLOR};");
        let _ = writeln!(src, "\t{} = outColor;", d.frag_color());

        src.push_str("}\n");
        src
    }
}
