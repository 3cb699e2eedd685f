//! The thin layer of graphics calls the renderer issues.
//!
//! [`GraphicsApi`] is implemented by [`GlowApi`] for a real OpenGL context and
//! by [`HeadlessApi`], which emulates just enough driver behavior to run the
//! renderer without a window and records every call it receives.

#[cfg(feature = "glow")]
mod glow_api;
mod headless;

#[cfg(feature = "glow")]
pub use self::glow_api::GlowApi;
pub use self::headless::{GlCall, HeadlessApi, RecordedUniform};

use crate::engine::core::VertexLayout;
use crate::engine::rendering::vertex_buffer::Primitive;
use nalgebra::{Matrix4, Vector3, Vector4};
use snafu::Snafu;
use std::fmt::{Display, Formatter};
use std::num::NonZeroU32;
use std::str::FromStr;

macro_rules! gl_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {$(
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub NonZeroU32);

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    )*};
}

gl_handle! {
    /// A compiled shader stage object.
    ShaderObjectId,
    /// A linked (or linkable) program object.
    ProgramId,
    TextureId,
    BufferId,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn name(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl Display for ShaderStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("Unsupported shader stage type \"{stage}\""))]
pub struct UnknownStageError {
    pub stage: String,
}

impl FromStr for ShaderStage {
    type Err = UnknownStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vertex" | "vert" => Ok(ShaderStage::Vertex),
            "fragment" | "frag" => Ok(ShaderStage::Fragment),
            _ => UnknownStageSnafu { stage: s }.fail(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferTarget {
    Vertices,
    Indices,
}

/// A named uniform or attribute as reported by a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveVariable {
    pub name: String,
    pub location: u32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue<'a> {
    Int(i32),
    Float(f32),
    Vec3(Vector3<f32>),
    Vec4(Vector4<f32>),
    Mat4(&'a Matrix4<f32>),
    Vec3Array(&'a [Vector3<f32>]),
}

pub struct DrawCall<'a> {
    pub vertices: BufferId,
    pub indices: BufferId,
    pub layout: &'a VertexLayout,
    pub primitive: Primitive,
    pub index_count: u32,
}

#[derive(Debug, Snafu)]
pub enum BackendError {
    #[snafu(display("Driver failed to create {resource}: {message}"))]
    Create { resource: &'static str, message: String },

    #[snafu(display("{log}"))]
    Compile { log: String },

    #[snafu(display("{log}"))]
    Link { log: String },
}

/// Graphics calls against the current context.
///
/// All calls are synchronous and must happen on the thread that owns the
/// context.
pub trait GraphicsApi {
    /// The shading language version as (major, minor), e.g. (1, 50).
    fn glsl_version(&self) -> (u32, u32);
    fn max_texture_units(&self) -> u32;

    fn create_shader_object(&mut self, stage: ShaderStage) -> Result<ShaderObjectId, BackendError>;
    /// Returns the info log as [`BackendError::Compile`] when compilation fails.
    fn compile_shader_object(&mut self, shader: ShaderObjectId, source: &str) -> Result<(), BackendError>;
    fn delete_shader_object(&mut self, shader: ShaderObjectId);

    fn create_program(&mut self) -> Result<ProgramId, BackendError>;
    fn attach_shader_object(&mut self, program: ProgramId, shader: ShaderObjectId);
    fn detach_shader_object(&mut self, program: ProgramId, shader: ShaderObjectId);
    /// Returns the info log as [`BackendError::Link`] when linking fails.
    fn link_program(&mut self, program: ProgramId) -> Result<(), BackendError>;
    fn delete_program(&mut self, program: ProgramId);
    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveVariable>;
    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveVariable>;

    fn use_program(&mut self, program: Option<ProgramId>);
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>);

    /// Uploads tightly packed RGBA8 pixels.
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, BackendError>;
    fn delete_texture(&mut self, texture: TextureId);
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    fn create_buffer(&mut self) -> Result<BufferId, BackendError>;
    fn upload_buffer(&mut self, buffer: BufferId, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&mut self, buffer: BufferId);

    fn draw_indexed(&mut self, call: &DrawCall<'_>);
}

/// Parses the leading "major.minor" of a `GL_SHADING_LANGUAGE_VERSION` string.
pub fn parse_glsl_version(version: &str) -> Option<(u32, u32)> {
    let version = version
        .trim()
        .strip_prefix("OpenGL ES GLSL ES ")
        .unwrap_or(version.trim());
    let number = version.split_whitespace().next()?;
    let (major, minor) = number.split_once('.')?;
    let minor: String = minor.chars().take_while(char::is_ascii_digit).collect();

    Some((major.parse().ok()?, minor.parse().ok()?))
}
