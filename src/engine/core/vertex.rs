use crate::utils::sizes::{COLOR_SIZE, NORMAL_SIZE, POSITION_SIZE, TANGENT_SIZE, UV_SIZE};
use nalgebra::{Vector2, Vector3, Vector4};
use smallvec::SmallVec;
use std::borrow::Cow;

pub const POSITION_ATTRIBUTE: &str = "aPosition";
pub const NORMAL_ATTRIBUTE: &str = "aNormal";
pub const TANGENT_ATTRIBUTE: &str = "aTangent";
pub const COLOR_ATTRIBUTE: &str = "aColor";
pub const UV_ATTRIBUTE_PREFIX: &str = "aUV";

/// Most uv channels a format may carry. Together with the four fixed
/// attributes this stays within the 16 vertex attributes GL guarantees.
pub const MAX_UV_CHANNELS: u32 = 12;

/// Describes which components a packed vertex record carries.
///
/// Records are laid out as position, then the optional normal, tangent and
/// color, then `uv_channels` texture coordinates, all as tightly packed `f32`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    pub has_normal: bool,
    pub has_tangent: bool,
    pub has_color: bool,
    pub uv_channels: u32,
}

/// A named attribute inside a packed vertex record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: Cow<'static, str>,
    pub offset: u32,
    pub components: u8,
}

impl VertexFormat {
    /// Only a position.
    pub const POSITION: VertexFormat = VertexFormat {
        has_normal: false,
        has_tangent: false,
        has_color: false,
        uv_channels: 0,
    };

    pub const fn new(has_normal: bool, has_tangent: bool, has_color: bool, uv_channels: u32) -> Self {
        Self {
            has_normal,
            has_tangent,
            has_color,
            uv_channels,
        }
    }

    pub const fn bytes_per_vertex(&self) -> u32 {
        let mut size = POSITION_SIZE;
        if self.has_normal {
            size += NORMAL_SIZE;
        }
        if self.has_tangent {
            size += TANGENT_SIZE;
        }
        if self.has_color {
            size += COLOR_SIZE;
        }
        size + UV_SIZE * self.uv_channels
    }

    pub fn uv_attribute_name(channel: u32) -> String {
        format!("{UV_ATTRIBUTE_PREFIX}{channel}")
    }

    pub const fn uv_offset(&self, channel: u32) -> u32 {
        self.uv_base_offset() + channel * UV_SIZE
    }

    const fn uv_base_offset(&self) -> u32 {
        self.bytes_per_vertex() - self.uv_channels * UV_SIZE
    }

    /// Every attribute of this format in record order.
    pub fn attributes(&self) -> impl Iterator<Item = VertexAttribute> + '_ {
        let mut fixed: SmallVec<[VertexAttribute; 4]> = SmallVec::new();
        let mut offset = 0;

        let mut push = |present: bool, name: &'static str, size: u32| {
            if present {
                fixed.push(VertexAttribute {
                    name: Cow::Borrowed(name),
                    offset,
                    components: (size / 4) as u8,
                });
                offset += size;
            }
        };

        push(true, POSITION_ATTRIBUTE, POSITION_SIZE);
        push(self.has_normal, NORMAL_ATTRIBUTE, NORMAL_SIZE);
        push(self.has_tangent, TANGENT_ATTRIBUTE, TANGENT_SIZE);
        push(self.has_color, COLOR_ATTRIBUTE, COLOR_SIZE);

        let uvs = (0..self.uv_channels).map(move |channel| VertexAttribute {
            name: Cow::Owned(Self::uv_attribute_name(channel)),
            offset: self.uv_offset(channel),
            components: 2,
        });

        fixed.into_iter().chain(uvs)
    }

    /// Appends one packed record for `vertex` to `out`.
    ///
    /// Components the vertex doesn't carry are written as zero, extra ones
    /// are ignored.
    pub fn write_vertex(&self, vertex: &Vertex, out: &mut Vec<u8>) {
        let start = out.len();

        out.extend_from_slice(bytemuck::bytes_of(&vertex.position));
        if self.has_normal {
            out.extend_from_slice(bytemuck::bytes_of(&vertex.normal));
        }
        if self.has_tangent {
            out.extend_from_slice(bytemuck::bytes_of(&vertex.tangent));
        }
        if self.has_color {
            out.extend_from_slice(bytemuck::bytes_of(&vertex.color));
        }
        for channel in 0..self.uv_channels as usize {
            let uv = vertex.uvs.get(channel).copied().unwrap_or_else(Vector2::zeros);
            out.extend_from_slice(bytemuck::bytes_of(&uv));
        }

        debug_assert_eq!(out.len() - start, self.bytes_per_vertex() as usize);
    }

    pub fn pack(&self, vertices: &[Vertex]) -> Vec<u8> {
        let mut out = Vec::with_capacity(vertices.len() * self.bytes_per_vertex() as usize);
        for vertex in vertices {
            self.write_vertex(vertex, &mut out);
        }
        out
    }
}

/// A loose vertex used to build packed vertex data.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub tangent: Vector3<f32>,
    pub color: Vector4<f32>,
    pub uvs: SmallVec<[Vector2<f32>; 2]>,
}

impl Vertex {
    pub fn new(position: Vector3<f32>) -> Self {
        Self {
            position,
            normal: Vector3::zeros(),
            tangent: Vector3::zeros(),
            color: Vector4::new(1.0, 1.0, 1.0, 1.0),
            uvs: SmallVec::new(),
        }
    }

    pub fn with_normal(mut self, normal: Vector3<f32>) -> Self {
        self.normal = normal;
        self
    }

    pub fn with_tangent(mut self, tangent: Vector3<f32>) -> Self {
        self.tangent = tangent;
        self
    }

    pub fn with_color(mut self, color: Vector4<f32>) -> Self {
        self.color = color;
        self
    }

    pub fn with_uv(mut self, uv: Vector2<f32>) -> Self {
        self.uvs.push(uv);
        self
    }
}

/// An attribute resolved against a linked program.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexComponent {
    pub location: u32,
    pub offset: u32,
    pub components: u8,
}

/// The attribute bindings of one vertex buffer against one program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    stride: u32,
    components: SmallVec<[VertexComponent; 8]>,
}

impl VertexLayout {
    pub fn unbound(format: &VertexFormat) -> Self {
        Self {
            stride: format.bytes_per_vertex(),
            components: SmallVec::new(),
        }
    }

    /// Binds every attribute of `format` that `locate` knows a location for.
    pub fn bind(format: &VertexFormat, mut locate: impl FnMut(&str) -> Option<u32>) -> Self {
        let mut layout = Self::unbound(format);

        for attribute in format.attributes() {
            match locate(&attribute.name) {
                Some(location) => {
                    log::trace!(
                        "[Vertex Layout] {} -> location {location}, offset {}",
                        attribute.name,
                        attribute.offset
                    );
                    layout.components.push(VertexComponent {
                        location,
                        offset: attribute.offset,
                        components: attribute.components,
                    });
                }
                None => log::trace!("[Vertex Layout] {} is not used by the program", attribute.name),
            }
        }

        layout
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn components(&self) -> &[VertexComponent] {
        &self.components
    }
}
