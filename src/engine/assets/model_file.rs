//! Binary model files.
//!
//! Everything is little-endian without padding. Strings carry a `u32` byte
//! length prefix, booleans are a single `0` or `1` byte.
//!
//! ```text
//! material     emit (3 x f32), diffuse (4 x f32), specular level (u32), specular strength (f32)
//! textures     count (u32), then per texture: filename, type, uv index (u32)
//! format       has normal, has tangent, has color (bool), uv channels (u32)
//! vertices     count (u32), then count * stride raw bytes
//! primitive    indices per primitive (u32, 2 or 3)
//! indices      count (u32), then count * u32
//! ```

use crate::engine::core::{MAX_UV_CHANNELS, VertexFormat};
use crate::engine::rendering::{MaterialConstants, Primitive, TextureSemantic};
use crate::utils::sizes::U32_SIZE;
use nalgebra::{Vector3, Vector4};
use snafu::{ResultExt, Snafu, ensure};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::string::FromUtf8Error;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ModelFileError {
    #[snafu(display("Failed to access model file {}: {source}", path.display()))]
    File { path: PathBuf, source: io::Error },

    #[snafu(display("I/O error while reading {what}: {source}"))]
    Io { what: &'static str, source: io::Error },

    #[snafu(display("Model data ends in the middle of {what}"))]
    Truncated { what: &'static str },

    #[snafu(display("{what} is not valid UTF-8: {source}"))]
    Utf8 { what: &'static str, source: FromUtf8Error },

    #[snafu(display("{what} must be 0 or 1, found {value}"))]
    InvalidBool { what: &'static str, value: u8 },

    #[snafu(display("Texture {index} has an empty type"))]
    EmptyTextureType { index: usize },

    #[snafu(display("Vertex formats with {count} uv channels are not supported, the limit is {MAX_UV_CHANNELS}"))]
    UvChannels { count: u32 },

    #[snafu(display("Primitives with {size} indices are not supported"))]
    PrimitiveSize { size: u32 },

    #[snafu(display("{count} indices don't form whole primitives of {size}"))]
    IndexCount { count: u32, size: u32 },
}

type Result<T, E = ModelFileError> = std::result::Result<T, E>;

/// A texture reference as stored in a model file.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTexture {
    pub filename: String,
    pub semantic: TextureSemantic,
    pub uv_index: u32,
}

/// Everything a model file holds, decoded but not uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    pub material: MaterialConstants,
    pub textures: Vec<ModelTexture>,
    pub format: VertexFormat,
    pub vertices: Vec<u8>,
    pub primitive: Primitive,
    pub indices: Vec<u32>,
}

impl ModelData {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(FileSnafu { path })?;
        Self::read(&mut BufReader::new(file))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).context(FileSnafu { path })?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer)?;
        writer.flush().context(FileSnafu { path })
    }

    pub fn vertex_count(&self) -> u32 {
        (self.vertices.len() / self.format.bytes_per_vertex() as usize) as u32
    }

    pub fn read(reader: &mut impl Read) -> Result<Self> {
        let material = MaterialConstants {
            emit: Vector3::new(
                read_f32(reader, "emit color")?,
                read_f32(reader, "emit color")?,
                read_f32(reader, "emit color")?,
            ),
            diffuse: Vector4::new(
                read_f32(reader, "diffuse color")?,
                read_f32(reader, "diffuse color")?,
                read_f32(reader, "diffuse color")?,
                read_f32(reader, "diffuse color")?,
            ),
            specular_level: read_u32(reader, "specular level")?,
            specular_strength: read_f32(reader, "specular strength")?,
        };

        let texture_count = read_u32(reader, "texture count")?;
        let mut textures = Vec::new();
        for index in 0..texture_count as usize {
            let filename = read_string(reader, "texture filename")?;
            let semantic = TextureSemantic::parse(&read_string(reader, "texture type")?)
                .ok_or(ModelFileError::EmptyTextureType { index })?;
            let uv_index = read_u32(reader, "texture uv index")?;
            textures.push(ModelTexture {
                filename,
                semantic,
                uv_index,
            });
        }

        let has_normal = read_bool(reader, "normal flag")?;
        let has_tangent = read_bool(reader, "tangent flag")?;
        let has_color = read_bool(reader, "color flag")?;
        let uv_channels = read_u32(reader, "uv channel count")?;
        ensure!(uv_channels <= MAX_UV_CHANNELS, UvChannelsSnafu { count: uv_channels });
        let format = VertexFormat::new(has_normal, has_tangent, has_color, uv_channels);

        let vertex_count = read_u32(reader, "vertex count")? as u64;
        let vertex_len = vertex_count * format.bytes_per_vertex() as u64;
        let vertices = read_bytes(reader, vertex_len, "vertex data")?;

        let size = read_u32(reader, "primitive size")?;
        let primitive = Primitive::from_indices_per_primitive(size).ok_or(ModelFileError::PrimitiveSize { size })?;

        let count = read_u32(reader, "index count")?;
        ensure!(count % size == 0, IndexCountSnafu { count, size });
        let index_bytes = read_bytes(reader, count as u64 * U32_SIZE as u64, "index data")?;
        let indices = index_bytes
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(ModelData {
            material,
            textures,
            format,
            vertices,
            primitive,
            indices,
        })
    }

    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        self.write_inner(writer).context(IoSnafu { what: "model data" })
    }

    fn write_inner(&self, w: &mut impl Write) -> io::Result<()> {
        let material = &self.material;
        for c in material.emit.iter().chain(material.diffuse.iter()) {
            w.write_all(&c.to_le_bytes())?;
        }
        w.write_all(&material.specular_level.to_le_bytes())?;
        w.write_all(&material.specular_strength.to_le_bytes())?;

        w.write_all(&(self.textures.len() as u32).to_le_bytes())?;
        for texture in &self.textures {
            write_string(w, &texture.filename)?;
            write_string(w, texture.semantic.as_str())?;
            w.write_all(&texture.uv_index.to_le_bytes())?;
        }

        let format = &self.format;
        w.write_all(&[
            format.has_normal as u8,
            format.has_tangent as u8,
            format.has_color as u8,
        ])?;
        w.write_all(&format.uv_channels.to_le_bytes())?;

        debug_assert_eq!(self.vertices.len() % format.bytes_per_vertex() as usize, 0);
        w.write_all(&self.vertex_count().to_le_bytes())?;
        w.write_all(&self.vertices)?;

        w.write_all(&self.primitive.indices_per_primitive().to_le_bytes())?;
        w.write_all(&(self.indices.len() as u32).to_le_bytes())?;
        for index in &self.indices {
            w.write_all(&index.to_le_bytes())?;
        }

        Ok(())
    }
}

fn read_array<const N: usize>(reader: &mut impl Read, what: &'static str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| eof_or_io(e, what))?;
    Ok(buf)
}

fn read_u32(reader: &mut impl Read, what: &'static str) -> Result<u32> {
    read_array(reader, what).map(u32::from_le_bytes)
}

fn read_f32(reader: &mut impl Read, what: &'static str) -> Result<f32> {
    read_array(reader, what).map(f32::from_le_bytes)
}

fn read_bool(reader: &mut impl Read, what: &'static str) -> Result<bool> {
    match read_array::<1>(reader, what)?[0] {
        0 => Ok(false),
        1 => Ok(true),
        value => InvalidBoolSnafu { what, value }.fail(),
    }
}

/// Reads exactly `len` bytes without trusting `len` for the allocation.
fn read_bytes(reader: &mut impl Read, len: u64, what: &'static str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(len)
        .read_to_end(&mut buf)
        .context(IoSnafu { what })?;
    ensure!(buf.len() as u64 == len, TruncatedSnafu { what });
    Ok(buf)
}

fn read_string(reader: &mut impl Read, what: &'static str) -> Result<String> {
    let len = read_u32(reader, what)?;
    let bytes = read_bytes(reader, len as u64, what)?;
    String::from_utf8(bytes).context(Utf8Snafu { what })
}

fn write_string(w: &mut impl Write, s: &str) -> io::Result<()> {
    w.write_all(&(s.len() as u32).to_le_bytes())?;
    w.write_all(s.as_bytes())
}

fn eof_or_io(e: io::Error, what: &'static str) -> ModelFileError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ModelFileError::Truncated { what }
    } else {
        ModelFileError::Io { what, source: e }
    }
}
