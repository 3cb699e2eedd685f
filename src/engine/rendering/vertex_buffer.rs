use crate::engine::core::{VertexFormat, VertexLayout};
use crate::engine::rendering::backend::{BackendError, BufferId, BufferTarget, DrawCall, GraphicsApi};
use log::{debug, trace};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Primitive {
    Lines,
    #[default]
    Triangles,
}

impl Primitive {
    pub const fn indices_per_primitive(&self) -> u32 {
        match self {
            Primitive::Lines => 2,
            Primitive::Triangles => 3,
        }
    }

    pub const fn from_indices_per_primitive(count: u32) -> Option<Self> {
        match count {
            2 => Some(Primitive::Lines),
            3 => Some(Primitive::Triangles),
            _ => None,
        }
    }
}

/// Process-unique identity of a [`VertexBuffer`], stable for its whole life.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexBufferId(u64);

impl VertexBufferId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        VertexBufferId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for VertexBufferId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "vb#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone)]
struct GpuBuffers {
    vertices: BufferId,
    indices: BufferId,
}

/// Packed vertex records plus an index list, owned by a single model.
///
/// GPU buffers are created and filled by [`VertexBuffer::sync`]; until then
/// the data only lives on the CPU side.
#[derive(Debug)]
pub struct VertexBuffer {
    id: VertexBufferId,
    format: VertexFormat,
    layout: VertexLayout,
    vertices: Vec<u8>,
    indices: Vec<u32>,
    primitive: Primitive,
    gpu: Option<GpuBuffers>,
    upload_pending: bool,
}

impl Default for VertexBuffer {
    fn default() -> Self {
        Self::new(VertexFormat::POSITION)
    }
}

impl VertexBuffer {
    pub fn new(format: VertexFormat) -> Self {
        VertexBuffer {
            id: VertexBufferId::next(),
            format,
            layout: VertexLayout::unbound(&format),
            vertices: Vec::new(),
            indices: Vec::new(),
            primitive: Primitive::default(),
            gpu: None,
            upload_pending: false,
        }
    }

    pub fn id(&self) -> VertexBufferId {
        self.id
    }

    pub fn format(&self) -> &VertexFormat {
        &self.format
    }

    pub fn stride(&self) -> u32 {
        self.format.bytes_per_vertex()
    }

    /// Changes the record format. Vertex data packed for the previous format
    /// is dropped and the attribute bindings are reset.
    pub fn set_format(&mut self, format: VertexFormat) {
        if format == self.format {
            return;
        }
        if !self.vertices.is_empty() {
            debug!(
                "[Vertex Buffer] {} format changed, dropping {} bytes of vertex data",
                self.id,
                self.vertices.len()
            );
            self.vertices.clear();
            self.upload_pending = true;
        }
        self.format = format;
        self.layout = VertexLayout::unbound(&format);
    }

    /// Replaces the packed vertex records.
    ///
    /// # Panics
    ///
    /// If the data isn't a whole number of records of the current format.
    pub fn set_vertices(&mut self, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();
        let stride = self.stride() as usize;
        assert_eq!(
            bytes.len() % stride,
            0,
            "vertex data of {} bytes is not a multiple of the {stride} byte stride of {:?}",
            bytes.len(),
            self.format
        );

        self.vertices = bytes;
        self.upload_pending = true;
    }

    pub fn set_indices(&mut self, primitive: Primitive, indices: impl Into<Vec<u32>>) {
        self.primitive = primitive;
        self.indices = indices.into();
        self.upload_pending = true;
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> u32 {
        (self.vertices.len() / self.stride() as usize) as u32
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: VertexLayout) {
        debug_assert_eq!(layout.stride(), self.stride());
        self.layout = layout;
    }

    pub fn needs_upload(&self) -> bool {
        self.upload_pending
    }

    /// Creates the GPU buffers if needed and uploads pending data.
    pub fn sync(&mut self, api: &mut dyn GraphicsApi) -> Result<(), BackendError> {
        if !self.upload_pending && self.gpu.is_some() {
            return Ok(());
        }

        let gpu = match self.gpu {
            Some(gpu) => gpu,
            None => {
                let vertices = api.create_buffer()?;
                let indices = match api.create_buffer() {
                    Ok(indices) => indices,
                    Err(e) => {
                        api.delete_buffer(vertices);
                        return Err(e);
                    }
                };
                let gpu = GpuBuffers { vertices, indices };
                self.gpu = Some(gpu);
                gpu
            }
        };

        api.upload_buffer(gpu.vertices, BufferTarget::Vertices, &self.vertices);
        api.upload_buffer(gpu.indices, BufferTarget::Indices, bytemuck::cast_slice(&self.indices));
        self.upload_pending = false;

        trace!(
            "[Vertex Buffer] {} uploaded {} vertices, {} indices",
            self.id,
            self.vertex_count(),
            self.indices.len()
        );

        Ok(())
    }

    /// Issues the indexed draw. Does nothing for an empty buffer.
    pub fn draw(&self, api: &mut dyn GraphicsApi) {
        if self.is_empty() || self.indices.is_empty() {
            return;
        }
        let Some(gpu) = self.gpu else {
            debug!("[Vertex Buffer] {} drawn before it was uploaded", self.id);
            return;
        };

        api.draw_indexed(&DrawCall {
            vertices: gpu.vertices,
            indices: gpu.indices,
            layout: &self.layout,
            primitive: self.primitive,
            index_count: self.indices.len() as u32,
        });
    }

    /// Frees the GPU buffers. The CPU side data is kept, so a later
    /// [`VertexBuffer::sync`] uploads it again.
    pub fn release(&mut self, api: &mut dyn GraphicsApi) {
        if let Some(gpu) = self.gpu.take() {
            api.delete_buffer(gpu.vertices);
            api.delete_buffer(gpu.indices);
            self.upload_pending = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rendering::backend::HeadlessApi;

    #[test]
    fn ids_are_unique() {
        let a = VertexBuffer::default();
        let b = VertexBuffer::default();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    #[should_panic(expected = "not a multiple")]
    fn stride_mismatch_is_fatal() {
        let mut buffer = VertexBuffer::new(VertexFormat::new(true, false, false, 0));
        buffer.set_vertices(vec![0u8; 36]);
    }

    #[test]
    fn format_change_drops_stale_vertices() {
        let mut buffer = VertexBuffer::default();
        buffer.set_vertices(vec![0u8; 24]);
        assert_eq!(buffer.vertex_count(), 2);

        buffer.set_format(VertexFormat::new(false, false, false, 1));
        assert!(buffer.is_empty());
        assert_eq!(buffer.stride(), 20);
    }

    #[test]
    fn sync_uploads_once() {
        let mut api = HeadlessApi::new();
        let mut buffer = VertexBuffer::default();
        buffer.set_vertices(vec![0u8; 36]);
        buffer.set_indices(Primitive::Triangles, vec![0, 1, 2]);

        buffer.sync(&mut api).unwrap();
        buffer.sync(&mut api).unwrap();

        assert_eq!(api.live_buffers(), 2);
        assert_eq!(
            api.count_calls(|c| matches!(c, crate::engine::rendering::backend::GlCall::UploadBuffer { .. })),
            2
        );

        buffer.release(&mut api);
        assert_eq!(api.live_buffers(), 0);
    }
}
