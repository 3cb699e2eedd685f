use crate::engine::assets::{ModelData, ModelFileError, ModelTexture, TextureError, TextureKey};
use crate::engine::core::{CameraView, Frame, MAX_UV_CHANNELS, VertexFormat, VertexLayout};
use crate::engine::rendering::backend::{BackendError, GraphicsApi, TextureId, UniformLocation, UniformValue};
use crate::engine::rendering::cache::{AssetCache, HShader, HTexture};
use crate::engine::rendering::context::RenderContext;
use crate::engine::rendering::lights::LightSet;
use crate::engine::rendering::material::{MaterialConstants, ModelKind, TextureBinding, TextureSemantic};
use crate::engine::rendering::program::{ShaderError, ShaderProgram};
use crate::engine::rendering::shader_gen::{
    ShaderGen, UNIFORM_DIFFUSE_COLOR, UNIFORM_EMIT_COLOR, UNIFORM_LIGHT_COLORS, UNIFORM_LIGHT_POSITIONS,
    UNIFORM_PROJECTION, UNIFORM_SCALE, UNIFORM_SPECULAR_LEVEL, UNIFORM_SPECULAR_STRENGTH, UNIFORM_WORLD_VIEW,
    sampler_uniform,
};
use crate::engine::rendering::vertex_buffer::{Primitive, VertexBuffer, VertexBufferId};
use image::RgbaImage;
use log::{debug, trace};
use nalgebra::{Vector3, Vector4};
use smallvec::SmallVec;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use std::path::Path;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)))]
pub enum ModelError {
    #[snafu(display("Texture index {index} is out of range for a model with {len} textures"))]
    TextureIndex { index: usize, len: usize },

    #[snafu(display("Texture {index} samples uv channel {uv_index}, but the vertex format only has {channels}"))]
    UvChannel { index: usize, uv_index: u32, channels: u32 },

    #[snafu(display("Vertex formats with {channels} uv channels are not supported, the limit is {MAX_UV_CHANNELS}"))]
    UvChannels { channels: u32 },

    #[snafu(display("The model uses {count} textures, but only {available} texture units are available"))]
    TextureUnits { count: usize, available: u32 },

    #[snafu(display("The model was changed and has to be committed before rendering"))]
    Uncommitted,

    #[snafu(display("The model's shader is no longer in the shader cache"))]
    StaleShader,

    #[snafu(display("Texture {index} of the model is no longer in the texture cache"))]
    StaleTexture { index: usize },

    #[snafu(display("Failed to create the model's vertex buffers: {source}"))]
    Buffer { source: BackendError },

    #[snafu(context(false), display("{source}"))]
    Shader { source: ShaderError },

    #[snafu(context(false), display("{source}"))]
    Texture { source: TextureError },

    #[snafu(context(false), display("{source}"))]
    File { source: ModelFileError },
}

/// Uniform locations of the current program, resolved once per shader change.
#[derive(Debug, Default, Clone, Copy)]
struct UniformSlots {
    projection: Option<UniformLocation>,
    world_view: Option<UniformLocation>,
    scale: Option<UniformLocation>,
    light_positions: Option<UniformLocation>,
    light_colors: Option<UniformLocation>,
    emit: Option<UniformLocation>,
    diffuse: Option<UniformLocation>,
    specular_level: Option<UniformLocation>,
    specular_strength: Option<UniformLocation>,
}

impl UniformSlots {
    fn resolve(program: &ShaderProgram) -> Self {
        UniformSlots {
            projection: program.uniform_location(UNIFORM_PROJECTION),
            world_view: program.uniform_location(UNIFORM_WORLD_VIEW),
            scale: program.uniform_location(UNIFORM_SCALE),
            light_positions: program.uniform_location(UNIFORM_LIGHT_POSITIONS),
            light_colors: program.uniform_location(UNIFORM_LIGHT_COLORS),
            emit: program.uniform_location(UNIFORM_EMIT_COLOR),
            diffuse: program.uniform_location(UNIFORM_DIFFUSE_COLOR),
            specular_level: program.uniform_location(UNIFORM_SPECULAR_LEVEL),
            specular_strength: program.uniform_location(UNIFORM_SPECULAR_STRENGTH),
        }
    }
}

/// Where a model goes in the draw order.
///
/// Compares the shader handle, then the texture handles pairwise up to the
/// shorter list, then the texture count, then the vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub shader: Option<HShader>,
    pub textures: SmallVec<[HTexture; 4]>,
    pub buffer: VertexBufferId,
}

/// A renderable: vertex data, textures and material constants, drawn with a
/// shader generated for exactly that combination.
///
/// Changes are collected until [`MaterialModel::commit`], which regenerates
/// the shader and uploads vertex data where needed. Rendering only reads.
#[derive(Debug)]
pub struct MaterialModel {
    kind: ModelKind,
    buffer: VertexBuffer,
    textures: Vec<TextureBinding>,
    material: MaterialConstants,
    scale: f32,
    shader: Option<HShader>,
    uniforms: UniformSlots,
    shader_dirty: bool,
    resort_dirty: bool,
}

impl MaterialModel {
    pub fn new(kind: ModelKind) -> Self {
        MaterialModel {
            kind,
            buffer: VertexBuffer::default(),
            textures: Vec::new(),
            material: MaterialConstants::default(),
            scale: 1.0,
            shader: None,
            uniforms: UniformSlots::default(),
            shader_dirty: true,
            resort_dirty: false,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn vertex_format(&self) -> &VertexFormat {
        self.buffer.format()
    }

    /// Changes the vertex record format. Vertex data packed for the old
    /// format is discarded.
    pub fn set_vertex_format(&mut self, format: VertexFormat) {
        if *self.buffer.format() == format {
            return;
        }
        self.buffer.set_format(format);
        self.shader_dirty = true;
    }

    /// # Panics
    ///
    /// If `bytes` isn't a whole number of records of the current format.
    pub fn set_vertices(&mut self, bytes: impl Into<Vec<u8>>) {
        self.buffer.set_vertices(bytes);
    }

    pub fn set_indices(&mut self, primitive: Primitive, indices: impl Into<Vec<u32>>) {
        self.buffer.set_indices(primitive, indices);
    }

    pub fn vertex_buffer(&self) -> &VertexBuffer {
        &self.buffer
    }

    pub fn add_texture(&mut self, texture: HTexture, semantic: TextureSemantic, uv_index: u32) {
        self.textures.push(TextureBinding::new(texture, semantic, uv_index));
        self.shader_dirty = true;
        self.resort_dirty = true;
    }

    pub fn add_texture_from_file<A: GraphicsApi>(
        &mut self,
        ctx: &mut RenderContext<A>,
        cache: &mut AssetCache,
        path: impl AsRef<Path>,
        semantic: TextureSemantic,
        uv_index: u32,
    ) -> Result<HTexture, ModelError> {
        let texture = cache.load_texture_file(ctx.api_mut(), path)?;
        self.add_texture(texture, semantic, uv_index);
        Ok(texture)
    }

    pub fn add_texture_from_image<A: GraphicsApi>(
        &mut self,
        ctx: &mut RenderContext<A>,
        cache: &mut AssetCache,
        name: impl Into<String>,
        image: &RgbaImage,
        semantic: TextureSemantic,
        uv_index: u32,
    ) -> Result<HTexture, ModelError> {
        let texture = cache.load_texture_image(ctx.api_mut(), name, image)?;
        self.add_texture(texture, semantic, uv_index);
        Ok(texture)
    }

    pub fn clear_textures(&mut self) {
        if self.textures.is_empty() {
            return;
        }
        self.textures.clear();
        self.shader_dirty = true;
        self.resort_dirty = true;
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn textures(&self) -> &[TextureBinding] {
        &self.textures
    }

    pub fn texture(&self, index: usize) -> Result<&TextureBinding, ModelError> {
        self.textures.get(index).context(TextureIndexErr {
            index,
            len: self.textures.len(),
        })
    }

    /// What the texture at `index` was loaded from.
    pub fn texture_image<'c>(&self, cache: &'c AssetCache, index: usize) -> Result<&'c TextureKey, ModelError> {
        let binding = self.texture(index)?;
        cache.textures.key_of(binding.texture).context(StaleTextureErr { index })
    }

    pub fn material(&self) -> &MaterialConstants {
        &self.material
    }

    pub fn set_material(&mut self, material: MaterialConstants) {
        self.material = material.normalized();
    }

    /// Base color used when the vertex format carries no color.
    pub fn set_color(&mut self, color: Vector4<f32>) {
        self.material.diffuse = color;
    }

    pub fn set_emit(&mut self, emit: Vector3<f32>) {
        self.material.emit = emit;
    }

    /// Level is at least 1, strength at least 0.
    pub fn set_specular(&mut self, level: u32, strength: f32) {
        self.material.specular_level = level;
        self.material.specular_strength = strength;
        self.material = self.material.clone().normalized();
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    pub fn shader(&self) -> Option<HShader> {
        self.shader
    }

    /// Whether changes are waiting for [`MaterialModel::commit`].
    pub fn is_dirty(&self) -> bool {
        self.shader_dirty || self.buffer.needs_upload()
    }

    /// Resolves everything changed since the last commit: regenerates and
    /// binds the shader, then uploads pending vertex and index data.
    pub fn commit<A: GraphicsApi>(
        &mut self,
        ctx: &mut RenderContext<A>,
        cache: &mut AssetCache,
    ) -> Result<(), ModelError> {
        if self.shader_dirty {
            self.rebuild_shader(ctx, cache)?;
        }
        self.buffer.sync(ctx.api_mut()).context(BufferErr)
    }

    fn rebuild_shader<A: GraphicsApi>(
        &mut self,
        ctx: &mut RenderContext<A>,
        cache: &mut AssetCache,
    ) -> Result<(), ModelError> {
        let format = *self.buffer.format();
        ensure!(
            format.uv_channels <= MAX_UV_CHANNELS,
            UvChannelsErr {
                channels: format.uv_channels
            }
        );
        let available = ctx.api().max_texture_units();
        ensure!(
            self.textures.len() <= available as usize,
            TextureUnitsErr {
                count: self.textures.len(),
                available,
            }
        );
        for (index, binding) in self.textures.iter().enumerate() {
            ensure!(
                binding.uv_index < format.uv_channels,
                UvChannelErr {
                    index,
                    uv_index: binding.uv_index,
                    channels: format.uv_channels,
                }
            );
        }

        let generated = ShaderGen::new(self.kind, ctx.dialect(), &format, &self.textures).generate();
        let handle = cache.load_shader(ctx.api_mut(), &generated)?;
        let program = cache.shader(handle).context(StaleShaderErr)?;

        self.buffer
            .set_layout(VertexLayout::bind(&format, |name| program.attribute_location(name)));
        for (i, binding) in self.textures.iter_mut().enumerate() {
            binding.sampler = program.uniform_location(&sampler_uniform(i));
        }
        self.uniforms = UniformSlots::resolve(program);

        if self.shader != Some(handle) {
            trace!("[Model] {} now uses shader {}", self.buffer.id(), generated.key);
            self.shader = Some(handle);
            self.resort_dirty = true;
        }
        self.shader_dirty = false;

        Ok(())
    }

    /// Draws the model with `frame` as its placement.
    ///
    /// Uniforms go up in a fixed order: projection, world-view, scale,
    /// samplers while their units are activated, lights, emission, diffuse
    /// color and specular constants.
    pub fn render<A: GraphicsApi>(
        &self,
        ctx: &mut RenderContext<A>,
        cache: &AssetCache,
        camera: &impl CameraView,
        frame: &Frame,
        lights: &LightSet,
    ) -> Result<(), ModelError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        ensure!(!self.is_dirty(), UncommittedErr);

        let program = self
            .shader
            .and_then(|handle| cache.shader(handle))
            .context(StaleShaderErr)?;
        let textures = self
            .textures
            .iter()
            .enumerate()
            .map(|(index, binding)| {
                cache
                    .texture(binding.texture)
                    .map(|texture| texture.id())
                    .context(StaleTextureErr { index })
            })
            .collect::<Result<SmallVec<[TextureId; 4]>, _>>()?;

        ctx.bind_program(program.id());

        let slots = &self.uniforms;
        let view = camera.view();
        let projection = camera.projection();
        let world_view = view * frame.matrix();

        upload(ctx, slots.projection, UniformValue::Mat4(&projection));
        upload(ctx, slots.world_view, UniformValue::Mat4(&world_view));
        if self.kind.has_scale_uniform() {
            upload(ctx, slots.scale, UniformValue::Float(self.scale));
        }

        for (unit, (binding, texture)) in self.textures.iter().zip(textures).enumerate() {
            ctx.activate_texture(unit as u32, texture);
            upload(ctx, binding.sampler, UniformValue::Int(unit as i32));
        }
        ctx.deactivate_rest(self.textures.len() as u32);

        if !lights.is_empty() && self.buffer.format().has_normal && self.kind.has_lighting() {
            let arrays = lights.to_arrays(&view);
            upload(ctx, slots.light_positions, UniformValue::Vec3Array(&arrays.positions));
            upload(ctx, slots.light_colors, UniformValue::Vec3Array(&arrays.colors));
        }

        let material = &self.material;
        upload(ctx, slots.emit, UniformValue::Vec3(material.emit));
        upload(ctx, slots.diffuse, UniformValue::Vec4(material.diffuse));
        upload(
            ctx,
            slots.specular_level,
            UniformValue::Int(material.specular_level as i32),
        );
        upload(
            ctx,
            slots.specular_strength,
            UniformValue::Float(material.specular_strength),
        );

        self.buffer.draw(ctx.api_mut());
        Ok(())
    }

    /// Set when the sort key changed since [`MaterialModel::resorting_done`].
    pub fn needs_resorting(&self) -> bool {
        self.resort_dirty
    }

    pub fn resorting_done(&mut self) {
        self.resort_dirty = false;
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey {
            shader: self.shader,
            textures: self.textures.iter().map(|binding| binding.texture).collect(),
            buffer: self.buffer.id(),
        }
    }

    /// Reads a model file and loads its textures through the texture cache.
    pub fn load<A: GraphicsApi>(
        kind: ModelKind,
        ctx: &mut RenderContext<A>,
        cache: &mut AssetCache,
        path: impl AsRef<Path>,
    ) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let data = ModelData::open(path)?;
        debug!(
            "[Model] Loaded {} with {} vertices and {} textures",
            path.display(),
            data.vertex_count(),
            data.textures.len()
        );
        Self::from_data(kind, ctx, cache, data)
    }

    /// Texture filenames are opened as given.
    pub fn from_data<A: GraphicsApi>(
        kind: ModelKind,
        ctx: &mut RenderContext<A>,
        cache: &mut AssetCache,
        data: ModelData,
    ) -> Result<Self, ModelError> {
        let mut model = MaterialModel::new(kind);
        model.set_material(data.material);

        for texture in data.textures {
            model.add_texture_from_file(ctx, cache, &texture.filename, texture.semantic, texture.uv_index)?;
        }

        model.set_vertex_format(data.format);
        model.set_vertices(data.vertices);
        model.set_indices(data.primitive, data.indices);

        Ok(model)
    }

    /// The model as it would be written to a model file.
    pub fn to_data(&self, cache: &AssetCache) -> Result<ModelData, ModelError> {
        let textures = self
            .textures
            .iter()
            .enumerate()
            .map(|(index, binding)| {
                let key = self.texture_image(cache, index)?;
                Ok(ModelTexture {
                    filename: key.filename(),
                    semantic: binding.semantic.clone(),
                    uv_index: binding.uv_index,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(ModelData {
            material: self.material.clone(),
            textures,
            format: *self.buffer.format(),
            vertices: self.buffer.vertex_bytes().to_vec(),
            primitive: self.buffer.primitive(),
            indices: self.buffer.indices().to_vec(),
        })
    }

    /// Frees the vertex and index buffers. Shaders and textures stay in the
    /// cache since other models may share them.
    pub fn release<A: GraphicsApi>(&mut self, ctx: &mut RenderContext<A>) {
        self.buffer.release(ctx.api_mut());
    }
}

fn upload<A: GraphicsApi>(ctx: &mut RenderContext<A>, location: Option<UniformLocation>, value: UniformValue<'_>) {
    if let Some(location) = location {
        ctx.api_mut().set_uniform(location, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::{ScreenCamera, Vertex};
    use crate::engine::rendering::backend::{GlCall, HeadlessApi};
    use nalgebra::Vector2;

    fn triangle(format: VertexFormat) -> Vec<u8> {
        let vertices: Vec<Vertex> = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]
            .into_iter()
            .map(|(x, y)| {
                Vertex::new(Vector3::new(x, y, 0.0))
                    .with_normal(Vector3::z())
                    .with_uv(Vector2::new(x, y))
            })
            .collect();
        format.pack(&vertices)
    }

    fn committed(kind: ModelKind, format: VertexFormat) -> (RenderContext<HeadlessApi>, AssetCache, MaterialModel) {
        let mut ctx = RenderContext::new(HeadlessApi::new());
        let mut cache = AssetCache::new();
        let mut model = MaterialModel::new(kind);
        model.set_vertex_format(format);
        model.set_vertices(triangle(format));
        model.set_indices(Primitive::Triangles, vec![0, 1, 2]);
        model.commit(&mut ctx, &mut cache).unwrap();
        (ctx, cache, model)
    }

    #[test]
    fn texture_index_out_of_range() {
        let model = MaterialModel::new(ModelKind::Scene);
        let err = model.texture(0).unwrap_err();
        assert!(matches!(err, ModelError::TextureIndex { index: 0, len: 0 }));
    }

    #[test]
    fn uv_channel_must_exist() {
        let mut ctx = RenderContext::new(HeadlessApi::new());
        let mut cache = AssetCache::new();
        let mut model = MaterialModel::new(ModelKind::Scene);
        model.set_vertex_format(VertexFormat::new(false, false, false, 1));
        model
            .add_texture_from_image(&mut ctx, &mut cache, "t", &RgbaImage::new(1, 1), TextureSemantic::Diffuse, 1)
            .unwrap();

        let err = model.commit(&mut ctx, &mut cache).unwrap_err();
        assert!(matches!(err, ModelError::UvChannel { index: 0, uv_index: 1, channels: 1 }));
        assert!(cache.shaders.is_empty());
    }

    #[test]
    fn textures_must_fit_the_texture_units() {
        let mut ctx = RenderContext::new(HeadlessApi::new().with_max_texture_units(2));
        let mut cache = AssetCache::new();
        let mut model = MaterialModel::new(ModelKind::Flat);
        model.set_vertex_format(VertexFormat::new(false, false, false, 1));
        for name in ["a", "b", "c"] {
            model
                .add_texture_from_image(&mut ctx, &mut cache, name, &RgbaImage::new(1, 1), TextureSemantic::Diffuse, 0)
                .unwrap();
        }

        let err = model.commit(&mut ctx, &mut cache).unwrap_err();
        assert!(matches!(err, ModelError::TextureUnits { count: 3, available: 2 }), "{err}");
        assert!(cache.shaders.is_empty());

        model.clear_textures();
        model
            .add_texture_from_image(&mut ctx, &mut cache, "a", &RgbaImage::new(1, 1), TextureSemantic::Diffuse, 0)
            .unwrap();
        model.commit(&mut ctx, &mut cache).unwrap();
    }

    #[test]
    fn oversized_vertex_formats_are_rejected() {
        let mut ctx = RenderContext::new(HeadlessApi::new());
        let mut cache = AssetCache::new();
        let mut model = MaterialModel::new(ModelKind::Scene);
        model.set_vertex_format(VertexFormat::new(false, false, false, MAX_UV_CHANNELS + 1));

        let err = model.commit(&mut ctx, &mut cache).unwrap_err();
        assert!(matches!(err, ModelError::UvChannels { channels } if channels == MAX_UV_CHANNELS + 1));
        assert_eq!(ctx.api().live_programs(), 0);
    }

    #[test]
    fn render_requires_commit() {
        let (mut ctx, cache, mut model) = committed(ModelKind::Scene, VertexFormat::new(true, false, false, 1));
        model.set_vertex_format(VertexFormat::new(true, false, false, 2));
        model.set_vertices(vec![0u8; 40 * 3]);

        let err = model
            .render(&mut ctx, &cache, &ScreenCamera::new(640.0, 480.0), &Frame::identity(), &LightSet::new())
            .unwrap_err();
        assert!(matches!(err, ModelError::Uncommitted));
    }

    #[test]
    fn empty_model_renders_nothing() {
        let mut ctx = RenderContext::new(HeadlessApi::new());
        let cache = AssetCache::new();
        let model = MaterialModel::new(ModelKind::Gui);

        model
            .render(&mut ctx, &cache, &ScreenCamera::new(640.0, 480.0), &Frame::identity(), &LightSet::new())
            .unwrap();
        assert!(ctx.api().calls().is_empty());
    }

    #[test]
    fn gui_models_skip_scale_and_lights() {
        let (mut ctx, cache, model) = committed(ModelKind::Gui, VertexFormat::new(true, false, false, 1));
        let lights: LightSet = [crate::engine::rendering::lights::Light::new(Vector3::zeros(), Vector3::x())]
            .into_iter()
            .collect();
        ctx.api_mut().take_calls();

        model
            .render(&mut ctx, &cache, &ScreenCamera::new(640.0, 480.0), &Frame::identity(), &lights)
            .unwrap();

        let names = ctx.api().uniform_names();
        assert_eq!(names, vec!["uProjection", "uWorldView", "uEmitColor", "uDiffuseColor"]);
        assert_eq!(ctx.api().count_calls(|c| matches!(c, GlCall::DrawIndexed { .. })), 1);
    }

    #[test]
    fn shader_change_flags_resort() {
        let (mut ctx, mut cache, mut model) = committed(ModelKind::Scene, VertexFormat::new(true, false, false, 1));
        assert!(model.needs_resorting());
        model.resorting_done();

        // same configuration, same program
        model.set_vertex_format(VertexFormat::new(true, false, false, 2));
        model.set_vertex_format(VertexFormat::new(true, false, false, 1));
        model.set_vertices(triangle(VertexFormat::new(true, false, false, 1)));
        model.commit(&mut ctx, &mut cache).unwrap();
        assert!(!model.needs_resorting());

        model
            .add_texture_from_image(&mut ctx, &mut cache, "t", &RgbaImage::new(1, 1), TextureSemantic::Diffuse, 0)
            .unwrap();
        assert!(model.needs_resorting());
    }

    #[test]
    fn specular_is_clamped() {
        let mut model = MaterialModel::new(ModelKind::Scene);
        model.set_specular(0, -1.0);
        assert_eq!(model.material().specular_level, 1);
        assert_eq!(model.material().specular_strength, 0.0);
    }

    #[test]
    fn sort_key_orders_by_shader_then_textures() {
        let (mut ctx, mut cache, mut a) = committed(ModelKind::Scene, VertexFormat::new(true, false, false, 1));
        let mut b = MaterialModel::new(ModelKind::Scene);
        b.set_vertex_format(VertexFormat::new(true, false, false, 1));
        b.commit(&mut ctx, &mut cache).unwrap();

        assert_eq!(a.sort_key().shader, b.sort_key().shader);
        assert_eq!(a.sort_key() < b.sort_key(), a.vertex_buffer().id() < b.vertex_buffer().id());

        let texture = a
            .add_texture_from_image(&mut ctx, &mut cache, "t", &RgbaImage::new(1, 1), TextureSemantic::Normal, 0)
            .unwrap();
        b.add_texture(texture, TextureSemantic::Normal, 0);
        b.add_texture(texture, TextureSemantic::Normal, 0);
        a.commit(&mut ctx, &mut cache).unwrap();
        b.commit(&mut ctx, &mut cache).unwrap();

        // different texture lists generate different programs
        assert_ne!(a.sort_key().shader, b.sort_key().shader);
    }
}
