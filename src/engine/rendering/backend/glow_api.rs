use super::{
    ActiveVariable, BackendError, BufferId, BufferTarget, CompileSnafu, DrawCall, GraphicsApi,
    LinkSnafu, ProgramId, ShaderObjectId, ShaderStage, TextureId, UniformLocation, UniformValue,
    parse_glsl_version,
};
use crate::engine::rendering::vertex_buffer::Primitive;
use glow::HasContext;
use log::{debug, warn};

/// [`GraphicsApi`] on top of a [`glow::Context`].
///
/// Every call assumes the wrapped context is current on the calling thread.
pub struct GlowApi {
    gl: glow::Context,
    vertex_array: Option<glow::VertexArray>,
    glsl_version: (u32, u32),
    max_texture_units: u32,
}

impl GlowApi {
    /// Wraps a loaded context.
    ///
    /// # Safety
    ///
    /// `gl` must be current on this thread and stay current for as long as
    /// the returned value is used.
    pub unsafe fn new(gl: glow::Context) -> Result<Self, BackendError> {
        let version_string = unsafe { gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION) };
        let glsl_version = parse_glsl_version(&version_string).unwrap_or_else(|| {
            warn!("[GL] Could not parse shading language version {version_string:?}, assuming 1.20");
            (1, 20)
        });

        let max_texture_units = unsafe { gl.get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS) }.max(1) as u32;

        // core profiles refuse to draw without a bound vertex array
        let vertex_array = if gl.version().major >= 3 {
            let vao = unsafe { gl.create_vertex_array() }.map_err(|message| BackendError::Create {
                resource: "vertex array",
                message,
            })?;
            unsafe { gl.bind_vertex_array(Some(vao)) };
            Some(vao)
        } else {
            None
        };

        debug!(
            "[GL] GLSL {}.{:02}, {max_texture_units} texture units",
            glsl_version.0, glsl_version.1
        );

        Ok(GlowApi {
            gl,
            vertex_array,
            glsl_version,
            max_texture_units,
        })
    }

    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    pub fn into_inner(self) -> glow::Context {
        if let Some(vao) = self.vertex_array {
            unsafe {
                self.gl.bind_vertex_array(None);
                self.gl.delete_vertex_array(vao);
            }
        }
        self.gl
    }
}

fn shader(id: ShaderObjectId) -> glow::Shader {
    glow::NativeShader(id.0)
}

fn program(id: ProgramId) -> glow::Program {
    glow::NativeProgram(id.0)
}

fn texture(id: TextureId) -> glow::Texture {
    glow::NativeTexture(id.0)
}

fn buffer(id: BufferId) -> glow::Buffer {
    glow::NativeBuffer(id.0)
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Vertices => glow::ARRAY_BUFFER,
        BufferTarget::Indices => glow::ELEMENT_ARRAY_BUFFER,
    }
}

impl GraphicsApi for GlowApi {
    fn glsl_version(&self) -> (u32, u32) {
        self.glsl_version
    }

    fn max_texture_units(&self) -> u32 {
        self.max_texture_units
    }

    fn create_shader_object(&mut self, stage: ShaderStage) -> Result<ShaderObjectId, BackendError> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        let native = unsafe { self.gl.create_shader(kind) }.map_err(|message| BackendError::Create {
            resource: "shader object",
            message,
        })?;
        Ok(ShaderObjectId(native.0))
    }

    fn compile_shader_object(&mut self, id: ShaderObjectId, source: &str) -> Result<(), BackendError> {
        let native = shader(id);
        unsafe {
            self.gl.shader_source(native, source);
            self.gl.compile_shader(native);

            if !self.gl.get_shader_compile_status(native) {
                let log = self.gl.get_shader_info_log(native);
                return CompileSnafu { log }.fail();
            }
        }
        Ok(())
    }

    fn delete_shader_object(&mut self, id: ShaderObjectId) {
        unsafe { self.gl.delete_shader(shader(id)) }
    }

    fn create_program(&mut self) -> Result<ProgramId, BackendError> {
        let native = unsafe { self.gl.create_program() }.map_err(|message| BackendError::Create {
            resource: "program",
            message,
        })?;
        Ok(ProgramId(native.0))
    }

    fn attach_shader_object(&mut self, program_id: ProgramId, shader_id: ShaderObjectId) {
        unsafe { self.gl.attach_shader(program(program_id), shader(shader_id)) }
    }

    fn detach_shader_object(&mut self, program_id: ProgramId, shader_id: ShaderObjectId) {
        unsafe { self.gl.detach_shader(program(program_id), shader(shader_id)) }
    }

    fn link_program(&mut self, id: ProgramId) -> Result<(), BackendError> {
        let native = program(id);
        unsafe {
            self.gl.link_program(native);

            if !self.gl.get_program_link_status(native) {
                let log = self.gl.get_program_info_log(native);
                return LinkSnafu { log }.fail();
            }
        }
        Ok(())
    }

    fn delete_program(&mut self, id: ProgramId) {
        unsafe { self.gl.delete_program(program(id)) }
    }

    fn active_uniforms(&self, id: ProgramId) -> Vec<ActiveVariable> {
        let native = program(id);
        unsafe {
            (0..self.gl.get_active_uniforms(native))
                .filter_map(|index| self.gl.get_active_uniform(native, index))
                .filter_map(|uniform| {
                    let location = self.gl.get_uniform_location(native, &uniform.name)?;
                    Some(ActiveVariable {
                        name: uniform.name,
                        location: location.0,
                    })
                })
                .collect()
        }
    }

    fn active_attributes(&self, id: ProgramId) -> Vec<ActiveVariable> {
        let native = program(id);
        unsafe {
            (0..self.gl.get_active_attributes(native))
                .filter_map(|index| self.gl.get_active_attribute(native, index))
                .filter_map(|attribute| {
                    let location = self.gl.get_attrib_location(native, &attribute.name)?;
                    Some(ActiveVariable {
                        name: attribute.name,
                        location,
                    })
                })
                .collect()
        }
    }

    fn use_program(&mut self, id: Option<ProgramId>) {
        unsafe { self.gl.use_program(id.map(program)) }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>) {
        let location = glow::NativeUniformLocation(location.0);
        let location = Some(&location);
        unsafe {
            match value {
                UniformValue::Int(v) => self.gl.uniform_1_i32(location, v),
                UniformValue::Float(v) => self.gl.uniform_1_f32(location, v),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32(location, v.x, v.y, v.z),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32(location, v.x, v.y, v.z, v.w),
                UniformValue::Mat4(m) => self.gl.uniform_matrix_4_f32_slice(location, false, m.as_slice()),
                UniformValue::Vec3Array(values) => {
                    self.gl
                        .uniform_3_f32_slice(location, bytemuck::cast_slice::<_, f32>(values))
                }
            }
        }
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, BackendError> {
        unsafe {
            let native = self.gl.create_texture().map_err(|message| BackendError::Create {
                resource: "texture",
                message,
            })?;

            self.gl.bind_texture(glow::TEXTURE_2D, Some(native));
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                Some(rgba),
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);

            Ok(TextureId(native.0))
        }
    }

    fn delete_texture(&mut self, id: TextureId) {
        unsafe { self.gl.delete_texture(texture(id)) }
    }

    fn bind_texture(&mut self, unit: u32, id: Option<TextureId>) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, id.map(texture));
        }
    }

    fn create_buffer(&mut self) -> Result<BufferId, BackendError> {
        let native = unsafe { self.gl.create_buffer() }.map_err(|message| BackendError::Create {
            resource: "buffer",
            message,
        })?;
        Ok(BufferId(native.0))
    }

    fn upload_buffer(&mut self, id: BufferId, target: BufferTarget, data: &[u8]) {
        let target = buffer_target(target);
        unsafe {
            self.gl.bind_buffer(target, Some(buffer(id)));
            self.gl.buffer_data_u8_slice(target, data, glow::STATIC_DRAW);
        }
    }

    fn delete_buffer(&mut self, id: BufferId) {
        unsafe { self.gl.delete_buffer(buffer(id)) }
    }

    fn draw_indexed(&mut self, call: &DrawCall<'_>) {
        let mode = match call.primitive {
            Primitive::Lines => glow::LINES,
            Primitive::Triangles => glow::TRIANGLES,
        };
        let stride = call.layout.stride() as i32;

        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer(call.vertices)));
            self.gl
                .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buffer(call.indices)));

            for component in call.layout.components() {
                self.gl.enable_vertex_attrib_array(component.location);
                self.gl.vertex_attrib_pointer_f32(
                    component.location,
                    component.components as i32,
                    glow::FLOAT,
                    false,
                    stride,
                    component.offset as i32,
                );
            }

            self.gl
                .draw_elements(mode, call.index_count as i32, glow::UNSIGNED_INT, 0);

            for component in call.layout.components() {
                self.gl.disable_vertex_attrib_array(component.location);
            }
        }
    }
}
