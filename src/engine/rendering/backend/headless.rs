use super::{
    ActiveVariable, BackendError, BufferId, BufferTarget, CompileSnafu, DrawCall, GraphicsApi, LinkSnafu, ProgramId,
    ShaderObjectId, ShaderStage, TextureId, UniformLocation, UniformValue,
};
use crate::engine::core::VertexComponent;
use crate::engine::rendering::vertex_buffer::Primitive;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;

/// An owned copy of an uploaded uniform value.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUniform {
    Int(i32),
    Float(f32),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([f32; 16]),
    Vec3Array(Vec<[f32; 3]>),
}

impl From<UniformValue<'_>> for RecordedUniform {
    fn from(value: UniformValue<'_>) -> Self {
        match value {
            UniformValue::Int(v) => RecordedUniform::Int(v),
            UniformValue::Float(v) => RecordedUniform::Float(v),
            UniformValue::Vec3(v) => RecordedUniform::Vec3(v.into()),
            UniformValue::Vec4(v) => RecordedUniform::Vec4(v.into()),
            UniformValue::Mat4(m) => {
                let mut out = [0.0; 16];
                out.copy_from_slice(m.as_slice());
                RecordedUniform::Mat4(out)
            }
            UniformValue::Vec3Array(values) => {
                RecordedUniform::Vec3Array(values.iter().map(|v| [v.x, v.y, v.z]).collect())
            }
        }
    }
}

/// One call received by a [`HeadlessApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateShader(ShaderObjectId, ShaderStage),
    CompileShader(ShaderObjectId),
    DeleteShader(ShaderObjectId),
    CreateProgram(ProgramId),
    LinkProgram(ProgramId),
    DeleteProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    SetUniform {
        name: String,
        value: RecordedUniform,
    },
    CreateTexture(TextureId),
    DeleteTexture(TextureId),
    BindTexture {
        unit: u32,
        texture: Option<TextureId>,
    },
    CreateBuffer(BufferId),
    UploadBuffer {
        buffer: BufferId,
        target: BufferTarget,
        len: usize,
    },
    DeleteBuffer(BufferId),
    DrawIndexed {
        vertices: BufferId,
        indices: BufferId,
        stride: u32,
        components: Vec<VertexComponent>,
        primitive: Primitive,
        index_count: u32,
    },
}

#[derive(Debug, Default, Clone)]
struct Declarations {
    uniforms: Vec<String>,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    declarations: Option<Declarations>,
}

#[derive(Debug, Default)]
struct Program {
    attached: Vec<ShaderObjectId>,
    uniforms: Vec<ActiveVariable>,
    attributes: Vec<ActiveVariable>,
}

/// A window-less [`GraphicsApi`] that records every call.
///
/// Compilation checks for a `#version` directive, a `main` function and
/// balanced braces. Linking requires one vertex and one fragment stage and
/// that every fragment input is written by the vertex stage. Active
/// uniforms and attributes are taken from the declarations, with arrays
/// reported as `name[0]` like a real driver does.
#[derive(Debug)]
pub struct HeadlessApi {
    glsl_version: (u32, u32),
    max_texture_units: u32,
    next_id: u32,
    shaders: HashMap<ShaderObjectId, ShaderObject>,
    programs: HashMap<ProgramId, Program>,
    textures: HashMap<TextureId, (u32, u32)>,
    buffers: HashMap<BufferId, usize>,
    bound_program: Option<ProgramId>,
    texture_units: BTreeMap<u32, TextureId>,
    calls: Vec<GlCall>,
}

impl Default for HeadlessApi {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessApi {
    pub fn new() -> Self {
        Self::with_glsl_version(1, 20)
    }

    pub fn with_glsl_version(major: u32, minor: u32) -> Self {
        HeadlessApi {
            glsl_version: (major, minor),
            max_texture_units: 16,
            next_id: 0,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            buffers: HashMap::new(),
            bound_program: None,
            texture_units: BTreeMap::new(),
            calls: Vec::new(),
        }
    }

    pub fn with_max_texture_units(mut self, units: u32) -> Self {
        self.max_texture_units = units;
        self
    }

    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn live_shader_objects(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn bound_program(&self) -> Option<ProgramId> {
        self.bound_program
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.texture_units.get(&unit).copied()
    }

    /// Names of the uniforms uploaded so far, in upload order.
    pub fn uniform_names(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                GlCall::SetUniform { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn last_uniform(&self, name: &str) -> Option<&RecordedUniform> {
        self.calls.iter().rev().find_map(|call| match call {
            GlCall::SetUniform { name: n, value } if n == name => Some(value),
            _ => None,
        })
    }

    pub fn count_calls(&self, predicate: impl Fn(&GlCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    fn next_handle(&mut self) -> NonZeroU32 {
        self.next_id += 1;
        NonZeroU32::MIN.saturating_add(self.next_id - 1)
    }

    fn uniform_name(&self, location: UniformLocation) -> String {
        self.bound_program
            .and_then(|program| self.programs.get(&program))
            .and_then(|program| program.uniforms.iter().find(|u| u.location == location.0))
            .map(|u| u.name.trim_end_matches("[0]").to_string())
            .unwrap_or_else(|| format!("<location {}>", location.0))
    }
}

fn check_source(source: &str) -> Result<(), String> {
    let first = source.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
    if !first.trim_start().starts_with("#version") {
        return Err("0:1(1): error: missing #version directive".to_string());
    }

    let mut depth = 0i32;
    for (line_no, line) in source.lines().enumerate() {
        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Err(format!("0:{}(1): error: unexpected '}}'", line_no + 1));
            }
        }
    }
    if depth != 0 {
        return Err(format!("0:{}(1): error: unexpected end of file", source.lines().count()));
    }

    if !source.contains("void main(") {
        return Err("0:0(0): error: function `main' is not defined".to_string());
    }

    Ok(())
}

fn declared_name(tokens: &[&str]) -> Option<(String, bool)> {
    let raw = tokens.get(2)?.trim_end_matches(';');
    match raw.split_once('[') {
        Some((name, _)) => Some((name.to_string(), true)),
        None => Some((raw.to_string(), false)),
    }
}

fn parse_declarations(stage: ShaderStage, source: &str) -> Declarations {
    let mut decl = Declarations::default();

    for line in source.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(qualifier) = tokens.first() else {
            continue;
        };
        let Some((name, is_array)) = declared_name(&tokens) else {
            continue;
        };

        match (*qualifier, stage) {
            ("uniform", _) => decl.uniforms.push(if is_array { format!("{name}[0]") } else { name }),
            ("attribute", ShaderStage::Vertex) | ("in", _) => decl.inputs.push(name),
            ("varying", ShaderStage::Vertex) | ("out", ShaderStage::Vertex) => decl.outputs.push(name),
            ("varying", ShaderStage::Fragment) => decl.inputs.push(name),
            _ => {}
        }
    }

    decl
}

impl GraphicsApi for HeadlessApi {
    fn glsl_version(&self) -> (u32, u32) {
        self.glsl_version
    }

    fn max_texture_units(&self) -> u32 {
        self.max_texture_units
    }

    fn create_shader_object(&mut self, stage: ShaderStage) -> Result<ShaderObjectId, BackendError> {
        let id = ShaderObjectId(self.next_handle());
        self.shaders.insert(
            id,
            ShaderObject {
                stage,
                declarations: None,
            },
        );
        self.calls.push(GlCall::CreateShader(id, stage));
        Ok(id)
    }

    fn compile_shader_object(&mut self, shader: ShaderObjectId, source: &str) -> Result<(), BackendError> {
        self.calls.push(GlCall::CompileShader(shader));

        let Some(object) = self.shaders.get_mut(&shader) else {
            return CompileSnafu {
                log: format!("{shader} does not exist"),
            }
            .fail();
        };

        if let Err(log) = check_source(source) {
            return CompileSnafu { log }.fail();
        }

        object.declarations = Some(parse_declarations(object.stage, source));
        Ok(())
    }

    fn delete_shader_object(&mut self, shader: ShaderObjectId) {
        self.shaders.remove(&shader);
        self.calls.push(GlCall::DeleteShader(shader));
    }

    fn create_program(&mut self) -> Result<ProgramId, BackendError> {
        let id = ProgramId(self.next_handle());
        self.programs.insert(id, Program::default());
        self.calls.push(GlCall::CreateProgram(id));
        Ok(id)
    }

    fn attach_shader_object(&mut self, program: ProgramId, shader: ShaderObjectId) {
        if let Some(program) = self.programs.get_mut(&program) {
            program.attached.push(shader);
        }
    }

    fn detach_shader_object(&mut self, program: ProgramId, shader: ShaderObjectId) {
        if let Some(program) = self.programs.get_mut(&program) {
            program.attached.retain(|s| *s != shader);
        }
    }

    fn link_program(&mut self, program: ProgramId) -> Result<(), BackendError> {
        self.calls.push(GlCall::LinkProgram(program));

        let Some(entry) = self.programs.get(&program) else {
            return LinkSnafu {
                log: format!("{program} does not exist"),
            }
            .fail();
        };

        let mut vertex = None;
        let mut fragment = None;
        for id in &entry.attached {
            let Some(object) = self.shaders.get(id) else {
                continue;
            };
            let Some(decl) = &object.declarations else {
                return LinkSnafu {
                    log: format!("error: {id} was not compiled successfully"),
                }
                .fail();
            };
            match object.stage {
                ShaderStage::Vertex => vertex = Some(decl.clone()),
                ShaderStage::Fragment => fragment = Some(decl.clone()),
            }
        }

        let (Some(vertex), Some(fragment)) = (vertex, fragment) else {
            return LinkSnafu {
                log: "error: program needs a vertex and a fragment stage".to_string(),
            }
            .fail();
        };

        if let Some(missing) = fragment.inputs.iter().find(|input| !vertex.outputs.contains(input)) {
            return LinkSnafu {
                log: format!("error: fragment shader input `{missing}' has no matching vertex shader output"),
            }
            .fail();
        }

        let mut uniforms: Vec<ActiveVariable> = Vec::new();
        for name in vertex.uniforms.iter().chain(&fragment.uniforms) {
            if uniforms.iter().all(|u| &u.name != name) {
                let location = uniforms.len() as u32;
                uniforms.push(ActiveVariable {
                    name: name.clone(),
                    location,
                });
            }
        }

        let attributes = vertex
            .inputs
            .iter()
            .enumerate()
            .map(|(location, name)| ActiveVariable {
                name: name.clone(),
                location: location as u32,
            })
            .collect();

        if let Some(entry) = self.programs.get_mut(&program) {
            entry.uniforms = uniforms;
            entry.attributes = attributes;
        }
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
        self.calls.push(GlCall::DeleteProgram(program));
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveVariable> {
        self.programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveVariable> {
        self.programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.bound_program = program;
        self.calls.push(GlCall::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>) {
        let name = self.uniform_name(location);
        self.calls.push(GlCall::SetUniform {
            name,
            value: value.into(),
        });
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, BackendError> {
        debug_assert_eq!(rgba.len(), (width * height * 4) as usize);

        let id = TextureId(self.next_handle());
        self.textures.insert(id, (width, height));
        self.calls.push(GlCall::CreateTexture(id));
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.texture_units.retain(|_, bound| *bound != texture);
        self.calls.push(GlCall::DeleteTexture(texture));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(texture) => self.texture_units.insert(unit, texture),
            None => self.texture_units.remove(&unit),
        };
        self.calls.push(GlCall::BindTexture { unit, texture });
    }

    fn create_buffer(&mut self) -> Result<BufferId, BackendError> {
        let id = BufferId(self.next_handle());
        self.buffers.insert(id, 0);
        self.calls.push(GlCall::CreateBuffer(id));
        Ok(id)
    }

    fn upload_buffer(&mut self, buffer: BufferId, target: BufferTarget, data: &[u8]) {
        self.buffers.insert(buffer, data.len());
        self.calls.push(GlCall::UploadBuffer {
            buffer,
            target,
            len: data.len(),
        });
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        self.calls.push(GlCall::DeleteBuffer(buffer));
    }

    fn draw_indexed(&mut self, call: &DrawCall<'_>) {
        self.calls.push(GlCall::DrawIndexed {
            vertices: call.vertices,
            indices: call.indices,
            stride: call.layout.stride(),
            components: call.layout.components().to_vec(),
            primitive: call.primitive,
            index_count: call.index_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "#version 120\nuniform mat4 uWorldView;\nattribute vec3 aPosition;\nvarying vec3 vPosition;\nvoid main()\n{\n\tvPosition = aPosition;\n}\n";
    const FRAGMENT: &str = "#version 120\nuniform vec3 uLights[4];\nvarying vec3 vPosition;\nvoid main()\n{\n}\n";

    fn build(api: &mut HeadlessApi, vertex: &str, fragment: &str) -> Result<ProgramId, BackendError> {
        let vs = api.create_shader_object(ShaderStage::Vertex)?;
        api.compile_shader_object(vs, vertex)?;
        let fs = api.create_shader_object(ShaderStage::Fragment)?;
        api.compile_shader_object(fs, fragment)?;
        let program = api.create_program()?;
        api.attach_shader_object(program, vs);
        api.attach_shader_object(program, fs);
        api.link_program(program)?;
        Ok(program)
    }

    #[test]
    fn reports_declared_variables() {
        let mut api = HeadlessApi::new();
        let program = build(&mut api, VERTEX, FRAGMENT).unwrap();

        let uniforms: Vec<_> = api.active_uniforms(program).into_iter().map(|u| u.name).collect();
        assert_eq!(uniforms, ["uWorldView", "uLights[0]"]);

        let attributes = api.active_attributes(program);
        assert_eq!(attributes[0].name, "aPosition");
        assert_eq!(attributes[0].location, 0);
    }

    #[test]
    fn rejects_missing_main() {
        let mut api = HeadlessApi::new();
        let err = build(&mut api, "#version 120\nvoid helper() {}\n", FRAGMENT).unwrap_err();
        assert!(err.to_string().contains("main"));
    }

    #[test]
    fn rejects_unmatched_varying() {
        let mut api = HeadlessApi::new();
        let fragment = "#version 120\nvarying vec4 vColor;\nvoid main()\n{\n}\n";
        let err = build(&mut api, VERTEX, fragment).unwrap_err();
        assert!(err.to_string().contains("vColor"));
    }

    #[test]
    fn uniform_uploads_are_named() {
        let mut api = HeadlessApi::new();
        let program = build(&mut api, VERTEX, FRAGMENT).unwrap();
        api.use_program(Some(program));
        api.set_uniform(UniformLocation(1), UniformValue::Float(1.0));

        assert_eq!(api.uniform_names(), ["uLights"]);
    }
}
