use crate::engine::rendering::backend::{
    BackendError, GraphicsApi, ProgramId, ShaderObjectId, ShaderStage, UniformLocation,
};
use crate::engine::rendering::cache::CacheType;
use crate::engine::rendering::context::RenderContext;
use itertools::Itertools;
use log::{debug, trace};
use snafu::{ResultExt, Snafu};
use std::collections::HashMap;

#[derive(Debug, Snafu)]
pub enum ShaderError {
    #[snafu(display("Failed to create {stage} stage object for shader \"{name}\": {source}"))]
    StageObject {
        name: String,
        stage: ShaderStage,
        source: BackendError,
    },

    #[snafu(display("Failed to create program object for shader \"{name}\": {source}"))]
    ProgramObject { name: String, source: BackendError },

    #[snafu(display("Failed to compile {stage} stage of shader \"{name}\":\n{log}\n{}", numbered(code)))]
    Compile {
        name: String,
        stage: ShaderStage,
        log: String,
        code: String,
    },

    #[snafu(display(
        "Failed to link shader \"{name}\":\n{log}\nvertex stage:\n{}\nfragment stage:\n{}",
        numbered(vertex),
        numbered(fragment)
    ))]
    Link {
        name: String,
        log: String,
        vertex: String,
        fragment: String,
    },
}

fn numbered(code: &str) -> String {
    code.lines()
        .enumerate()
        .map(|(i, line)| format!("{:>4} | {line}", i + 1))
        .join("\n")
}

/// Source text of a two-stage program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCode {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderCode {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

/// A linked program together with the locations of its active uniforms and
/// attributes.
#[derive(Debug)]
pub struct ShaderProgram {
    name: String,
    id: ProgramId,
    uniforms: HashMap<String, UniformLocation>,
    attributes: HashMap<String, u32>,
}

impl ShaderProgram {
    /// Compiles both stages and links them.
    ///
    /// Stage objects are always deleted before returning. On failure the
    /// program object is deleted as well, so nothing is left on the driver.
    pub fn new(api: &mut dyn GraphicsApi, name: impl Into<String>, code: &ShaderCode) -> Result<Self, ShaderError> {
        let name = name.into();

        let vertex = compile_stage(api, &name, ShaderStage::Vertex, &code.vertex)?;
        let fragment = match compile_stage(api, &name, ShaderStage::Fragment, &code.fragment) {
            Ok(fragment) => fragment,
            Err(e) => {
                api.delete_shader_object(vertex);
                return Err(e);
            }
        };

        let linked = link(api, &name, vertex, fragment, code);
        api.delete_shader_object(vertex);
        api.delete_shader_object(fragment);
        let id = linked?;

        let mut uniforms = HashMap::new();
        for uniform in api.active_uniforms(id) {
            let location = UniformLocation(uniform.location);
            // arrays are reported as "name[0]" but looked up by their plain name
            if let Some(base) = uniform.name.strip_suffix("[0]") {
                uniforms.insert(base.to_string(), location);
            }
            uniforms.insert(uniform.name, location);
        }

        let attributes: HashMap<String, u32> = api
            .active_attributes(id)
            .into_iter()
            .map(|attribute| (attribute.name, attribute.location))
            .collect();

        debug!(
            "[Shader] Linked \"{name}\" as {id}: uniforms [{}], attributes [{}]",
            uniforms.keys().sorted().join(", "),
            attributes.keys().sorted().join(", ")
        );

        Ok(ShaderProgram {
            name,
            id,
            uniforms,
            attributes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        let location = self.uniforms.get(name).copied();
        if location.is_none() {
            trace!("[Shader] \"{}\" has no active uniform {name}", self.name);
        }
        location
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.keys().map(String::as_str)
    }

    /// Binds the program through the context, skipping the call when it is
    /// already bound.
    pub fn activate<A: GraphicsApi>(&self, ctx: &mut RenderContext<A>) -> bool {
        ctx.bind_program(self.id)
    }

    pub fn release(self, api: &mut dyn GraphicsApi) {
        trace!("[Shader] Deleting \"{}\" ({})", self.name, self.id);
        api.delete_program(self.id);
    }
}

impl CacheType for ShaderProgram {
    fn name() -> &'static str {
        "Shader"
    }

    fn release(self, api: &mut dyn GraphicsApi) {
        ShaderProgram::release(self, api);
    }
}

fn compile_stage(
    api: &mut dyn GraphicsApi,
    name: &str,
    stage: ShaderStage,
    code: &str,
) -> Result<ShaderObjectId, ShaderError> {
    let object = api
        .create_shader_object(stage)
        .context(StageObjectSnafu { name, stage })?;

    if let Err(e) = api.compile_shader_object(object, code) {
        api.delete_shader_object(object);
        return CompileSnafu {
            name,
            stage,
            log: e.to_string(),
            code,
        }
        .fail();
    }

    Ok(object)
}

fn link(
    api: &mut dyn GraphicsApi,
    name: &str,
    vertex: ShaderObjectId,
    fragment: ShaderObjectId,
    code: &ShaderCode,
) -> Result<ProgramId, ShaderError> {
    let program = api.create_program().context(ProgramObjectSnafu { name })?;

    api.attach_shader_object(program, vertex);
    api.attach_shader_object(program, fragment);
    let linked = api.link_program(program);
    api.detach_shader_object(program, vertex);
    api.detach_shader_object(program, fragment);

    if let Err(e) = linked {
        api.delete_program(program);
        return LinkSnafu {
            name,
            log: e.to_string(),
            vertex: code.vertex.as_str(),
            fragment: code.fragment.as_str(),
        }
        .fail();
    }

    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rendering::backend::HeadlessApi;

    const VERTEX: &str = "#version 120\nuniform mat4 uProjection;\nuniform vec3 uLightPositions[4];\nattribute vec3 aPosition;\nattribute vec2 aUV0;\nvarying vec2 vUV0;\nvoid main()\n{\n\tvUV0 = aUV0;\n}\n";
    const FRAGMENT: &str = "#version 120\nvarying vec2 vUV0;\nuniform sampler2D uSampler0;\nvoid main()\n{\n}\n";

    #[test]
    fn locations_are_resolved_after_link() {
        let mut api = HeadlessApi::new();
        let program = ShaderProgram::new(&mut api, "test", &ShaderCode::new(VERTEX, FRAGMENT)).unwrap();

        assert!(program.uniform_location("uProjection").is_some());
        assert!(program.uniform_location("uSampler0").is_some());
        assert_eq!(
            program.uniform_location("uLightPositions"),
            program.uniform_location("uLightPositions[0]")
        );
        assert!(program.uniform_location("uMissing").is_none());
        assert_eq!(program.attribute_location("aPosition"), Some(0));
        assert_eq!(program.attribute_location("aUV0"), Some(1));

        // stage objects never outlive the link
        assert_eq!(api.live_shader_objects(), 0);
        assert_eq!(api.live_programs(), 1);

        program.release(&mut api);
        assert_eq!(api.live_programs(), 0);
    }

    #[test]
    fn compile_failure_cleans_up_and_carries_source() {
        let mut api = HeadlessApi::new();
        let broken = "#version 120\nvoid main()\n{\n";

        let err = ShaderProgram::new(&mut api, "broken", &ShaderCode::new(VERTEX, broken)).unwrap_err();

        assert!(matches!(err, ShaderError::Compile { stage: ShaderStage::Fragment, .. }));
        let message = err.to_string();
        assert!(message.contains("unexpected end of file"), "{message}");
        assert!(message.contains("   3 | {"), "{message}");
        assert_eq!(api.live_shader_objects(), 0);
        assert_eq!(api.live_programs(), 0);
    }

    #[test]
    fn link_failure_deletes_program() {
        let mut api = HeadlessApi::new();
        let fragment = "#version 120\nvarying vec3 vNormal;\nvoid main()\n{\n}\n";

        let err = ShaderProgram::new(&mut api, "unlinked", &ShaderCode::new(VERTEX, fragment)).unwrap_err();

        let ShaderError::Link { log, fragment: code, .. } = &err else {
            panic!("expected a link error, got {err}");
        };
        assert!(log.contains("vNormal"));
        assert!(code.contains("varying vec3 vNormal;"));
        assert_eq!(api.live_shader_objects(), 0);
        assert_eq!(api.live_programs(), 0);
    }
}
