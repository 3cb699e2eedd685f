use crate::engine::rendering::backend::{GraphicsApi, ProgramId, TextureId};
use crate::engine::rendering::shader_gen::ShaderDialect;
use log::trace;

/// Graphics API handle plus the binding state the renderer tracks on top of it.
///
/// The last bound program is remembered so that binding it again is skipped.
/// Code that binds programs on the API directly must call
/// [`RenderContext::invalidate_program`] afterwards, otherwise the next
/// model using the remembered program renders with the wrong one.
pub struct RenderContext<A: GraphicsApi> {
    api: A,
    dialect: ShaderDialect,
    bound_program: Option<ProgramId>,
    occupied_units: u32,
}

impl<A: GraphicsApi> RenderContext<A> {
    pub fn new(api: A) -> Self {
        let dialect = ShaderDialect::for_glsl_version(api.glsl_version());
        trace!("[Render Context] Using {dialect:?}");

        RenderContext {
            api,
            dialect,
            bound_program: None,
            occupied_units: 0,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut A {
        &mut self.api
    }

    pub fn into_inner(self) -> A {
        self.api
    }

    pub fn dialect(&self) -> ShaderDialect {
        self.dialect
    }

    pub fn bound_program(&self) -> Option<ProgramId> {
        self.bound_program
    }

    /// Binds `program` unless it is already the bound one. Returns whether a
    /// bind was issued.
    pub fn bind_program(&mut self, program: ProgramId) -> bool {
        if self.bound_program == Some(program) {
            return false;
        }
        self.api.use_program(Some(program));
        self.bound_program = Some(program);
        true
    }

    pub fn unbind_program(&mut self) {
        self.api.use_program(None);
        self.bound_program = None;
    }

    /// Forgets the remembered program so the next bind is always issued.
    pub fn invalidate_program(&mut self) {
        self.bound_program = None;
    }

    /// Called when a program object is destroyed, as its id may be reused.
    pub(crate) fn forget_program(&mut self, program: ProgramId) {
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
    }

    pub fn activate_texture(&mut self, unit: u32, texture: TextureId) {
        self.api.bind_texture(unit, Some(texture));
        self.occupied_units = self.occupied_units.max(unit + 1);
    }

    /// Unbinds every unit from `first_unused` up to the highest unit a
    /// previous draw left a texture in.
    pub fn deactivate_rest(&mut self, first_unused: u32) {
        for unit in first_unused..self.occupied_units {
            self.api.bind_texture(unit, None);
        }
        self.occupied_units = self.occupied_units.min(first_unused);
    }

    pub fn occupied_texture_units(&self) -> u32 {
        self.occupied_units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rendering::backend::{GlCall, HeadlessApi};
    use std::num::NonZeroU32;

    fn program(id: u32) -> ProgramId {
        ProgramId(NonZeroU32::new(id).unwrap())
    }

    fn texture(id: u32) -> TextureId {
        TextureId(NonZeroU32::new(id).unwrap())
    }

    #[test]
    fn repeated_binds_are_elided() {
        let mut ctx = RenderContext::new(HeadlessApi::new());

        assert!(ctx.bind_program(program(1)));
        assert!(!ctx.bind_program(program(1)));
        assert!(ctx.bind_program(program(2)));

        let binds = ctx.api().count_calls(|c| matches!(c, GlCall::UseProgram(_)));
        assert_eq!(binds, 2);
    }

    #[test]
    fn invalidation_forces_rebind() {
        let mut ctx = RenderContext::new(HeadlessApi::new());
        ctx.bind_program(program(1));

        // someone else bound a program behind our back
        ctx.api_mut().use_program(Some(program(7)));
        ctx.invalidate_program();

        assert!(ctx.bind_program(program(1)));
        assert_eq!(ctx.api().bound_program(), Some(program(1)));
    }

    #[test]
    fn deactivate_rest_clears_higher_units() {
        let mut ctx = RenderContext::new(HeadlessApi::new());
        ctx.activate_texture(0, texture(1));
        ctx.activate_texture(1, texture(2));
        ctx.activate_texture(2, texture(3));

        ctx.deactivate_rest(1);

        assert_eq!(ctx.api().bound_texture(0), Some(texture(1)));
        assert_eq!(ctx.api().bound_texture(1), None);
        assert_eq!(ctx.api().bound_texture(2), None);
        assert_eq!(ctx.occupied_texture_units(), 1);
    }

    #[test]
    fn dialect_follows_glsl_version() {
        assert_eq!(RenderContext::new(HeadlessApi::new()).dialect(), ShaderDialect::Glsl120);
        assert_eq!(
            RenderContext::new(HeadlessApi::with_glsl_version(3, 30)).dialect(),
            ShaderDialect::Glsl150
        );
    }
}
