use image::RgbaImage;
use kitgl::core::{Frame, ScreenCamera, Vertex, VertexFormat};
use kitgl::rendering::backend::{GlCall, GraphicsApi, HeadlessApi, RecordedUniform};
use kitgl::rendering::{
    AssetCache, Light, LightSet, MaterialModel, ModelKind, Primitive, RenderContext, TextureSemantic,
};
use nalgebra::{Vector2, Vector3};
use serial_test::serial;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn quad(format: VertexFormat) -> Vec<u8> {
    let vertices: Vec<Vertex> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
        .into_iter()
        .map(|(x, y)| {
            Vertex::new(Vector3::new(x, y, 0.0))
                .with_normal(Vector3::z())
                .with_uv(Vector2::new(x, y))
                .with_uv(Vector2::new(y, x))
        })
        .collect();
    format.pack(&vertices)
}

fn textured_model(
    ctx: &mut RenderContext<HeadlessApi>,
    cache: &mut AssetCache,
    kind: ModelKind,
    textures: &[&str],
) -> MaterialModel {
    let format = VertexFormat::new(true, false, false, 2);
    let mut model = MaterialModel::new(kind);
    model.set_vertex_format(format);
    model.set_vertices(quad(format));
    model.set_indices(Primitive::Triangles, vec![0, 1, 2, 0, 2, 3]);
    for (i, name) in textures.iter().enumerate() {
        model
            .add_texture_from_image(
                ctx,
                cache,
                *name,
                &RgbaImage::new(2, 2),
                TextureSemantic::Diffuse,
                i as u32,
            )
            .unwrap();
    }
    model.commit(ctx, cache).unwrap();
    model
}

fn screen() -> ScreenCamera {
    ScreenCamera::new(800.0, 600.0)
}

#[test]
#[serial]
fn unused_texture_units_are_released() {
    init();
    let mut ctx = RenderContext::new(HeadlessApi::new());
    let mut cache = AssetCache::new();

    let two = textured_model(&mut ctx, &mut cache, ModelKind::Scene, &["a", "b"]);
    let one = textured_model(&mut ctx, &mut cache, ModelKind::Scene, &["c"]);
    let lights = LightSet::new();

    two.render(&mut ctx, &cache, &screen(), &Frame::identity(), &lights)
        .unwrap();
    assert!(ctx.api().bound_texture(0).is_some());
    assert!(ctx.api().bound_texture(1).is_some());

    one.render(&mut ctx, &cache, &screen(), &Frame::identity(), &lights)
        .unwrap();
    let c = cache.texture(one.texture(0).unwrap().texture).unwrap().id();
    assert_eq!(ctx.api().bound_texture(0), Some(c));
    assert_eq!(ctx.api().bound_texture(1), None);
}

#[test]
#[serial]
fn uniforms_are_uploaded_in_order() {
    init();
    let mut ctx = RenderContext::new(HeadlessApi::new());
    let mut cache = AssetCache::new();
    let model = textured_model(&mut ctx, &mut cache, ModelKind::Scene, &["diffuse"]);

    let mut lights = LightSet::new();
    lights.push(Light::new(Vector3::new(0.0, 0.0, 5.0), Vector3::new(1.0, 1.0, 1.0)));

    ctx.api_mut().take_calls();
    model
        .render(&mut ctx, &cache, &screen(), &Frame::identity(), &lights)
        .unwrap();

    assert_eq!(
        ctx.api().uniform_names(),
        vec![
            "uProjection",
            "uWorldView",
            "uScale",
            "uSampler0",
            "uLightPositions",
            "uLightColors",
            "uEmitColor",
            "uDiffuseColor",
        ]
    );
    assert_eq!(ctx.api().last_uniform("uSampler0"), Some(&RecordedUniform::Int(0)));
    assert_eq!(ctx.api().last_uniform("uScale"), Some(&RecordedUniform::Float(1.0)));

    let calls = ctx.api().calls();
    let draw = calls
        .iter()
        .position(|c| matches!(c, GlCall::DrawIndexed { .. }))
        .unwrap();
    assert_eq!(draw, calls.len() - 1);
}

#[test]
#[serial]
fn lights_are_skipped_without_normals() {
    init();
    let mut ctx = RenderContext::new(HeadlessApi::new());
    let mut cache = AssetCache::new();

    let format = VertexFormat::new(false, false, false, 0);
    let mut model = MaterialModel::new(ModelKind::Scene);
    model.set_vertex_format(format);
    model.set_vertices(vec![0u8; 12 * 3]);
    model.set_indices(Primitive::Triangles, vec![0, 1, 2]);
    model.commit(&mut ctx, &mut cache).unwrap();

    let lights: LightSet = [Light::new(Vector3::zeros(), Vector3::x())].into_iter().collect();
    model
        .render(&mut ctx, &cache, &screen(), &Frame::identity(), &lights)
        .unwrap();

    assert!(!ctx.api().uniform_names().contains(&"uLightPositions"));
}

#[test]
#[serial]
fn world_view_includes_the_frame() {
    init();
    let mut ctx = RenderContext::new(HeadlessApi::new());
    let mut cache = AssetCache::new();
    let model = textured_model(&mut ctx, &mut cache, ModelKind::Gui, &[]);

    let frame = Frame::at(Vector3::new(10.0, 20.0, 0.0));
    model
        .render(&mut ctx, &cache, &screen(), &frame, &LightSet::new())
        .unwrap();

    let Some(RecordedUniform::Mat4(world_view)) = ctx.api().last_uniform("uWorldView") else {
        panic!("world view was not uploaded");
    };
    // column major, translation is the last column
    assert_eq!(&world_view[12..15], &[10.0, 20.0, 0.0]);
}

#[test]
#[serial]
fn shared_program_is_bound_once() {
    init();
    let mut ctx = RenderContext::new(HeadlessApi::new());
    let mut cache = AssetCache::new();

    let a = textured_model(&mut ctx, &mut cache, ModelKind::Scene, &["a"]);
    let b = textured_model(&mut ctx, &mut cache, ModelKind::Scene, &["b"]);
    assert_eq!(a.shader(), b.shader());

    let binds = |ctx: &RenderContext<HeadlessApi>| ctx.api().count_calls(|c| matches!(c, GlCall::UseProgram(_)));
    let lights = LightSet::new();

    a.render(&mut ctx, &cache, &screen(), &Frame::identity(), &lights)
        .unwrap();
    b.render(&mut ctx, &cache, &screen(), &Frame::identity(), &lights)
        .unwrap();
    assert_eq!(binds(&ctx), 1);

    // something outside bound its own program
    ctx.api_mut().use_program(None);
    ctx.invalidate_program();

    b.render(&mut ctx, &cache, &screen(), &Frame::identity(), &lights)
        .unwrap();
    assert_eq!(binds(&ctx), 3);
    assert_eq!(ctx.api().bound_program(), Some(cache.shader(b.shader().unwrap()).unwrap().id()));
}

#[test]
#[serial]
fn glsl_150_contexts_render() {
    init();
    let mut ctx = RenderContext::new(HeadlessApi::with_glsl_version(3, 30));
    let mut cache = AssetCache::new();

    let model = textured_model(&mut ctx, &mut cache, ModelKind::Flat, &["a", "b"]);
    model
        .render(&mut ctx, &cache, &screen(), &Frame::identity(), &LightSet::new())
        .unwrap();

    let program = cache.shader(model.shader().unwrap()).unwrap();
    assert_eq!(program.name(), "Flatn2d0d1");
    assert_eq!(ctx.api().count_calls(|c| matches!(c, GlCall::DrawIndexed { .. })), 1);
}
