use image::{Rgba, RgbaImage};
use kitgl::assets::{ModelData, ModelFileError, ModelTexture, TextureKey};
use kitgl::core::{Vertex, VertexFormat};
use kitgl::rendering::backend::HeadlessApi;
use kitgl::rendering::{
    AssetCache, MaterialConstants, MaterialModel, ModelError, ModelKind, Primitive, RenderContext, TextureSemantic,
};
use nalgebra::{Vector2, Vector3, Vector4};
use serial_test::serial;
use std::path::Path;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sample(texture: &Path) -> ModelData {
    let format = VertexFormat::new(true, true, true, 1);
    let vertices: Vec<Vertex> = (0..4)
        .map(|i| {
            let f = i as f32;
            Vertex::new(Vector3::new(f, f * 2.0, f * 3.0))
                .with_normal(Vector3::y())
                .with_tangent(Vector3::x())
                .with_color(Vector4::new(0.25, 0.5, 0.75, 1.0))
                .with_uv(Vector2::new(f, 1.0 - f))
        })
        .collect();

    ModelData {
        material: MaterialConstants::builder()
            .emit(Vector3::new(0.5, 0.0, 0.0))
            .diffuse(Vector4::new(0.2, 0.4, 0.6, 0.8))
            .specular_level(16)
            .specular_strength(0.75)
            .build(),
        textures: vec![
            ModelTexture {
                filename: texture.to_string_lossy().into_owned(),
                semantic: TextureSemantic::Diffuse,
                uv_index: 0,
            },
            ModelTexture {
                filename: texture.to_string_lossy().into_owned(),
                semantic: TextureSemantic::Other("gloss".to_string()),
                uv_index: 0,
            },
        ],
        format,
        vertices: format.pack(&vertices),
        primitive: Primitive::Lines,
        indices: vec![0, 1, 1, 2, 2, 3],
    }
}

fn write_texture(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("checker.png");
    RgbaImage::from_fn(4, 4, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    })
    .save(&path)
    .unwrap();
    path
}

#[test]
#[serial]
fn saved_file_reads_back_identically() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let data = sample(Path::new("textures/checker.png"));

    let path = dir.path().join("sample.model");
    data.save(&path).unwrap();

    assert_eq!(ModelData::open(&path).unwrap(), data);
}

#[test]
#[serial]
fn model_loads_from_file_and_converts_back() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let texture = write_texture(dir.path());
    let data = sample(&texture);

    let path = dir.path().join("sample.model");
    data.save(&path).unwrap();

    let mut ctx = RenderContext::new(HeadlessApi::new());
    let mut cache = AssetCache::new();
    let mut model = MaterialModel::load(ModelKind::Scene, &mut ctx, &mut cache, &path).unwrap();

    assert_eq!(model.texture_count(), 2);
    assert_eq!(model.texture(1).unwrap().semantic.as_str(), "gloss");
    assert_eq!(model.texture_image(&cache, 0).unwrap(), &TextureKey::File(texture.clone()));
    assert!(matches!(
        model.texture_image(&cache, 2),
        Err(ModelError::TextureIndex { index: 2, len: 2 })
    ));
    // both bindings point at the same cached texture
    assert_eq!(cache.textures.len(), 1);
    assert_eq!(model.vertex_buffer().vertex_count(), 4);

    model.commit(&mut ctx, &mut cache).unwrap();
    assert_eq!(
        cache.shader(model.shader().unwrap()).unwrap().name(),
        "Modelntc1d0x5:gloss0"
    );

    assert_eq!(model.to_data(&cache).unwrap(), data);
}

#[test]
#[serial]
fn missing_texture_fails_the_load() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let data = sample(&dir.path().join("missing.png"));
    let path = dir.path().join("sample.model");
    data.save(&path).unwrap();

    let mut ctx = RenderContext::new(HeadlessApi::new());
    let mut cache = AssetCache::new();
    let err = MaterialModel::load(ModelKind::Scene, &mut ctx, &mut cache, &path).unwrap_err();

    assert!(matches!(err, ModelError::Texture { .. }), "{err}");
    assert!(cache.textures.is_empty());
}

#[test]
#[serial]
fn missing_file_is_reported_with_its_path() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.model");

    let err = ModelData::open(&path).unwrap_err();
    assert!(matches!(err, ModelFileError::File { .. }));
    assert!(err.to_string().contains("nope.model"));
}
