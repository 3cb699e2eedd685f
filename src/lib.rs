//! A small OpenGL rendering core.
//!
//! Models describe their vertex layout, textures and material constants;
//! the matching shader is generated, compiled once per configuration and
//! shared through a content keyed cache. A [`DrawOrderIndex`](rendering::DrawOrderIndex)
//! keeps models grouped by shader and textures to minimize state changes.
//!
//! ```no_run
//! use kitgl::core::{Camera, Frame, VertexFormat};
//! use kitgl::rendering::backend::HeadlessApi;
//! use kitgl::rendering::{AssetCache, DrawOrderIndex, LightSet, MaterialModel, ModelKind, RenderContext};
//!
//! let mut ctx = RenderContext::new(HeadlessApi::new());
//! let mut cache = AssetCache::new();
//! let mut models = DrawOrderIndex::new();
//!
//! let mut model = MaterialModel::new(ModelKind::Scene);
//! model.set_vertex_format(VertexFormat::new(true, false, false, 1));
//! models.insert(model, Frame::identity());
//!
//! models.commit_all(&mut ctx, &mut cache).unwrap();
//! models.resort();
//! models
//!     .render_all(&mut ctx, &cache, &Camera::default(), &LightSet::new())
//!     .unwrap();
//! ```

pub mod engine;
pub mod utils;

pub use engine::*;

pub use ::log;
