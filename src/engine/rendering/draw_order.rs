use crate::engine::core::{CameraView, Frame};
use crate::engine::rendering::backend::GraphicsApi;
use crate::engine::rendering::cache::AssetCache;
use crate::engine::rendering::context::RenderContext;
use crate::engine::rendering::lights::LightSet;
use crate::engine::rendering::model::{MaterialModel, ModelError, SortKey};
use log::{debug, trace};
use slotmap::{SecondaryMap, SlotMap, new_key_type};
use std::collections::BTreeSet;

new_key_type! {
    /// Identifies a model inside a [`DrawOrderIndex`].
    pub struct ModelId;
}

struct Entry {
    model: MaterialModel,
    frame: Frame,
}

/// Models kept in an order that groups equal shaders and textures, so a frame
/// switches programs and texture bindings as rarely as possible.
///
/// The position of a model is taken from its [`SortKey`] when it is inserted
/// or resorted. A model whose key changes keeps its old position until
/// [`DrawOrderIndex::resort`] runs.
#[derive(Default)]
pub struct DrawOrderIndex {
    entries: SlotMap<ModelId, Entry>,
    order: BTreeSet<(SortKey, ModelId)>,
    placed: SecondaryMap<ModelId, SortKey>,
}

impl DrawOrderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut model: MaterialModel, frame: Frame) -> ModelId {
        model.resorting_done();
        let key = model.sort_key();
        let id = self.entries.insert(Entry { model, frame });
        self.place(id, key);
        id
    }

    pub fn remove(&mut self, id: ModelId) -> Option<(MaterialModel, Frame)> {
        let entry = self.entries.remove(id)?;
        if let Some(key) = self.placed.remove(id) {
            self.order.remove(&(key, id));
        }
        Some((entry.model, entry.frame))
    }

    pub fn get(&self, id: ModelId) -> Option<&MaterialModel> {
        self.entries.get(id).map(|entry| &entry.model)
    }

    /// Mutable access to a model. Changes to its sort key take effect at the
    /// next [`DrawOrderIndex::resort`].
    pub fn get_mut(&mut self, id: ModelId) -> Option<&mut MaterialModel> {
        self.entries.get_mut(id).map(|entry| &mut entry.model)
    }

    pub fn frame(&self, id: ModelId) -> Option<&Frame> {
        self.entries.get(id).map(|entry| &entry.frame)
    }

    pub fn frame_mut(&mut self, id: ModelId) -> Option<&mut Frame> {
        self.entries.get_mut(id).map(|entry| &mut entry.frame)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Models in draw order.
    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &MaterialModel)> {
        self.order.iter().map(|(_, id)| (*id, &self.entries[*id].model))
    }

    /// Commits every model. Stops at the first failure.
    pub fn commit_all<A: GraphicsApi>(
        &mut self,
        ctx: &mut RenderContext<A>,
        cache: &mut AssetCache,
    ) -> Result<(), ModelError> {
        for entry in self.entries.values_mut() {
            entry.model.commit(ctx, cache)?;
        }
        Ok(())
    }

    /// Moves every model flagged for resorting to the position of its current
    /// sort key and clears its flag. Returns how many models were moved.
    pub fn resort(&mut self) -> usize {
        let dirty: Vec<ModelId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.model.needs_resorting())
            .map(|(id, _)| id)
            .collect();

        // pull everything out first, reinserting while stale keys are still
        // in the set would compare against outdated neighbours
        for id in &dirty {
            if let Some(key) = self.placed.remove(*id) {
                self.order.remove(&(key, *id));
            }
        }

        for id in &dirty {
            let entry = &mut self.entries[*id];
            let key = entry.model.sort_key();
            entry.model.resorting_done();
            self.place(*id, key);
        }

        if !dirty.is_empty() {
            debug!("[Draw Order] Resorted {} of {} models", dirty.len(), self.entries.len());
        }

        dirty.len()
    }

    /// Renders every model in draw order. Stops at the first failure.
    pub fn render_all<A: GraphicsApi>(
        &self,
        ctx: &mut RenderContext<A>,
        cache: &AssetCache,
        camera: &impl CameraView,
        lights: &LightSet,
    ) -> Result<(), ModelError> {
        for (_, id) in &self.order {
            let entry = &self.entries[*id];
            entry.model.render(ctx, cache, camera, &entry.frame, lights)?;
        }
        Ok(())
    }

    fn place(&mut self, id: ModelId, key: SortKey) {
        trace!("[Draw Order] Placing {id:?} at {key:?}");
        self.order.insert((key.clone(), id));
        self.placed.insert(id, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::VertexFormat;
    use crate::engine::rendering::backend::HeadlessApi;
    use crate::engine::rendering::material::{ModelKind, TextureSemantic};
    use image::RgbaImage;

    fn model(format: VertexFormat) -> MaterialModel {
        let mut model = MaterialModel::new(ModelKind::Scene);
        model.set_vertex_format(format);
        model
    }

    fn keys_in_order(index: &DrawOrderIndex) -> Vec<SortKey> {
        index.iter().map(|(_, model)| model.sort_key()).collect()
    }

    #[test]
    fn insert_and_remove() {
        let mut index = DrawOrderIndex::new();
        let a = index.insert(model(VertexFormat::POSITION), Frame::identity());
        let b = index.insert(model(VertexFormat::POSITION), Frame::identity());
        assert_eq!(index.len(), 2);

        let (removed, _) = index.remove(a).unwrap();
        assert_eq!(removed.kind(), ModelKind::Scene);
        assert!(index.get(a).is_none());
        assert!(index.remove(a).is_none());
        assert_eq!(index.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn resort_clears_flags_and_restores_order() {
        let mut ctx = RenderContext::new(HeadlessApi::new());
        let mut cache = AssetCache::new();
        let mut index = DrawOrderIndex::new();

        let formats = [
            VertexFormat::new(true, false, false, 1),
            VertexFormat::POSITION,
            VertexFormat::new(true, false, false, 1),
            VertexFormat::new(false, false, true, 0),
        ];
        let ids: Vec<ModelId> = formats
            .iter()
            .map(|format| index.insert(model(*format), Frame::identity()))
            .collect();

        index.commit_all(&mut ctx, &mut cache).unwrap();
        assert_eq!(index.resort(), 4);
        assert!(index.iter().all(|(_, model)| !model.needs_resorting()));

        let texture = cache
            .load_texture_image(ctx.api_mut(), "t", &RgbaImage::new(1, 1))
            .unwrap();
        index
            .get_mut(ids[2])
            .unwrap()
            .add_texture(texture, TextureSemantic::Diffuse, 0);
        index.commit_all(&mut ctx, &mut cache).unwrap();

        assert_eq!(index.resort(), 1);
        assert_eq!(index.resort(), 0);

        let keys = keys_in_order(&index);
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn render_all_visits_every_model() {
        use crate::engine::core::ScreenCamera;
        use crate::engine::rendering::backend::GlCall;
        use crate::engine::rendering::vertex_buffer::Primitive;

        let mut ctx = RenderContext::new(HeadlessApi::new());
        let mut cache = AssetCache::new();
        let mut index = DrawOrderIndex::new();

        for _ in 0..3 {
            let mut m = model(VertexFormat::POSITION);
            m.set_vertices(vec![0u8; 36]);
            m.set_indices(Primitive::Triangles, vec![0, 1, 2]);
            index.insert(m, Frame::identity());
        }
        index.commit_all(&mut ctx, &mut cache).unwrap();
        index.resort();

        index
            .render_all(&mut ctx, &cache, &ScreenCamera::new(100.0, 100.0), &LightSet::new())
            .unwrap();

        let api = ctx.api();
        assert_eq!(api.count_calls(|c| matches!(c, GlCall::DrawIndexed { .. })), 3);
        // all three share one program
        assert_eq!(api.count_calls(|c| matches!(c, GlCall::UseProgram(Some(_)))), 1);
    }
}
