//! Fixed-size slot storage for one chunk of the grid.

use std::collections::HashMap;

use glam::IVec2;

use crate::object::ObjectId;

/// Cell-to-object index for a single chunk. Each layer holds at most one
/// object per cell; layers are allocated lazily since most chunks only
/// ever use one or two.
#[derive(Debug, Clone)]
pub struct Chunk {
    size: IVec2,
    layers: HashMap<i32, Vec<Option<ObjectId>>>,
    generated: bool,
}

impl Chunk {
    pub fn new(size: IVec2) -> Self {
        Self {
            size,
            layers: HashMap::new(),
            generated: false,
        }
    }

    /// Whether the world generator has run for this chunk. Chunks that
    /// objects merely moved or loaded into stay ungenerated until a
    /// player comes near.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn mark_generated(&mut self) {
        self.generated = true;
    }

    fn index(&self, local: IVec2) -> usize {
        debug_assert!(local.x >= 0 && local.x < self.size.x);
        debug_assert!(local.y >= 0 && local.y < self.size.y);
        (local.y * self.size.x + local.x) as usize
    }

    pub fn get(&self, layer: i32, local: IVec2) -> Option<ObjectId> {
        let slots = self.layers.get(&layer)?;
        slots[self.index(local)]
    }

    pub fn set(&mut self, layer: i32, local: IVec2, id: ObjectId) {
        let area = (self.size.x * self.size.y) as usize;
        let index = self.index(local);
        let slots = self.layers.entry(layer).or_insert_with(|| vec![None; area]);
        slots[index] = Some(id);
    }

    pub fn clear(&mut self, layer: i32, local: IVec2) {
        let index = self.index(local);
        if let Some(slots) = self.layers.get_mut(&layer) {
            slots[index] = None;
        }
    }

    /// Ids present at a cell across all layers, bottom layer first.
    pub fn ids_at(&self, local: IVec2) -> Vec<ObjectId> {
        let index = self.index(local);
        let mut found: Vec<(i32, ObjectId)> = self
            .layers
            .iter()
            .filter_map(|(&layer, slots)| slots[index].map(|id| (layer, id)))
            .collect();
        found.sort_by_key(|&(layer, _)| layer);
        found.into_iter().map(|(_, id)| id).collect()
    }
}
