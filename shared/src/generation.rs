//! World generation hooks.

use glam::IVec2;

use crate::level::Level;
use crate::object::{LevelObject, ObjectKind};

/// Fills freshly loaded chunks with terrain.
///
/// The level marks a chunk generated before calling in, so a generator
/// may add objects that spill into neighboring chunks without recursing.
/// It must only touch the level through `add` and the read-only lookups.
pub trait ChunkGenerator {
    fn generate(&mut self, level: &mut Level, start: IVec2);
}

/// Endless flat ground, one floor tile per cell.
#[derive(Debug, Default)]
pub struct FlatGenerator;

impl ChunkGenerator for FlatGenerator {
    fn generate(&mut self, level: &mut Level, start: IVec2) {
        let size = level.chunk_size();
        let floor_layer = ObjectKind::Floor.layer();
        for y in 0..size.y {
            for x in 0..size.x {
                let position = start + IVec2::new(x, y);
                // Cells already holding terrain from a loaded level file
                // keep what they have.
                if level.has_object_at(position, floor_layer) {
                    continue;
                }
                level.add(LevelObject::new(position, ObjectKind::Floor));
            }
        }
    }
}

/// Generator that adds nothing. Mirrors use it, since their content
/// arrives over the wire.
#[derive(Debug, Default)]
pub struct NoopGenerator;

impl ChunkGenerator for NoopGenerator {
    fn generate(&mut self, _level: &mut Level, _start: IVec2) {}
}
