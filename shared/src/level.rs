//! Level container: the object table, the chunk index and the change log.
//!
//! A level is either authoritative (server side, runs `tick`) or a mirror
//! (client side, runs `update` for local prediction and otherwise applies
//! whatever the wire says). Both share the same storage and rules.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use glam::IVec2;
use log::{info, warn};

use crate::chunk::Chunk;
use crate::generation::{ChunkGenerator, NoopGenerator};
use crate::grid::{self, Bounds};
use crate::movement;
use crate::object::{LevelObject, ObjectId, ObjectKind, PlayerState};
use crate::protocol;
use crate::wire::{ByteReader, ByteWriter};

/// Chunks kept loaded around each player: 5 either side horizontally,
/// 3 vertically.
pub const PLAYER_CHUNK_RANGE: IVec2 = IVec2::new(5, 3);

/// Structural change to a level, drained by whoever owns the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelEvent {
    Added(ObjectId),
    Removed(ObjectId),
    Changed(ObjectId),
}

#[derive(Debug)]
pub struct Level {
    chunk_size: IVec2,
    is_client: bool,
    objects: HashMap<ObjectId, LevelObject>,
    chunks: HashMap<IVec2, Chunk>,
    events: Vec<LevelEvent>,
}

impl Level {
    pub fn new(chunk_size: IVec2, is_client: bool) -> Self {
        assert!(chunk_size.x > 0 && chunk_size.y > 0);
        Self {
            chunk_size,
            is_client,
            objects: HashMap::new(),
            chunks: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn chunk_size(&self) -> IVec2 {
        self.chunk_size
    }

    pub fn is_client(&self) -> bool {
        self.is_client
    }

    pub fn objects(&self) -> &HashMap<ObjectId, LevelObject> {
        &self.objects
    }

    pub fn get(&self, id: ObjectId) -> Option<&LevelObject> {
        self.objects.get(&id)
    }

    /// Mutable object access. Position must not be written through this;
    /// use `move_object` so the chunk index stays consistent.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut LevelObject> {
        self.objects.get_mut(&id)
    }

    /// Insert an object at its position. Bad inserts (duplicate id,
    /// occupied cell on the same layer) are logged and dropped rather
    /// than propagated, since they mostly come from the network.
    pub fn add(&mut self, object: LevelObject) {
        if self.objects.contains_key(&object.id) {
            warn!("Object {} already exists, ignoring add", object.id);
            return;
        }
        let chunk_size = self.chunk_size;
        let chunk_pos = grid::chunk_at(object.position, chunk_size);
        let local = grid::local_in_chunk(object.position, chunk_size);
        let layer = object.layer();
        let chunk = self
            .chunks
            .entry(chunk_pos)
            .or_insert_with(|| Chunk::new(chunk_size));
        if let Some(existing) = chunk.get(layer, local) {
            warn!(
                "Cell {} layer {} already holds {}, ignoring add of {}",
                object.position, layer, existing, object.id
            );
            return;
        }
        chunk.set(layer, local, object.id);
        let id = object.id;
        self.objects.insert(id, object);
        self.events.push(LevelEvent::Added(id));
    }

    /// Remove an object by id. Removing something that is not there is
    /// logged and ignored.
    pub fn remove(&mut self, id: ObjectId) -> Option<LevelObject> {
        let Some(object) = self.objects.remove(&id) else {
            warn!("Object {id} doesn't exist, ignoring remove");
            return None;
        };
        let chunk_pos = grid::chunk_at(object.position, self.chunk_size);
        let local = grid::local_in_chunk(object.position, self.chunk_size);
        if let Some(chunk) = self.chunks.get_mut(&chunk_pos) {
            if chunk.get(object.layer(), local) == Some(id) {
                chunk.clear(object.layer(), local);
            }
        }
        self.events.push(LevelEvent::Removed(id));
        Some(object)
    }

    /// Move an object to a new cell, keeping the chunk index in sync.
    /// Returns false and leaves everything untouched when the target
    /// cell is occupied on the object's layer.
    pub fn move_object(&mut self, id: ObjectId, to: IVec2) -> bool {
        let chunk_size = self.chunk_size;
        let Some(object) = self.objects.get(&id) else {
            warn!("Object {id} doesn't exist, ignoring move");
            return false;
        };
        let from = object.position;
        let layer = object.layer();
        if from == to {
            return true;
        }

        let to_chunk_pos = grid::chunk_at(to, chunk_size);
        let to_local = grid::local_in_chunk(to, chunk_size);
        let to_chunk = self
            .chunks
            .entry(to_chunk_pos)
            .or_insert_with(|| Chunk::new(chunk_size));
        if to_chunk.get(layer, to_local).is_some() {
            return false;
        }
        to_chunk.set(layer, to_local, id);

        let from_chunk_pos = grid::chunk_at(from, chunk_size);
        let from_local = grid::local_in_chunk(from, chunk_size);
        if let Some(from_chunk) = self.chunks.get_mut(&from_chunk_pos) {
            if from_chunk.get(layer, from_local) == Some(id) {
                from_chunk.clear(layer, from_local);
            }
        }

        if let Some(object) = self.objects.get_mut(&id) {
            object.position = to;
            object.dirty = true;
        }
        true
    }

    /// Apply several position updates at once by lifting every object
    /// out of the chunk index first and re-placing them after. Synced
    /// updates arrive in id order, not movement order, so objects that
    /// traded cells within one tick would block each other if the moves
    /// were applied one by one.
    pub fn relocate_many(&mut self, moves: &[(ObjectId, IVec2)]) {
        let chunk_size = self.chunk_size;
        for &(id, _) in moves {
            let Some(object) = self.objects.get(&id) else {
                continue;
            };
            let layer = object.layer();
            let chunk_pos = grid::chunk_at(object.position, chunk_size);
            let local = grid::local_in_chunk(object.position, chunk_size);
            if let Some(chunk) = self.chunks.get_mut(&chunk_pos) {
                if chunk.get(layer, local) == Some(id) {
                    chunk.clear(layer, local);
                }
            }
        }
        for &(id, to) in moves {
            let layer = match self.objects.get_mut(&id) {
                Some(object) => {
                    object.position = to;
                    object.dirty = true;
                    object.layer()
                }
                None => continue,
            };
            let chunk_pos = grid::chunk_at(to, chunk_size);
            let local = grid::local_in_chunk(to, chunk_size);
            let chunk = self
                .chunks
                .entry(chunk_pos)
                .or_insert_with(|| Chunk::new(chunk_size));
            match chunk.get(layer, local) {
                Some(existing) if existing != id => {
                    warn!("Objects {existing} and {id} overlap at {to} after a synced move");
                }
                _ => chunk.set(layer, local, id),
            }
        }
    }

    /// Record a change event for an object whose dirty flag is set, and
    /// clear the flag. Ticking sweeps this over every object; message
    /// application calls it per touched object.
    pub fn check_dirty(&mut self, id: ObjectId) {
        if let Some(object) = self.objects.get_mut(&id) {
            if object.dirty {
                object.dirty = false;
                self.events.push(LevelEvent::Changed(id));
            }
        }
    }

    pub fn object_id_at(&self, position: IVec2, layer: i32) -> Option<ObjectId> {
        let chunk_pos = grid::chunk_at(position, self.chunk_size);
        let local = grid::local_in_chunk(position, self.chunk_size);
        self.chunks.get(&chunk_pos)?.get(layer, local)
    }

    pub fn object_at(&self, position: IVec2, layer: i32) -> Option<&LevelObject> {
        self.objects.get(&self.object_id_at(position, layer)?)
    }

    pub fn has_object_at(&self, position: IVec2, layer: i32) -> bool {
        self.object_id_at(position, layer).is_some()
    }

    /// All objects at a cell, bottom layer first.
    pub fn objects_at(&self, position: IVec2) -> impl Iterator<Item = &LevelObject> + '_ {
        let chunk_pos = grid::chunk_at(position, self.chunk_size);
        let local = grid::local_in_chunk(position, self.chunk_size);
        let ids = match self.chunks.get(&chunk_pos) {
            Some(chunk) => chunk.ids_at(local),
            None => Vec::new(),
        };
        ids.into_iter().filter_map(move |id| self.objects.get(&id))
    }

    pub fn players(&self) -> impl Iterator<Item = (&LevelObject, &PlayerState)> {
        self.objects.values().filter_map(|object| match &object.kind {
            ObjectKind::Player(player) => Some((object, player)),
            _ => None,
        })
    }

    pub fn player_by_username(&self, username: &str) -> Option<(&LevelObject, &PlayerState)> {
        self.players().find(|(_, player)| player.username == username)
    }

    pub fn set_player_ping(&mut self, id: ObjectId, ping: f32) {
        if let Some(object) = self.objects.get_mut(&id) {
            if let ObjectKind::Player(player) = &mut object.kind {
                if player.ping != ping {
                    player.ping = ping;
                    object.dirty = true;
                }
            }
        }
    }

    pub fn set_player_intent(&mut self, id: ObjectId, intent: IVec2) {
        if let Some(object) = self.objects.get_mut(&id) {
            if let ObjectKind::Player(player) = &mut object.kind {
                player.move_intent = intent;
            }
        }
    }

    /// Ensure a chunk exists and has been through the generator. Chunks
    /// are marked generated before the generator runs, so generators can
    /// spill objects into neighbors without recursing.
    pub fn load_chunk_at(&mut self, chunk_pos: IVec2, generator: &mut dyn ChunkGenerator) {
        let chunk_size = self.chunk_size;
        {
            let chunk = self
                .chunks
                .entry(chunk_pos)
                .or_insert_with(|| Chunk::new(chunk_size));
            if chunk.is_generated() {
                return;
            }
            chunk.mark_generated();
        }
        generator.generate(self, grid::chunk_origin(chunk_pos, chunk_size));
    }

    /// Load the chunk neighborhood a player at `position` should have.
    pub fn load_chunks_around(&mut self, position: IVec2, generator: &mut dyn ChunkGenerator) {
        let center = grid::chunk_at(position, self.chunk_size);
        for y in -PLAYER_CHUNK_RANGE.y..=PLAYER_CHUNK_RANGE.y {
            for x in -PLAYER_CHUNK_RANGE.x..=PLAYER_CHUNK_RANGE.x {
                self.load_chunk_at(center + IVec2::new(x, y), generator);
            }
        }
    }

    /// Smallest cell range containing every object, or `None` when the
    /// level is empty.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut objects = self.objects.values();
        let mut bounds = Bounds::point(objects.next()?.position);
        for object in objects {
            bounds.include(object.position);
        }
        Some(bounds)
    }

    /// One authoritative simulation step: apply player intents, run the
    /// movement pass, keep player chunk neighborhoods loaded, then sweep
    /// dirty flags into change events. Does nothing on mirrors.
    pub fn tick(&mut self, generator: &mut dyn ChunkGenerator) {
        if self.is_client {
            return;
        }

        let mut movers: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|(_, object)| object.kind.stats().is_some())
            .map(|(&id, _)| id)
            .collect();
        movers.sort();

        for id in movers {
            let player_intent = match self.objects.get(&id) {
                Some(object) => match &object.kind {
                    ObjectKind::Player(player) => Some(player.move_intent),
                    _ => None,
                },
                // Broken or pushed out of existence earlier this tick.
                None => continue,
            };
            if let Some(intent) = player_intent {
                movement::add_movement_force(self, id, intent);
            }
            movement::tick_movable(self, generator, id);
            if let Some(object) = self.objects.get(&id) {
                if matches!(object.kind, ObjectKind::Player(_)) {
                    let position = object.position;
                    self.load_chunks_around(position, generator);
                }
            }
        }

        let mut all: Vec<ObjectId> = self.objects.keys().copied().collect();
        all.sort();
        for id in all {
            self.check_dirty(id);
        }
    }

    /// Client-side prediction step: run the movement pass for the local
    /// player only. Server deltas overwrite whatever this guesses.
    pub fn update(&mut self) {
        if !self.is_client {
            return;
        }
        let locals: Vec<(ObjectId, IVec2)> = self
            .objects
            .iter()
            .filter_map(|(&id, object)| match &object.kind {
                ObjectKind::Player(player) if player.connection.is_some() => {
                    Some((id, player.move_intent))
                }
                _ => None,
            })
            .collect();
        let mut generator = NoopGenerator;
        for (id, intent) in locals {
            movement::add_movement_force(self, id, intent);
            movement::tick_movable(self, &mut generator, id);
        }
    }

    pub fn take_events(&mut self) -> Vec<LevelEvent> {
        std::mem::take(&mut self.events)
    }

    /// Write every persistent object to a level file. Players belong to
    /// their connections and corrupted placeholders have no valid
    /// encoding, so both are left out.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let saved: Vec<&LevelObject> = self
            .objects
            .values()
            .filter(|object| {
                !matches!(object.kind, ObjectKind::Player(_) | ObjectKind::Corrupted)
            })
            .collect();
        let mut writer = ByteWriter::new();
        writer.write_i32(saved.len() as i32);
        for object in saved {
            protocol::encode_object(&mut writer, object);
        }
        fs::write(path, writer.into_bytes())?;
        info!("Saved level to {}", path.display());
        Ok(())
    }

    /// Read objects from a level file into this level. A corrupted entry
    /// means the rest of the file cannot be trusted, so loading stops
    /// there with a warning.
    pub fn load(&mut self, path: &Path) -> io::Result<()> {
        let bytes = fs::read(path)?;
        let mut reader = ByteReader::new(&bytes);
        let count = reader
            .read_i32()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        for index in 0..count {
            let object = protocol::decode_object(&mut reader);
            match object.kind {
                ObjectKind::Corrupted => {
                    warn!(
                        "Unreadable object in {} after {} of {} entries, ignoring the rest",
                        path.display(),
                        index,
                        count
                    );
                    break;
                }
                ObjectKind::Player(_) => continue,
                _ => {
                    let id = object.id;
                    self.add(object);
                    // Loaded state is clean; decoding marks objects dirty.
                    if let Some(loaded) = self.objects.get_mut(&id) {
                        loaded.dirty = false;
                    }
                }
            }
        }
        info!("Loaded level from {}", path.display());
        Ok(())
    }
}
