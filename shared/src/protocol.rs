//! Wire protocol: object encoding, message envelopes and delta batches.
//!
//! Objects are packed as `[tag][id][static fields][dynamic fields]`.
//! Static fields only ever travel with a full object (snapshot or add);
//! dynamic fields are re-sent whenever the object changes. Envelopes
//! around those payloads go through bincode.

use glam::IVec2;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::level::{Level, LevelEvent};
use crate::object::{LevelObject, Movable, ObjectId, ObjectKind, PlayerState};
use crate::wire::{ByteReader, ByteWriter, WireError};

/// Hard cap on a single framed message, enough for a very large join
/// snapshot.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("unknown object tag {0}")]
    UnknownTag(i32),
    #[error("unknown frame type {0}")]
    UnknownFrame(u8),
}

/// Wire tag of every syncable object kind. Corrupted placeholders have
/// no tag; they exist only as a decode fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ObjectTag {
    Player = 0,
    Floor = 1,
    Wall = 2,
    Box = 3,
    Effect = 4,
    Ice = 5,
    Message = 6,
    Grass = 7,
    Bomb = 8,
    Light = 9,
    BrokenWall = 10,
    BrokenBox = 11,
}

impl ObjectTag {
    pub fn from_i32(value: i32) -> Option<ObjectTag> {
        Some(match value {
            0 => ObjectTag::Player,
            1 => ObjectTag::Floor,
            2 => ObjectTag::Wall,
            3 => ObjectTag::Box,
            4 => ObjectTag::Effect,
            5 => ObjectTag::Ice,
            6 => ObjectTag::Message,
            7 => ObjectTag::Grass,
            8 => ObjectTag::Bomb,
            9 => ObjectTag::Light,
            10 => ObjectTag::BrokenWall,
            11 => ObjectTag::BrokenBox,
            _ => return None,
        })
    }
}

pub fn tag_of(kind: &ObjectKind) -> Option<ObjectTag> {
    Some(match kind {
        ObjectKind::Player(_) => ObjectTag::Player,
        ObjectKind::Floor => ObjectTag::Floor,
        ObjectKind::Wall(_) => ObjectTag::Wall,
        ObjectKind::BoxBlock(_) => ObjectTag::Box,
        ObjectKind::Effect { .. } => ObjectTag::Effect,
        ObjectKind::Ice => ObjectTag::Ice,
        ObjectKind::Message => ObjectTag::Message,
        ObjectKind::Grass => ObjectTag::Grass,
        ObjectKind::Bomb => ObjectTag::Bomb,
        ObjectKind::Light { .. } => ObjectTag::Light,
        ObjectKind::BrokenWall(_) => ObjectTag::BrokenWall,
        ObjectKind::BrokenBox(_) => ObjectTag::BrokenBox,
        ObjectKind::Corrupted => return None,
    })
}

fn default_kind(tag: ObjectTag) -> ObjectKind {
    match tag {
        ObjectTag::Player => ObjectKind::Player(PlayerState::new("", "")),
        ObjectTag::Floor => ObjectKind::Floor,
        ObjectTag::Wall => ObjectKind::Wall(Movable::default()),
        ObjectTag::Box => ObjectKind::BoxBlock(Movable::default()),
        ObjectTag::Effect => ObjectKind::Effect {
            size: IVec2::ZERO,
            name: String::new(),
        },
        ObjectTag::Ice => ObjectKind::Ice,
        ObjectTag::Message => ObjectKind::Message,
        ObjectTag::Grass => ObjectKind::Grass,
        ObjectTag::Bomb => ObjectKind::Bomb,
        ObjectTag::Light => ObjectKind::Light { color: [0.0; 3] },
        ObjectTag::BrokenWall => ObjectKind::BrokenWall(Movable::default()),
        ObjectTag::BrokenBox => ObjectKind::BrokenBox(Movable::default()),
    }
}

fn write_static(writer: &mut ByteWriter, kind: &ObjectKind) {
    match kind {
        ObjectKind::Player(player) => {
            writer.write_vec2(player.movable.velocity);
            writer.write_vec2(player.movable.sub_position);
            writer.write_string(&player.username);
            writer.write_string(&player.display_name);
        }
        ObjectKind::Wall(movable)
        | ObjectKind::BoxBlock(movable)
        | ObjectKind::BrokenWall(movable)
        | ObjectKind::BrokenBox(movable) => {
            writer.write_vec2(movable.velocity);
            writer.write_vec2(movable.sub_position);
        }
        ObjectKind::Light { color } => {
            for component in color {
                writer.write_f32(*component);
            }
        }
        _ => {}
    }
}

fn read_static(reader: &mut ByteReader<'_>, kind: &mut ObjectKind) -> Result<(), WireError> {
    match kind {
        ObjectKind::Player(player) => {
            player.movable.velocity = reader.read_vec2()?;
            player.movable.sub_position = reader.read_vec2()?;
            player.username = reader.read_string()?;
            player.display_name = reader.read_string()?;
        }
        ObjectKind::Wall(movable)
        | ObjectKind::BoxBlock(movable)
        | ObjectKind::BrokenWall(movable)
        | ObjectKind::BrokenBox(movable) => {
            movable.velocity = reader.read_vec2()?;
            movable.sub_position = reader.read_vec2()?;
        }
        ObjectKind::Light { color } => {
            for component in color.iter_mut() {
                *component = reader.read_f32()?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Dynamic fields decoded against an object's kind.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicData {
    pub position: IVec2,
    pub extra: DynamicExtra,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DynamicExtra {
    None,
    Ping(f32),
    Effect { size: IVec2, name: String },
}

/// Write the fields `read_dynamic` expects, in the same order.
pub fn write_dynamic(writer: &mut ByteWriter, object: &LevelObject) {
    writer.write_ivec2(object.position);
    match &object.kind {
        ObjectKind::Player(player) => writer.write_f32(player.ping),
        ObjectKind::Effect { size, name } => {
            writer.write_ivec2(*size);
            writer.write_string(name);
        }
        _ => {}
    }
}

pub fn read_dynamic(
    reader: &mut ByteReader<'_>,
    kind: &ObjectKind,
) -> Result<DynamicData, WireError> {
    let position = reader.read_ivec2()?;
    let extra = match kind {
        ObjectKind::Player(_) => DynamicExtra::Ping(reader.read_f32()?),
        ObjectKind::Effect { .. } => DynamicExtra::Effect {
            size: reader.read_ivec2()?,
            name: reader.read_string()?,
        },
        _ => DynamicExtra::None,
    };
    Ok(DynamicData { position, extra })
}

/// Apply decoded dynamic fields other than position, which has to go
/// through the level. Marks the object dirty either way.
pub fn apply_dynamic_extra(object: &mut LevelObject, extra: DynamicExtra) {
    match (&mut object.kind, extra) {
        (ObjectKind::Player(player), DynamicExtra::Ping(ping)) => player.ping = ping,
        (
            ObjectKind::Effect { size, name },
            DynamicExtra::Effect {
                size: new_size,
                name: new_name,
            },
        ) => {
            *size = new_size;
            *name = new_name;
        }
        _ => {}
    }
    object.dirty = true;
}

/// Append an object's full wire form. Corrupted placeholders have no
/// valid encoding and are skipped; returns whether anything was written.
pub fn encode_object(writer: &mut ByteWriter, object: &LevelObject) -> bool {
    let Some(tag) = tag_of(&object.kind) else {
        warn!("Refusing to encode corrupted object {}", object.id);
        return false;
    };
    writer.write_i32(tag as i32);
    writer.write_uuid(object.id);
    write_static(writer, &object.kind);
    write_dynamic(writer, object);
    true
}

/// Decode an object, falling back to a corrupted placeholder that keeps
/// the id (when the id itself was readable) instead of failing. After a
/// corrupted read the reader is out of sync and the rest of the buffer
/// cannot be trusted.
pub fn decode_object(reader: &mut ByteReader<'_>) -> LevelObject {
    let mut id = None;
    match try_decode_object(reader, &mut id) {
        Ok(object) => object,
        Err(err) => {
            let id = id.unwrap_or_else(Uuid::new_v4);
            warn!("Received corrupted object {id}: {err}");
            LevelObject::with_id(id, IVec2::ZERO, ObjectKind::Corrupted)
        }
    }
}

fn try_decode_object(
    reader: &mut ByteReader<'_>,
    id_out: &mut Option<ObjectId>,
) -> Result<LevelObject, ProtocolError> {
    let raw_tag = reader.read_i32()?;
    let id = reader.read_uuid()?;
    *id_out = Some(id);
    let tag = ObjectTag::from_i32(raw_tag).ok_or(ProtocolError::UnknownTag(raw_tag))?;
    let mut kind = default_kind(tag);
    read_static(reader, &mut kind)?;
    let data = read_dynamic(reader, &kind)?;
    let mut object = LevelObject::with_id(id, data.position, kind);
    apply_dynamic_extra(&mut object, data.extra);
    Ok(object)
}

/// Everything the server says after the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Full level snapshot, sent once on join before the player object
    /// is created. `objects` holds `object_count` wire-encoded objects
    /// back to back.
    Joined {
        chunk_size: IVec2,
        object_count: u32,
        objects: Vec<u8>,
    },
    /// Net level changes since the last tick. `added` and `changed` are
    /// packed object payloads; `changed` entries are `[id][dynamic]`.
    ObjectsUpdated {
        added_count: u32,
        added: Vec<u8>,
        removed: Vec<ObjectId>,
        changed_count: u32,
        changed: Vec<u8>,
    },
    Chat(ChatMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Fully encoded object to insert into the level.
    AddObject { data: Vec<u8> },
    RemoveObject { id: ObjectId },
    /// Movement input, one step per axis.
    PlayerMove { direction: IVec2 },
    Chat { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sending player object, or `None` for system messages.
    pub from: Option<ObjectId>,
    pub timestamp_ms: u64,
    pub text: String,
}

/// Snapshot of every encodable object in the level.
pub fn build_joined(level: &Level) -> ServerMessage {
    let mut writer = ByteWriter::new();
    let mut count = 0u32;
    for object in level.objects().values() {
        if encode_object(&mut writer, object) {
            count += 1;
        }
    }
    ServerMessage::Joined {
        chunk_size: level.chunk_size(),
        object_count: count,
        objects: writer.into_bytes(),
    }
}

/// Accumulates level events between flushes and coalesces them so one
/// message carries the net effect of a tick.
#[derive(Debug, Default)]
pub struct DeltaBatch {
    added: Vec<ObjectId>,
    removed: Vec<ObjectId>,
    changed: Vec<ObjectId>,
}

impl DeltaBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn record(&mut self, event: LevelEvent) {
        match event {
            LevelEvent::Added(id) => {
                if !self.added.contains(&id) {
                    self.added.push(id);
                }
            }
            LevelEvent::Removed(id) => {
                if let Some(index) = self.added.iter().position(|&added| added == id) {
                    // Added and removed within one batch cancel out.
                    self.added.remove(index);
                    self.changed.retain(|&changed| changed != id);
                    return;
                }
                self.changed.retain(|&changed| changed != id);
                if !self.removed.contains(&id) {
                    self.removed.push(id);
                }
            }
            LevelEvent::Changed(id) => {
                // A pending add already carries the latest state, and a
                // pending remove makes the change moot.
                if self.added.contains(&id) || self.removed.contains(&id) {
                    return;
                }
                if !self.changed.contains(&id) {
                    self.changed.push(id);
                }
            }
        }
    }

    /// Encode and clear the batch, or `None` when nothing happened.
    /// State is read from the level at flush time, so the message holds
    /// each object's latest form no matter how often it changed.
    pub fn flush(&mut self, level: &Level) -> Option<ServerMessage> {
        if self.is_empty() {
            return None;
        }

        let mut added_writer = ByteWriter::new();
        let mut added_count = 0u32;
        for id in self.added.drain(..) {
            match level.get(id) {
                Some(object) => {
                    if encode_object(&mut added_writer, object) {
                        added_count += 1;
                    }
                }
                None => warn!("Added object {id} vanished before flush"),
            }
        }

        let removed = std::mem::take(&mut self.removed);

        let mut changed_writer = ByteWriter::new();
        let mut changed_count = 0u32;
        for id in self.changed.drain(..) {
            match level.get(id) {
                Some(object) => {
                    changed_writer.write_uuid(id);
                    write_dynamic(&mut changed_writer, object);
                    changed_count += 1;
                }
                None => warn!("Changed object {id} vanished before flush"),
            }
        }

        Some(ServerMessage::ObjectsUpdated {
            added_count,
            added: added_writer.into_bytes(),
            removed,
            changed_count,
            changed: changed_writer.into_bytes(),
        })
    }
}

/// Lowest-level envelope on the stream. `Data` frames carry a bincode
/// message; the rest manage the connection itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(Vec<u8>),
    Ping(u64),
    Pong(u64),
    /// Join refusal, sent instead of a snapshot.
    Deny(String),
    Disconnect(String),
}

impl Frame {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        match self {
            Frame::Data(payload) => {
                writer.write_u8(0);
                writer.write_bytes(payload);
            }
            Frame::Ping(timestamp) => {
                writer.write_u8(1);
                writer.write_u64(*timestamp);
            }
            Frame::Pong(timestamp) => {
                writer.write_u8(2);
                writer.write_u64(*timestamp);
            }
            Frame::Deny(reason) => {
                writer.write_u8(3);
                writer.write_string(reason);
            }
            Frame::Disconnect(reason) => {
                writer.write_u8(4);
                writer.write_string(reason);
            }
        }
        writer.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Frame, ProtocolError> {
        let mut reader = ByteReader::new(bytes);
        Ok(match reader.read_u8()? {
            0 => Frame::Data(reader.read_rest().to_vec()),
            1 => Frame::Ping(reader.read_u64()?),
            2 => Frame::Pong(reader.read_u64()?),
            3 => Frame::Deny(reader.read_string()?),
            4 => Frame::Disconnect(reader.read_string()?),
            other => return Err(ProtocolError::UnknownFrame(other)),
        })
    }
}

/// First data frame a client sends: who is joining.
pub fn encode_join_request(username: &str, display_name: &str) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    writer.write_string(username);
    writer.write_string(display_name);
    writer.into_bytes()
}

pub fn decode_join_request(bytes: &[u8]) -> Result<(String, String), WireError> {
    let mut reader = ByteReader::new(bytes);
    let username = reader.read_string()?;
    let display_name = reader.read_string()?;
    Ok((username, display_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use glam::Vec2;

    fn round_trip(object: &LevelObject) -> LevelObject {
        let mut writer = ByteWriter::new();
        assert!(encode_object(&mut writer, object));
        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        let decoded = decode_object(&mut reader);
        assert_eq!(reader.remaining(), 0);
        decoded
    }

    #[test]
    fn test_player_round_trip() {
        let mut player = PlayerState::new("alice", "Alice");
        player.ping = 0.042;
        player.movable.velocity = Vec2::new(0.5, -0.25);
        player.movable.sub_position = Vec2::new(0.1, 0.9);
        let object = LevelObject::new(IVec2::new(-7, 12), ObjectKind::Player(player));

        let decoded = round_trip(&object);
        assert_eq!(decoded.id, object.id);
        assert_eq!(decoded.position, object.position);
        match decoded.kind {
            ObjectKind::Player(decoded_player) => {
                assert_eq!(decoded_player.username, "alice");
                assert_eq!(decoded_player.display_name, "Alice");
                assert_approx_eq!(decoded_player.ping, 0.042);
                assert_eq!(decoded_player.movable.velocity, Vec2::new(0.5, -0.25));
                assert_eq!(decoded_player.movable.sub_position, Vec2::new(0.1, 0.9));
                assert_eq!(decoded_player.connection, None);
            }
            other => panic!("expected player, got {other:?}"),
        }
    }

    #[test]
    fn test_movable_and_plain_round_trips() {
        let box_object = LevelObject::new(
            IVec2::new(3, 4),
            ObjectKind::BoxBlock(Movable {
                velocity: Vec2::new(1.0, 0.0),
                sub_position: Vec2::new(-0.5, 0.0),
            }),
        );
        let decoded = round_trip(&box_object);
        assert_eq!(decoded.kind, box_object.kind);

        let floor = LevelObject::new(IVec2::new(0, -9), ObjectKind::Floor);
        assert_eq!(round_trip(&floor).kind, ObjectKind::Floor);
    }

    #[test]
    fn test_effect_and_light_round_trips() {
        let effect = LevelObject::new(
            IVec2::ZERO,
            ObjectKind::Effect {
                size: IVec2::new(3, 2),
                name: "rain".to_string(),
            },
        );
        assert_eq!(round_trip(&effect).kind, effect.kind);

        let light = LevelObject::new(
            IVec2::ZERO,
            ObjectKind::Light {
                color: [1.0, 0.5, 0.25],
            },
        );
        assert_eq!(round_trip(&light).kind, light.kind);
    }

    #[test]
    fn test_unknown_tag_decodes_as_corrupted_with_id() {
        let id = Uuid::new_v4();
        let mut writer = ByteWriter::new();
        writer.write_i32(999);
        writer.write_uuid(id);
        let bytes = writer.into_bytes();

        let decoded = decode_object(&mut ByteReader::new(&bytes));
        assert_eq!(decoded.kind, ObjectKind::Corrupted);
        assert_eq!(decoded.id, id);
    }

    #[test]
    fn test_truncated_buffer_decodes_as_corrupted() {
        let mut writer = ByteWriter::new();
        writer.write_i32(0);
        let bytes = writer.into_bytes();

        let decoded = decode_object(&mut ByteReader::new(&bytes));
        assert_eq!(decoded.kind, ObjectKind::Corrupted);
    }

    #[test]
    fn test_corrupted_objects_are_never_encoded() {
        let mut writer = ByteWriter::new();
        let corrupted = LevelObject::new(IVec2::ZERO, ObjectKind::Corrupted);
        assert!(!encode_object(&mut writer, &corrupted));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_snapshot_objects_decode_back_to_back() {
        let mut level = Level::new(IVec2::new(16, 16), false);
        level.add(LevelObject::new(IVec2::ZERO, ObjectKind::Floor));
        level.add(LevelObject::new(
            IVec2::new(1, 0),
            ObjectKind::Wall(Movable::default()),
        ));
        level.add(LevelObject::new(IVec2::new(2, 0), ObjectKind::Corrupted));

        let message = build_joined(&level);
        let ServerMessage::Joined {
            chunk_size,
            object_count,
            objects,
        } = message
        else {
            panic!("expected joined message");
        };
        assert_eq!(chunk_size, IVec2::new(16, 16));
        assert_eq!(object_count, 2);

        let mut reader = ByteReader::new(&objects);
        for _ in 0..object_count {
            let decoded = decode_object(&mut reader);
            assert_ne!(decoded.kind, ObjectKind::Corrupted);
        }
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_batch_add_then_change_sends_one_add() {
        let mut level = Level::new(IVec2::new(16, 16), false);
        let object = LevelObject::new(IVec2::ZERO, ObjectKind::Floor);
        let id = object.id;
        level.add(object);

        let mut batch = DeltaBatch::new();
        batch.record(LevelEvent::Added(id));
        batch.record(LevelEvent::Changed(id));

        match batch.flush(&level).unwrap() {
            ServerMessage::ObjectsUpdated {
                added_count,
                removed,
                changed_count,
                ..
            } => {
                assert_eq!(added_count, 1);
                assert!(removed.is_empty());
                assert_eq!(changed_count, 0);
            }
            other => panic!("expected update, got {other:?}"),
        }
        assert!(batch.is_empty());
    }

    #[test]
    fn test_batch_add_then_remove_cancels_out() {
        let level = Level::new(IVec2::new(16, 16), false);
        let id = Uuid::new_v4();

        let mut batch = DeltaBatch::new();
        batch.record(LevelEvent::Added(id));
        batch.record(LevelEvent::Changed(id));
        batch.record(LevelEvent::Removed(id));

        assert!(batch.flush(&level).is_none());
    }

    #[test]
    fn test_batch_change_then_remove_sends_remove_only() {
        let level = Level::new(IVec2::new(16, 16), false);
        let id = Uuid::new_v4();

        let mut batch = DeltaBatch::new();
        batch.record(LevelEvent::Changed(id));
        batch.record(LevelEvent::Removed(id));

        match batch.flush(&level).unwrap() {
            ServerMessage::ObjectsUpdated {
                added_count,
                removed,
                changed_count,
                ..
            } => {
                assert_eq!(added_count, 0);
                assert_eq!(removed, vec![id]);
                assert_eq!(changed_count, 0);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_deduplicates_changes() {
        let mut level = Level::new(IVec2::new(16, 16), false);
        let object = LevelObject::new(IVec2::ZERO, ObjectKind::Floor);
        let id = object.id;
        level.add(object);

        let mut batch = DeltaBatch::new();
        batch.record(LevelEvent::Changed(id));
        batch.record(LevelEvent::Changed(id));

        match batch.flush(&level).unwrap() {
            ServerMessage::ObjectsUpdated { changed_count, .. } => assert_eq!(changed_count, 1),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_skips_vanished_objects() {
        let level = Level::new(IVec2::new(16, 16), false);

        let mut batch = DeltaBatch::new();
        batch.record(LevelEvent::Added(Uuid::new_v4()));
        batch.record(LevelEvent::Changed(Uuid::new_v4()));

        match batch.flush(&level).unwrap() {
            ServerMessage::ObjectsUpdated {
                added_count,
                added,
                changed_count,
                ..
            } => {
                assert_eq!(added_count, 0);
                assert!(added.is_empty());
                assert_eq!(changed_count, 0);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_frame_round_trips() {
        let frames = [
            Frame::Data(vec![1, 2, 3]),
            Frame::Ping(42),
            Frame::Pong(42),
            Frame::Deny("Empty username".to_string()),
            Frame::Disconnect("Server closed".to_string()),
        ];
        for frame in frames {
            let bytes = frame.encode();
            assert_eq!(Frame::decode(&bytes).unwrap(), frame);
        }
    }

    #[test]
    fn test_unknown_frame_type_rejected() {
        assert!(matches!(
            Frame::decode(&[9, 0, 0]),
            Err(ProtocolError::UnknownFrame(9))
        ));
    }

    #[test]
    fn test_join_request_round_trip() {
        let bytes = encode_join_request("alice", "Alice the Brave");
        let (username, display_name) = decode_join_request(&bytes).unwrap();
        assert_eq!(username, "alice");
        assert_eq!(display_name, "Alice the Brave");
    }

    #[test]
    fn test_chat_message_bincode_round_trip() {
        let message = ServerMessage::Chat(ChatMessage {
            from: Some(Uuid::new_v4()),
            timestamp_ms: 1234,
            text: "hello world".to_string(),
        });
        let bytes = bincode::serialize(&message).unwrap();
        let decoded: ServerMessage = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, message);
    }
}
