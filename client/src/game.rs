//! Client-side level mirror. Applies server messages to a local [`Level`]
//! copy, runs prediction for the local player between broadcasts, and
//! keeps a scrollback of chat lines.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use glam::IVec2;
use log::{info, warn};
use shared::protocol::{
    apply_dynamic_extra, decode_object, encode_object, read_dynamic, ChatMessage, ClientMessage,
    ServerMessage,
};
use shared::wire::{ByteReader, ByteWriter};
use shared::{Level, LevelObject, ObjectId, ObjectKind};

use crate::net::{Connection, NetEvent};

/// Chat lines kept before old ones are dropped.
const MESSAGE_LOG_LIMIT: usize = 100;

/// A partially applied snapshot. Objects are decoded a few per frame so
/// a large level does not stall the loop.
struct JoinPump {
    buf: Vec<u8>,
    pos: usize,
    remaining: u32,
}

pub struct GameClient {
    conn: Connection,
    username: String,
    level: Option<Level>,
    local_player: Option<ObjectId>,
    join: Option<JoinPump>,
    joined: bool,
    last_sent_intent: IVec2,
    /// Fallback cell for objects that fail to decode.
    last_object_position: IVec2,
    messages: VecDeque<String>,
    /// Lines ever pushed, unlike `messages.len()` which caps out.
    total_messages: u64,
    disconnected: Option<String>,
}

impl GameClient {
    pub fn new(conn: Connection, username: String) -> Self {
        GameClient {
            conn,
            username,
            level: None,
            local_player: None,
            join: None,
            joined: false,
            last_sent_intent: IVec2::ZERO,
            last_object_position: IVec2::ZERO,
            messages: VecDeque::new(),
            total_messages: 0,
            disconnected: None,
        }
    }

    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    pub fn local_player(&self) -> Option<ObjectId> {
        self.local_player
    }

    pub fn joined(&self) -> bool {
        self.joined
    }

    pub fn disconnected(&self) -> Option<&str> {
        self.disconnected.as_deref()
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }

    pub fn messages_total(&self) -> u64 {
        self.total_messages
    }

    pub fn player_names(&self) -> Vec<String> {
        match &self.level {
            Some(level) => {
                let mut names: Vec<String> = level
                    .players()
                    .map(|(_, player)| player.username.clone())
                    .collect();
                names.sort();
                names
            }
            None => Vec::new(),
        }
    }

    /// Drain pending network events, spending at most `budget` on
    /// decoding snapshot objects. At least one object is applied per
    /// call so a zero budget still makes progress.
    pub fn process_messages(&mut self, budget: Duration) {
        let deadline = Instant::now() + budget;
        if self.join.is_some() {
            self.pump_join(deadline);
            if self.join.is_some() {
                return;
            }
        }
        while let Some(event) = self.conn.try_recv() {
            match event {
                NetEvent::Message(message) => self.apply_message(message),
                NetEvent::Denied(reason) => {
                    self.disconnected = Some(format!("Denied: {reason}"));
                    return;
                }
                NetEvent::Disconnected(reason) => {
                    self.disconnected = Some(reason);
                    return;
                }
            }
            if self.join.is_some() {
                self.pump_join(deadline);
                if self.join.is_some() {
                    return;
                }
            }
        }
    }

    /// Advance the local mirror one frame. Prediction for the local
    /// player runs here; everything else waits for server deltas.
    pub fn update(&mut self) {
        if let Some(level) = &mut self.level {
            level.update();
            // The mirror has nobody to forward changes to.
            level.take_events();
        }
    }

    /// Update the movement intent, notifying the server only when it
    /// actually changed.
    pub fn set_move_intent(&mut self, direction: IVec2) {
        let direction = direction.clamp(IVec2::splat(-1), IVec2::splat(1));
        if let (Some(level), Some(id)) = (&mut self.level, self.local_player) {
            level.set_player_intent(id, direction);
        }
        if direction != self.last_sent_intent {
            self.last_sent_intent = direction;
            self.conn.send(&ClientMessage::PlayerMove { direction });
        }
    }

    pub fn place_object(&self, object: &LevelObject) {
        let mut writer = ByteWriter::new();
        if encode_object(&mut writer, object) {
            self.conn.send(&ClientMessage::AddObject {
                data: writer.into_bytes(),
            });
        }
    }

    /// Ask the server to remove the topmost object at `position`.
    /// Returns false when the mirror has nothing there.
    pub fn dig_at(&self, position: IVec2) -> bool {
        let Some(level) = &self.level else {
            return false;
        };
        match level.objects_at(position).last() {
            Some(object) => {
                self.conn.send(&ClientMessage::RemoveObject { id: object.id });
                true
            }
            None => false,
        }
    }

    pub fn send_chat(&self, text: &str) {
        self.conn.send(&ClientMessage::Chat {
            text: text.to_string(),
        });
    }

    pub fn disconnect(&self, reason: &str) {
        self.conn.disconnect(reason);
    }

    fn apply_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Joined {
                chunk_size,
                object_count,
                objects,
            } => {
                if self.level.is_some() {
                    warn!("Server sent a second snapshot, starting over");
                }
                self.level = Some(Level::new(chunk_size, true));
                self.local_player = None;
                self.joined = false;
                self.join = Some(JoinPump {
                    buf: objects,
                    pos: 0,
                    remaining: object_count,
                });
            }
            ServerMessage::ObjectsUpdated {
                added_count,
                added,
                removed,
                changed_count,
                changed,
            } => self.apply_update(added_count, &added, &removed, changed_count, &changed),
            ServerMessage::Chat(chat) => self.apply_chat(chat),
        }
    }

    fn pump_join(&mut self, deadline: Instant) {
        let Some(mut join) = self.join.take() else {
            return;
        };
        loop {
            if join.remaining == 0 {
                self.joined = true;
                info!("Joined, level has {} objects", self.object_count());
                return;
            }
            let mut reader = ByteReader::new(&join.buf[join.pos..]);
            let object = decode_object(&mut reader);
            join.pos += reader.position();
            join.remaining -= 1;
            self.apply_added(object);
            if Instant::now() >= deadline && join.remaining > 0 {
                self.join = Some(join);
                return;
            }
        }
    }

    fn object_count(&self) -> usize {
        self.level.as_ref().map_or(0, |level| level.objects().len())
    }

    fn apply_added(&mut self, mut object: LevelObject) {
        let Some(level) = &self.level else {
            return;
        };
        if level.get(object.id).is_some() {
            warn!("Server sent duplicate object {}, skipping", object.id);
            return;
        }
        if matches!(object.kind, ObjectKind::Corrupted) {
            object.position = self.last_object_position;
            warn!("Corrupted object {} placed at {}", object.id, object.position);
            self.push_line(format!("[SYSTEM] corrupted object at {}", object.position));
        } else {
            self.last_object_position = object.position;
        }
        if let ObjectKind::Player(player) = &mut object.kind {
            if player.username == self.username {
                // Marks the player as ours so prediction applies.
                player.connection = Some(0);
                self.local_player = Some(object.id);
                info!("Bound local player {}", object.id);
            }
        }
        object.dirty = false;
        let Some(level) = &mut self.level else {
            return;
        };
        level.add(object);
    }

    fn apply_update(
        &mut self,
        added_count: u32,
        added: &[u8],
        removed: &[ObjectId],
        changed_count: u32,
        changed: &[u8],
    ) {
        if self.level.is_none() {
            warn!("Update before snapshot, ignoring");
            return;
        }

        let mut reader = ByteReader::new(added);
        for _ in 0..added_count {
            let object = decode_object(&mut reader);
            let corrupted = matches!(object.kind, ObjectKind::Corrupted);
            self.apply_added(object);
            if corrupted {
                // Field boundaries are lost once one entry fails.
                warn!("Dropping the rest of the added batch after a corrupted entry");
                break;
            }
        }

        let Some(level) = self.level.as_mut() else {
            return;
        };
        for id in removed {
            if level.get(*id).is_none() {
                warn!("Server removed unknown object {id}");
                continue;
            }
            if Some(*id) == self.local_player {
                warn!("Local player was removed");
                self.local_player = None;
            }
            level.remove(*id);
        }

        let mut moves = Vec::new();
        let mut reader = ByteReader::new(changed);
        for _ in 0..changed_count {
            let id = match reader.read_uuid() {
                Ok(id) => id,
                Err(err) => {
                    warn!("Bad changed batch: {err}");
                    break;
                }
            };
            let Some(object) = level.get(id) else {
                warn!("Server changed unknown object {id}, dropping batch");
                break;
            };
            let kind = object.kind.clone();
            let old_position = object.position;
            match read_dynamic(&mut reader, &kind) {
                Ok(dynamic) => {
                    if let Some(object) = level.get_mut(id) {
                        apply_dynamic_extra(object, dynamic.extra);
                    }
                    if dynamic.position != old_position {
                        moves.push((id, dynamic.position));
                    }
                }
                Err(err) => {
                    warn!("Bad changed entry for {id}: {err}");
                    break;
                }
            }
        }
        level.relocate_many(&moves);
        level.take_events();
    }

    fn apply_chat(&mut self, chat: ChatMessage) {
        let name = match chat.from {
            Some(id) => {
                let sender = self.level.as_ref().and_then(|level| level.get(id));
                match sender.map(|object| &object.kind) {
                    Some(ObjectKind::Player(player)) => player.username.clone(),
                    _ => {
                        warn!("Chat from unknown sender {id}, dropping");
                        return;
                    }
                }
            }
            None => "SYSTEM".to_string(),
        };
        let line = format!("[{name}] {}", chat.text);
        info!("[CHAT] {line}");
        self.push_line(line);
    }

    fn push_line(&mut self, line: String) {
        if self.messages.len() >= MESSAGE_LOG_LIMIT {
            self.messages.pop_front();
        }
        self.messages.push_back(line);
        self.total_messages += 1;
    }
}
