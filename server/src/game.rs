//! Authoritative game state: owns the level, admits players and turns
//! level events into broadcast deltas.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use glam::IVec2;
use log::{debug, error, info, warn};
use shared::protocol::{
    self, build_joined, ChatMessage, ClientMessage, DeltaBatch, Frame, ServerMessage,
};
use shared::{
    ByteReader, FlatGenerator, Level, LevelObject, ObjectId, ObjectKind, PeerId, PlayerState,
};

use crate::net::{PeerEvent, PeerHandle};
use crate::utils::get_timestamp;

/// How far out from the origin the spawn search gives up.
const SPAWN_SEARCH_RADIUS: i32 = 64;

pub struct GameServer {
    pub(crate) level: Level,
    pub(crate) generator: FlatGenerator,
    pub(crate) batch: DeltaBatch,
    pub(crate) peers: HashMap<PeerId, PeerHandle>,
    pub(crate) players: HashMap<PeerId, ObjectId>,
    pub(crate) level_file: PathBuf,
    pub(crate) started: Instant,
}

impl GameServer {
    pub fn new(level: Level, level_file: PathBuf) -> GameServer {
        GameServer {
            level,
            generator: FlatGenerator,
            batch: DeltaBatch::new(),
            peers: HashMap::new(),
            players: HashMap::new(),
            level_file,
            started: Instant::now(),
        }
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn handle_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::ConnectRequest {
                peer,
                username,
                display_name,
                handle,
            } => self.handle_connect(peer, username, display_name, handle),
            PeerEvent::Data { peer, bytes } => self.handle_message(peer, &bytes),
            PeerEvent::Ping { peer, rtt } => {
                if let Some(&id) = self.players.get(&peer) {
                    self.level.set_player_ping(id, rtt);
                }
            }
            PeerEvent::Disconnected { peer, reason } => self.handle_disconnect(peer, &reason),
        }
    }

    /// One server tick: run the simulation, fold level events into the
    /// delta batch and broadcast the net result.
    pub fn tick(&mut self) {
        self.level.tick(&mut self.generator);
        for event in self.level.take_events() {
            self.batch.record(event);
        }
        if let Some(update) = self.batch.flush(&self.level) {
            self.broadcast(&update);
        }
    }

    /// Save the level and hang up on everyone.
    pub fn shutdown(&mut self) {
        if let Err(err) = self.level.save(&self.level_file) {
            warn!("Failed to save level: {err}");
        }
        for handle in self.peers.values() {
            handle.disconnect("Server closed");
        }
        self.peers.clear();
        self.players.clear();
    }

    fn handle_connect(
        &mut self,
        peer: PeerId,
        username: String,
        display_name: String,
        handle: PeerHandle,
    ) {
        if let Err(reason) = self.validate_join(&username, &display_name) {
            info!("Denied {username:?} from peer {peer}: {reason}");
            handle.deny(reason);
            return;
        }

        // Snapshot first: the new player hears about its own object
        // through the next delta, same as everyone else.
        handle.send_message(&build_joined(&self.level));

        let mut player = PlayerState::new(&username, &display_name);
        player.connection = Some(peer);
        let position = self.find_spawn();
        let object = LevelObject::new(position, ObjectKind::Player(player));
        let id = object.id;
        self.level.add(object);
        self.level.load_chunks_around(position, &mut self.generator);

        self.peers.insert(peer, handle);
        self.players.insert(peer, id);
        info!("{username} joined as {id} at {position}");
        self.send_chat(None, None, &format!("{display_name} joined"));
    }

    fn validate_join(&self, username: &str, display_name: &str) -> Result<(), &'static str> {
        if username.is_empty() {
            return Err("Empty username");
        }
        if display_name.is_empty() {
            return Err("Empty display name");
        }
        let valid = username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !valid {
            return Err("Invalid username: only lowercase letters, digits, _ and - are allowed");
        }
        if self.level.player_by_username(username).is_some() {
            return Err("Player with this username already exists");
        }
        Ok(())
    }

    /// First free standing cell in a ring search out from the origin.
    fn find_spawn(&mut self) -> IVec2 {
        self.level
            .load_chunks_around(IVec2::ZERO, &mut self.generator);
        for radius in 0..SPAWN_SEARCH_RADIUS {
            for y in -radius..=radius {
                for x in -radius..=radius {
                    if x.abs() != radius && y.abs() != radius {
                        continue;
                    }
                    let position = IVec2::new(x, y);
                    if !self.level.has_object_at(position, 0) {
                        return position;
                    }
                }
            }
        }
        IVec2::ZERO
    }

    fn handle_message(&mut self, peer: PeerId, bytes: &[u8]) {
        let message: ClientMessage = match bincode::deserialize(bytes) {
            Ok(message) => message,
            Err(err) => {
                warn!("Unreadable message from peer {peer}: {err}");
                return;
            }
        };
        match message {
            ClientMessage::AddObject { data } => self.handle_add_object(peer, &data),
            ClientMessage::RemoveObject { id } => self.handle_remove_object(peer, id),
            ClientMessage::PlayerMove { direction } => {
                if let Some(&id) = self.players.get(&peer) {
                    let direction = direction.clamp(IVec2::splat(-1), IVec2::splat(1));
                    self.level.set_player_intent(id, direction);
                }
            }
            ClientMessage::Chat { text } => self.handle_chat(peer, &text),
        }
    }

    fn handle_add_object(&mut self, peer: PeerId, data: &[u8]) {
        let mut object = protocol::decode_object(&mut ByteReader::new(data));
        match object.kind {
            ObjectKind::Corrupted => {
                warn!("Peer {peer} sent an undecodable object");
                return;
            }
            ObjectKind::Player(_) => {
                warn!("Peer {peer} tried to add a player object");
                return;
            }
            _ => {}
        }
        if self.level.get(object.id).is_some() {
            warn!("Peer {peer} re-sent existing object {}", object.id);
            return;
        }
        if self.level.has_object_at(object.position, object.layer()) {
            debug!(
                "Peer {peer} added {} into an occupied cell at {}",
                object.kind.name(),
                object.position
            );
            return;
        }
        object.dirty = false;
        self.level.add(object);
    }

    fn handle_remove_object(&mut self, peer: PeerId, id: ObjectId) {
        match self.level.get(id) {
            None => warn!("Peer {peer} removed unknown object {id}"),
            Some(object) if matches!(object.kind, ObjectKind::Player(_)) => {
                warn!("Peer {peer} tried to remove a player");
            }
            Some(_) => {
                self.level.remove(id);
            }
        }
    }

    fn handle_chat(&mut self, peer: PeerId, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if let Some(command) = text.strip_prefix('/') {
            self.run_command(peer, command);
            return;
        }
        let Some(&id) = self.players.get(&peer) else {
            return;
        };
        let username = match self.level.get(id).map(|object| &object.kind) {
            Some(ObjectKind::Player(player)) => player.username.clone(),
            _ => return,
        };
        info!("[CHAT] [{username}] {text}");
        self.send_chat(Some(id), None, text);
    }

    fn handle_disconnect(&mut self, peer: PeerId, reason: &str) {
        let Some(id) = self.players.remove(&peer) else {
            // Never admitted, nothing to clean up.
            return;
        };
        self.peers.remove(&peer);
        let display_name = match self.level.get(id).map(|object| &object.kind) {
            Some(ObjectKind::Player(player)) => player.display_name.clone(),
            _ => id.to_string(),
        };
        self.level.remove(id);
        info!("{display_name} left: {reason}");
        self.send_chat(None, None, &format!("{display_name} left"));
    }

    /// Chat to one peer, or to everyone when `only_to` is `None`.
    pub(crate) fn send_chat(&self, from: Option<ObjectId>, only_to: Option<PeerId>, text: &str) {
        let message = ServerMessage::Chat(ChatMessage {
            from,
            timestamp_ms: get_timestamp(),
            text: text.to_string(),
        });
        match only_to {
            Some(peer) => {
                if let Some(handle) = self.peers.get(&peer) {
                    handle.send_message(&message);
                }
            }
            None => self.broadcast(&message),
        }
    }

    /// Serialize once, clone bytes per peer.
    fn broadcast(&self, message: &ServerMessage) {
        let bytes = match bincode::serialize(message) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("Failed to serialize broadcast: {err}");
                return;
            }
        };
        for handle in self.peers.values() {
            handle.send(Frame::Data(bytes.clone()));
        }
    }
}
