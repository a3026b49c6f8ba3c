//! Chat commands: lines starting with `/` run here instead of being
//! broadcast.

use glam::IVec2;
use log::{info, warn};
use shared::movement::{self, BOMB_FORCE, BOMB_RANGE};
use shared::{InteractOutcome, ObjectKind, PeerId};

use crate::game::GameServer;

/// How far from their own player someone can interact, in cells squared.
const INTERACT_RANGE_SQ: i32 = 9;

impl GameServer {
    /// Dispatch one command line, prefix already stripped.
    pub(crate) fn run_command(&mut self, peer: PeerId, line: &str) {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            self.send_chat(None, Some(peer), "Empty command, try /help");
            return;
        };
        let args: Vec<&str> = parts.collect();
        match name {
            "help" => self.cmd_help(peer),
            "info" => self.cmd_info(peer),
            "players" => self.cmd_players(peer),
            "locate" => self.cmd_locate(peer, &args),
            "say" => self.cmd_say(&args),
            "teleport" => self.cmd_teleport(peer, &args),
            "interact" => self.cmd_interact(peer, &args),
            "save" => self.cmd_save(peer),
            _ => self.send_chat(
                None,
                Some(peer),
                &format!("Unknown command {name}, try /help"),
            ),
        }
    }

    fn cmd_help(&self, peer: PeerId) {
        self.send_chat(
            None,
            Some(peer),
            "Commands: /help, /info, /players, /locate <username>, /say <text>, \
             /teleport <x> <y>, /interact <x> <y>, /save",
        );
    }

    fn cmd_info(&self, peer: PeerId) {
        let mut reply = format!(
            "gridbox {}, {} objects, {} players, up {}s",
            env!("CARGO_PKG_VERSION"),
            self.level.objects().len(),
            self.level.players().count(),
            self.started.elapsed().as_secs()
        );
        let ping = self
            .level
            .players()
            .find(|(_, state)| state.connection == Some(peer))
            .map(|(_, state)| state.ping);
        if let Some(ping) = ping {
            reply.push_str(&format!(", your ping {:.0} ms", ping * 1000.0));
        }
        self.send_chat(None, Some(peer), &reply);
    }

    fn cmd_players(&self, peer: PeerId) {
        let mut names: Vec<String> = self
            .level
            .players()
            .map(|(_, player)| format!("{} ({:.0} ms)", player.username, player.ping * 1000.0))
            .collect();
        names.sort();
        let reply = if names.is_empty() {
            "Nobody is online".to_string()
        } else {
            names.join(", ")
        };
        self.send_chat(None, Some(peer), &reply);
    }

    fn cmd_locate(&self, peer: PeerId, args: &[&str]) {
        let Some(&target) = args.first() else {
            self.send_chat(None, Some(peer), "Usage: /locate <username>");
            return;
        };
        match self.level.player_by_username(target) {
            Some((object, _)) => {
                self.send_chat(None, Some(peer), &format!("{target} is at {}", object.position));
            }
            None => self.send_chat(None, Some(peer), &format!("No player named {target}")),
        }
    }

    fn cmd_say(&self, args: &[&str]) {
        let text = args.join(" ");
        if text.is_empty() {
            return;
        }
        info!("[CHAT] [SERVER] {text}");
        self.send_chat(None, None, &text);
    }

    fn cmd_teleport(&mut self, peer: PeerId, args: &[&str]) {
        let Some(&id) = self.players.get(&peer) else {
            return;
        };
        let Some(to) = parse_cell(args) else {
            self.send_chat(None, Some(peer), "Usage: /teleport <x> <y>");
            return;
        };
        if self.level.move_object(id, to) {
            self.level.load_chunks_around(to, &mut self.generator);
            self.send_chat(None, Some(peer), &format!("Teleported to {to}"));
        } else {
            self.send_chat(None, Some(peer), &format!("{to} is blocked"));
        }
    }

    fn cmd_interact(&mut self, peer: PeerId, args: &[&str]) {
        let Some(&player_id) = self.players.get(&peer) else {
            return;
        };
        let Some(target) = parse_cell(args) else {
            self.send_chat(None, Some(peer), "Usage: /interact <x> <y>");
            return;
        };
        let Some(player_position) = self.level.get(player_id).map(|object| object.position) else {
            return;
        };
        let offset = target - player_position;
        if offset.x * offset.x + offset.y * offset.y > INTERACT_RANGE_SQ {
            self.send_chat(None, Some(peer), "Too far away");
            return;
        }

        // The topmost object in the cell answers.
        let top = self
            .level
            .objects_at(target)
            .last()
            .map(|object| (object.id, object.kind.interact()));
        match top {
            None => self.send_chat(None, Some(peer), "Nothing there"),
            Some((_, InteractOutcome::None)) => {}
            Some((_, InteractOutcome::Reply(reply))) => self.send_chat(None, Some(peer), reply),
            Some((bomb, InteractOutcome::Detonate)) => {
                // The bomb is spent before the blast so it cannot shove
                // itself around.
                self.level.remove(bomb);
                movement::apply_explosion(&mut self.level, target, BOMB_RANGE, BOMB_FORCE);
                info!("Bomb detonated at {target}");
            }
        }
    }

    fn cmd_save(&mut self, peer: PeerId) {
        match self.level.save(&self.level_file) {
            Ok(()) => self.send_chat(None, Some(peer), "Level saved"),
            Err(err) => {
                warn!("Save failed: {err}");
                self.send_chat(None, Some(peer), "Save failed, see server log");
            }
        }
    }
}

fn parse_cell(args: &[&str]) -> Option<IVec2> {
    let x = args.first()?.parse().ok()?;
    let y = args.get(1)?.parse().ok()?;
    Some(IVec2::new(x, y))
}
