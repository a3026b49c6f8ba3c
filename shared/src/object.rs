//! Object model for everything that lives in a level.

use glam::{IVec2, Vec2};
use uuid::Uuid;

/// Stable identity of a level object, shared across server and mirrors.
pub type ObjectId = Uuid;

/// Connection handle assigned by the transport layer.
pub type PeerId = u64;

/// Velocity state carried by objects the movement pass can displace.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Movable {
    pub velocity: Vec2,
    /// Fractional cell progress on each axis, kept in `-1.0..=1.0`.
    pub sub_position: Vec2,
}

/// Physical parameters of a movable kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovableStats {
    pub mass: f32,
    /// Speed above which the object shatters. Infinite for unbreakables.
    pub strength: f32,
    /// Whether pushes move this object. When false a push instead stops
    /// the pusher dead.
    pub can_push: bool,
}

/// Per-player state attached to the player object.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub username: String,
    pub display_name: String,
    pub ping: f32,
    /// Most recent movement input, one step per axis. Not synced.
    pub move_intent: IVec2,
    /// Transport peer driving this player. `None` on mirrors, except for
    /// the mirror's own player.
    pub connection: Option<PeerId>,
    pub movable: Movable,
}

impl PlayerState {
    pub fn new(username: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_name: display_name.into(),
            ping: 0.0,
            move_intent: IVec2::ZERO,
            connection: None,
            movable: Movable::default(),
        }
    }
}

/// Result of interacting with an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractOutcome {
    None,
    Reply(&'static str),
    Detonate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Player(PlayerState),
    Floor,
    Wall(Movable),
    BoxBlock(Movable),
    Effect { size: IVec2, name: String },
    Ice,
    Message,
    Grass,
    Bomb,
    Light { color: [f32; 3] },
    BrokenWall(Movable),
    BrokenBox(Movable),
    /// Placeholder for an object whose wire data could not be decoded.
    /// Never produced by gameplay and never re-encoded.
    Corrupted,
}

impl ObjectKind {
    /// Render/collision layer. Objects on the same layer exclude each
    /// other from a cell; different layers coexist.
    pub fn layer(&self) -> i32 {
        match self {
            ObjectKind::Floor => -3,
            ObjectKind::Grass | ObjectKind::Ice => -2,
            ObjectKind::BrokenWall(_) | ObjectKind::BrokenBox(_) | ObjectKind::Light { .. } => -1,
            ObjectKind::Player(_)
            | ObjectKind::Wall(_)
            | ObjectKind::BoxBlock(_)
            | ObjectKind::Message
            | ObjectKind::Bomb => 0,
            ObjectKind::Effect { .. } => 1,
            ObjectKind::Corrupted => i32::MAX,
        }
    }

    /// Physical parameters, or `None` for kinds the movement pass never
    /// displaces.
    pub fn stats(&self) -> Option<MovableStats> {
        match self {
            ObjectKind::Player(_) => Some(MovableStats {
                mass: 2.0,
                strength: f32::INFINITY,
                can_push: true,
            }),
            ObjectKind::Wall(_) => Some(MovableStats {
                mass: 4.0,
                strength: 2.0,
                can_push: false,
            }),
            ObjectKind::BoxBlock(_) => Some(MovableStats {
                mass: 1.0,
                strength: 8.0,
                can_push: true,
            }),
            ObjectKind::BrokenWall(_) | ObjectKind::BrokenBox(_) => Some(MovableStats {
                mass: 0.5,
                strength: f32::INFINITY,
                can_push: true,
            }),
            _ => None,
        }
    }

    pub fn movable(&self) -> Option<&Movable> {
        match self {
            ObjectKind::Player(player) => Some(&player.movable),
            ObjectKind::Wall(movable)
            | ObjectKind::BoxBlock(movable)
            | ObjectKind::BrokenWall(movable)
            | ObjectKind::BrokenBox(movable) => Some(movable),
            _ => None,
        }
    }

    pub fn movable_mut(&mut self) -> Option<&mut Movable> {
        match self {
            ObjectKind::Player(player) => Some(&mut player.movable),
            ObjectKind::Wall(movable)
            | ObjectKind::BoxBlock(movable)
            | ObjectKind::BrokenWall(movable)
            | ObjectKind::BrokenBox(movable) => Some(movable),
            _ => None,
        }
    }

    /// What this object shatters into, carrying its velocity state over.
    /// `None` means breaking removes it outright.
    pub fn broken_kind(&self) -> Option<ObjectKind> {
        match self {
            ObjectKind::Wall(movable) => Some(ObjectKind::BrokenWall(*movable)),
            ObjectKind::BoxBlock(movable) => Some(ObjectKind::BrokenBox(*movable)),
            _ => None,
        }
    }

    /// Verb shown to a player standing next to this object, if it can be
    /// interacted with at all.
    pub fn prompt(&self) -> Option<&'static str> {
        match self {
            ObjectKind::Bomb => Some("detonate"),
            ObjectKind::Message => Some("send"),
            ObjectKind::Grass => Some("touch"),
            _ => None,
        }
    }

    pub fn interact(&self) -> InteractOutcome {
        match self {
            ObjectKind::Bomb => InteractOutcome::Detonate,
            ObjectKind::Message => InteractOutcome::Reply("message object clicked"),
            ObjectKind::Grass => InteractOutcome::Reply("grass touched !!!!!!!!!!!!!!!!!"),
            _ => InteractOutcome::None,
        }
    }

    /// Short lowercase name for logs and console input.
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Player(_) => "player",
            ObjectKind::Floor => "floor",
            ObjectKind::Wall(_) => "wall",
            ObjectKind::BoxBlock(_) => "box",
            ObjectKind::Effect { .. } => "effect",
            ObjectKind::Ice => "ice",
            ObjectKind::Message => "message",
            ObjectKind::Grass => "grass",
            ObjectKind::Bomb => "bomb",
            ObjectKind::Light { .. } => "light",
            ObjectKind::BrokenWall(_) => "broken wall",
            ObjectKind::BrokenBox(_) => "broken box",
            ObjectKind::Corrupted => "corrupted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelObject {
    pub id: ObjectId,
    pub position: IVec2,
    /// Set whenever synced state changes; cleared by the level's dirty
    /// sweep after a change event is recorded.
    pub dirty: bool,
    pub kind: ObjectKind,
}

impl LevelObject {
    pub fn new(position: IVec2, kind: ObjectKind) -> Self {
        Self::with_id(Uuid::new_v4(), position, kind)
    }

    /// Construct with a known id, used when decoding synced objects.
    pub fn with_id(id: ObjectId, position: IVec2, kind: ObjectKind) -> Self {
        Self {
            id,
            position,
            dirty: false,
            kind,
        }
    }

    pub fn layer(&self) -> i32 {
        self.kind.layer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_assignments() {
        assert_eq!(ObjectKind::Floor.layer(), -3);
        assert_eq!(ObjectKind::Ice.layer(), -2);
        assert_eq!(ObjectKind::Light { color: [1.0; 3] }.layer(), -1);
        assert_eq!(ObjectKind::Wall(Movable::default()).layer(), 0);
        assert_eq!(ObjectKind::Player(PlayerState::new("a", "A")).layer(), 0);
        assert_eq!(
            ObjectKind::Effect {
                size: IVec2::ONE,
                name: String::new()
            }
            .layer(),
            1
        );
        assert_eq!(ObjectKind::Corrupted.layer(), i32::MAX);
    }

    #[test]
    fn test_walls_block_pushes_boxes_do_not() {
        let wall = ObjectKind::Wall(Movable::default()).stats().unwrap();
        let box_block = ObjectKind::BoxBlock(Movable::default()).stats().unwrap();

        assert!(!wall.can_push);
        assert!(box_block.can_push);
        assert!(wall.mass > box_block.mass);
    }

    #[test]
    fn test_decor_has_no_stats() {
        assert!(ObjectKind::Floor.stats().is_none());
        assert!(ObjectKind::Grass.stats().is_none());
        assert!(ObjectKind::Bomb.stats().is_none());
        assert!(ObjectKind::Corrupted.stats().is_none());
    }

    #[test]
    fn test_broken_kind_carries_velocity() {
        let movable = Movable {
            velocity: Vec2::new(3.0, -1.0),
            sub_position: Vec2::new(0.5, 0.0),
        };

        match ObjectKind::Wall(movable).broken_kind() {
            Some(ObjectKind::BrokenWall(debris)) => assert_eq!(debris, movable),
            other => panic!("expected broken wall, got {other:?}"),
        }
        match ObjectKind::BoxBlock(movable).broken_kind() {
            Some(ObjectKind::BrokenBox(debris)) => assert_eq!(debris, movable),
            other => panic!("expected broken box, got {other:?}"),
        }
        assert!(ObjectKind::Player(PlayerState::new("a", "A"))
            .broken_kind()
            .is_none());
    }

    #[test]
    fn test_debris_is_unbreakable_and_pushable() {
        let stats = ObjectKind::BrokenWall(Movable::default()).stats().unwrap();
        assert!(stats.strength.is_infinite());
        assert!(stats.can_push);
    }

    #[test]
    fn test_interactions() {
        assert_eq!(ObjectKind::Bomb.prompt(), Some("detonate"));
        assert_eq!(ObjectKind::Bomb.interact(), InteractOutcome::Detonate);
        assert_eq!(
            ObjectKind::Message.interact(),
            InteractOutcome::Reply("message object clicked")
        );
        assert_eq!(
            ObjectKind::Grass.interact(),
            InteractOutcome::Reply("grass touched !!!!!!!!!!!!!!!!!")
        );
        assert_eq!(ObjectKind::Floor.prompt(), None);
        assert_eq!(ObjectKind::Floor.interact(), InteractOutcome::None);
    }

    #[test]
    fn test_new_objects_get_unique_ids() {
        let a = LevelObject::new(IVec2::ZERO, ObjectKind::Floor);
        let b = LevelObject::new(IVec2::ZERO, ObjectKind::Floor);
        assert_ne!(a.id, b.id);
        assert!(!a.dirty);
    }
}
