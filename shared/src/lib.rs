//! Level model, movement rules and wire protocol shared by the server
//! and the client.

pub mod chunk;
pub mod generation;
pub mod grid;
pub mod level;
pub mod movement;
pub mod object;
pub mod protocol;
pub mod wire;

pub use generation::{ChunkGenerator, FlatGenerator, NoopGenerator};
pub use grid::Bounds;
pub use level::{Level, LevelEvent, PLAYER_CHUNK_RANGE};
pub use object::{
    InteractOutcome, LevelObject, Movable, MovableStats, ObjectId, ObjectKind, PeerId, PlayerState,
};
pub use protocol::{
    ChatMessage, ClientMessage, DeltaBatch, Frame, ServerMessage, MAX_FRAME_LEN,
};
pub use wire::{ByteReader, ByteWriter, WireError};
