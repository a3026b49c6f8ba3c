//! # Game Server Library
//!
//! Authoritative server for the shared grid world. It owns the only
//! level that actually simulates; every connected client holds a mirror
//! that conforms to what this process broadcasts.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The level ticks here and nowhere else: player intents feed the
//! movement pass, chunks generate on demand around players, and the
//! resulting change events become the deltas everyone receives.
//!
//! ### Client Management
//! Connections hand in a join request naming a username and display
//! name. The server validates both, refuses duplicates, snapshots the
//! level for the newcomer and creates their player object. Disconnects
//! remove the player and tell the room.
//!
//! ### State Broadcasting
//! Level events accumulate in a delta batch between ticks. Each tick
//! flushes the batch into one update message carrying added objects in
//! full, removed ids, and the dynamic fields of changed objects.
//!
//! ## Module Organization
//!
//! ### Network Module (`net`)
//! TCP listener and per-connection tasks: length-prefixed frames, the
//! join handshake, keepalive pings with round-trip measurement, and the
//! event funnel into the main loop.
//!
//! ### Game Module (`game`)
//! The [`game::GameServer`] state machine: join validation, message
//! handling, spawning, ticking and shutdown persistence.
//!
//! ### Commands Module (`commands`)
//! Chat lines starting with `/`: diagnostics, teleporting, interacting
//! with objects and saving the level.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use glam::IVec2;
//! use server::game::GameServer;
//! use server::net::NetworkServer;
//! use shared::Level;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut net = NetworkServer::bind("127.0.0.1:12420").await?;
//!     let mut game = GameServer::new(
//!         Level::new(IVec2::splat(16), false),
//!         "level.bin".into(),
//!     );
//!     let mut ticker = tokio::time::interval(std::time::Duration::from_millis(80));
//!     loop {
//!         tokio::select! {
//!             Some(event) = net.recv() => game.handle_event(event),
//!             _ = ticker.tick() => game.tick(),
//!         }
//!     }
//! }
//! ```

pub mod commands;
pub mod game;
pub mod net;
pub mod utils;
