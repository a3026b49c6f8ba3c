//! # Game Client Library
//!
//! This library implements the client side of the tile-grid world: it
//! connects to a server, mirrors the level it is handed, and keeps that
//! mirror current by applying the server's change broadcasts.
//!
//! ## Architecture Overview
//!
//! ### Authoritative Server, Mirrored Level
//! The client never simulates the world on its own. The full level
//! arrives once in a join snapshot; after that only added, removed and
//! changed objects are sent. The mirror applies those deltas verbatim,
//! so any divergence is corrected by the next broadcast that touches
//! the object in question.
//!
//! ### Local Prediction
//! The one exception is the client's own player. Movement input takes
//! effect on the mirror immediately, using the same movement pass the
//! server runs, so walking feels instant even though the server has the
//! final word.
//!
//! ### Budgeted Snapshot Application
//! Join snapshots of a large level can hold tens of thousands of
//! objects. They are decoded a slice at a time under a per-frame time
//! budget so the client stays responsive while joining; regular
//! messages queue up until the snapshot is done.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Client-side level state:
//! - Snapshot and delta application
//! - Local player binding and movement prediction
//! - Chat scrollback
//!
//! ### Network Module (`net`)
//! The connection itself:
//! - Length-prefixed frames over TCP
//! - The join request and keepalive replies
//! - An event queue the game loop drains at its own pace
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use client::game::GameClient;
//! use client::net::Connection;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = Connection::connect("127.0.0.1:12420", "alice", "Alice").await?;
//!     let mut game = GameClient::new(conn, "alice".to_string());
//!     let mut ticker = tokio::time::interval(Duration::from_millis(80));
//!     loop {
//!         ticker.tick().await;
//!         game.process_messages(Duration::from_millis(10));
//!         game.update();
//!         if let Some(reason) = game.disconnected() {
//!             eprintln!("{reason}");
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod net;
