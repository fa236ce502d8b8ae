//! # Game Server Library
//!
//! The authoritative server for a grid-based, last-player-standing bomb game.
//! It owns the only copy of the world, advances it in fixed ticks and tells
//! clients what changed.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Clients send intents only: hold or release a direction, place a bomb, chat.
//! Every outcome (movement, blasts, pickups, damage, the winner) is decided by
//! the server inside [`game::Game::tick`].
//!
//! ### Change-Log Protocol
//! A full [`shared::GameSnapshot`] is sent once when a game starts. After that
//! each tick that changed anything produces one ordered list of
//! [`shared::ChangeRecord`]s. Applying the records in order to the snapshot
//! reproduces the server state exactly; an idle tick sends nothing.
//!
//! ### Lobby Lifecycle
//! Connections join a lobby with a nickname. Once enough players are present a
//! wait timer runs; a full lobby skips it. A countdown then starts the game,
//! and dropping below the minimum during the countdown cancels it. See
//! [`lobby`].
//!
//! ## Architecture Design
//!
//! ### Single Owning Event Loop
//! [`network::Server::run`] is the only code that touches lobby and game
//! state. Socket reader tasks forward decoded packets over a channel and the
//! loop interleaves them with tick events, so intents always land between two
//! ticks and a tick always sees a consistent world.
//!
//! ### TCP Framing
//! Every packet is a 4-byte big-endian length followed by a bincode body.
//! Each client has its own writer task fed by an unbounded queue, so a
//! broadcast never waits on a slow socket.
//!
//! ## Module Organization
//!
//! - `config`: server, lobby and rule settings
//! - `map_gen`: seeded grid generation with safe spawn corners
//! - `entity`: players, bombs, explosions, power-ups and their store
//! - `changelog`: per-tick record accumulator
//! - `movement`: per-axis collision resolution
//! - `detonation`: fuse countdown and chain reactions
//! - `powerup`: pickups and stat growth
//! - `ai`: optional bots filling empty seats
//! - `game`: the tick engine
//! - `lobby`: waiting, countdown and in-progress states
//! - `client_manager`: open connections and outbound queues
//! - `network`: framing, connection tasks and the server loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig {
//!         addr: "127.0.0.1:8080".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod changelog;
pub mod client_manager;
pub mod config;
pub mod detonation;
pub mod entity;
pub mod game;
pub mod lobby;
pub mod map_gen;
pub mod movement;
pub mod network;
pub mod powerup;
