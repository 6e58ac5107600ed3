//! # Trading Simulation Server Library
//!
//! This library provides the authoritative server for the multiplayer
//! space-trading simulation. It owns the canonical world state, validates
//! every player command, and broadcasts snapshots so all connected clients
//! observe the same universe.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the definitive version of the economy, movement, and
//! combat rules. Clients never mutate state directly; they submit commands
//! and conform to the snapshots the server broadcasts.
//!
//! ### Fixed-Cadence Ticks
//! A scheduler fires every 100 milliseconds. Each tick advances travel
//! interpolation, runs the automated trader fleet, steps the pirate state
//! machines, and recomputes the leaderboard before the snapshot goes out.
//!
//! ### Command Validation
//! Every command is checked against the acting player's resources, position,
//! and the global per-player cooldown before any state changes. Validation
//! failures leave the world untouched and are reported back verbatim.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Message Loop
//! Inbound packets and tick fires enter one bounded FIFO queue drained by a
//! single loop that owns the world state. Commands and ticks are therefore
//! totally ordered: no two mutations ever interleave, and no reader ever
//! observes a half-applied command. When the queue fills, new senders get a
//! transient "server busy" error instead of blocking the socket.
//!
//! ### UDP-Based Communication
//! Uses UDP sockets with bincode-serialized packets. The payload is split
//! into a static part (ports, trade hubs) sent once on join and a dynamic
//! part (ships, pirates, leaderboard) broadcast every tick.
//!
//! ## Module Organization
//!
//! - [`scheduler`]: fixed-interval tick source with observer callbacks and
//!   cooldown arithmetic
//! - [`world`]: world state container, procedural generation, and the
//!   per-tick update pipeline
//! - [`actions`]: player command validation and application
//! - [`agents`]: automated trader heuristics and pirate state machines
//! - [`movement`]: travel interpolation, cost, and trade yield formulas
//! - [`snapshot`]: conversion of live entities into detached wire payloads
//! - [`network`]: UDP transport, client tracking, and the main server loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::world::{WorldConfig, WorldState};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let world = WorldState::new(WorldConfig::default());
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(100),
//!         32,
//!         world,
//!     )
//!     .await?;
//!
//!     // Runs the main loop: receives commands, fires ticks, broadcasts
//!     // snapshots, and reaps timed-out clients.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod agents;
pub mod movement;
pub mod network;
pub mod scheduler;
pub mod snapshot;
pub mod world;
