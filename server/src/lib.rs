//! # Session Authority Library
//!
//! This library provides the authoritative side of an Aviary session. It
//! decides who is connected, when the lobby hands over to gameplay, which
//! entity belongs to which participant, and how every entity flies. Observers
//! only ever see the results through replicated packets.
//!
//! ## Core Responsibilities
//!
//! ### Lobby Readiness
//! Participants flag themselves ready in the lobby. Once everyone connected is
//! ready a short countdown starts; any join, leave or un-ready cancels it. When
//! it expires the gameplay scene is loaded exactly once.
//!
//! ### Entity Authority
//! In the gameplay scene every connected participant owns exactly one entity.
//! Entities are spawned on join (or in one bulk pass when the scene activates)
//! and despawned on leave.
//!
//! ### Flight Simulation
//! Each tick the newest intent from every participant steers that
//! participant's entity relative to the camera it was sent from. Velocity
//! eases toward the desired velocity and positions integrate afterwards.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All session state lives in one [`session::Session`] owned by the server
//! task. Packets, timeouts and ticks are handled sequentially, so a cancel
//! handled while processing messages always lands before the next countdown
//! step.
//!
//! ### Explicit Roles
//! Every mutating operation checks a [`shared::Role`] injected at construction
//! and fails with [`shared::SessionError::NotAuthority`] on observers.
//!
//! ## Module Organization
//!
//! - `registry`: connected participants, addresses, pending intents, timeouts
//! - `scheduler`: cancellable delayed tasks advanced by tick time
//! - `lobby`: readiness flags and the start countdown
//! - `entity` / `game`: authoritative entities and the world that stores them
//! - `entity_table`: participant to entity mapping
//! - `movement`: the flying movement model
//! - `session`: ties the above together per scene
//! - `network`: UDP transport and the tick loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::config::SessionConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(16), // ~60Hz
//!         12,
//!         SessionConfig::default(),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod entity;
pub mod entity_table;
pub mod game;
pub mod lobby;
pub mod movement;
pub mod network;
pub mod registry;
pub mod scheduler;
pub mod session;
