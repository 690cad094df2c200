//! # Session Observer Library
//!
//! This library provides the participant side of an Aviary session. A client
//! never simulates: it turns local input into one intent per tick, forwards
//! lobby requests to the authority, and presents whatever the authority
//! replicates back.
//!
//! ## Architecture Overview
//!
//! ### Input Pipeline
//! Devices are sampled every presentation frame. Frames are folded into one
//! intent per simulation tick so the authority sees the same input no matter
//! how fast the client renders. The current look angles are attached to every
//! intent; they define what "forward" means for the movement model.
//!
//! ### Replicated Presentation
//! Snapshots are buffered and remote entities are shown slightly in the past,
//! blended between the two snapshots around the render time. The client's own
//! entity is shown at its newest replicated pose.
//!
//! ### Lobby Requests
//! The client is never the authority. Ready toggles are sent as
//! `Packet::SetReady` and take effect when the next lobby broadcast arrives.
//!
//! ## Module Organization
//!
//! - `camera`: orbit look angles fed by pointer motion
//! - `input`: frame sampling, accumulation and sequencing
//! - `game`: lobby view, snapshot buffer and interpolation
//! - `network`: UDP connection and the frame/tick loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::{MovePattern, ScriptedDevice};
//! use client::network::Client;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = Box::new(ScriptedDevice::new(MovePattern::Circle));
//!     let mut client = Client::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(16),
//!         0,    // no simulated latency
//!         true, // ready up right away
//!         device,
//!     )
//!     .await?;
//!
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod camera;
pub mod game;
pub mod input;
pub mod network;
