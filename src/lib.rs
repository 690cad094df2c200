//! Aviary: a small lobby-to-gameplay session of flying entities.
//!
//! The workspace is split into the wire protocol (`shared`), the session
//! authority (`server`) and the observer client (`client`). This crate only
//! re-exports them so the root integration tests and benchmarks can reach all
//! three.

pub use client;
pub use server;
pub use shared;
