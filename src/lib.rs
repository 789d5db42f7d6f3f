//! Client-side simulation core for a multiplayer 2D platform shooter
//!
//! Local input is predicted immediately, remote players are interpolated
//! from authoritative snapshots, and everything network-facing flows through
//! a drained message queue so the simulation runs on a single thread.

pub mod config;
pub mod game;
pub mod util;
pub mod ws;
