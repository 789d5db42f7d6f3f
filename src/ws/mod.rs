//! WebSocket transport and wire protocol

pub mod client;
pub mod protocol;

pub use client::{connect, NetError, NetEvent, NetLink, NetPeer, NetTasks};
pub use protocol::{ClientMsg, ServerMsg};
