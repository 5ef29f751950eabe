//! moot core
//!
//! Shared state and protocol types for the moot signaling/SFU server:
//!
//! - **`Room`**: membership, mode-specific admission, chat history
//! - **`RoomRegistry`**: name to room mapping with get-or-create semantics
//! - **`Participant`**: one connected client and its outbound message queue
//! - **`SignalingMessage`**: the JSON envelope relayed between participants
//!
//! The HTTP/WebSocket surface lives in `moot-api`; media forwarding lives in
//! `moot-sfu`. Everything here is plain in-memory state guarded by short
//! critical sections, safe to call from any task.

pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod models;
pub mod registry;
pub mod room;

pub use config::{Config, Environment};
pub use error::{Error, Result};
pub use message::SignalingMessage;
pub use models::{ChatMessage, ConnectionInfo, Participant, ParticipantId, ParticipantInfo, RoomMode};
pub use registry::RoomRegistry;
pub use room::Room;
