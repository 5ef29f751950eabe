pub mod id;
pub mod participant;
pub mod room_mode;

pub use id::ParticipantId;
pub use participant::{ChatMessage, Participant, ParticipantInfo};
pub use room_mode::{ConnectionInfo, RoomMode};
