use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{ChatMessage, Participant, ParticipantId};
use crate::room::Room;

/// The JSON envelope exchanged over the signaling channel, one message per
/// frame.
///
/// `roomId` and `senderId` on inbound messages are untrusted: the session
/// overwrites both with server-authoritative values before routing. `data` is
/// opaque to the server except for `chat` payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "roomId", default)]
    pub room_id: String,
    #[serde(rename = "senderId", default)]
    pub sender_id: String,
    #[serde(default)]
    pub data: Value,
}

impl SignalingMessage {
    /// Error report sent to the offending client before closing.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            room_id: String::new(),
            sender_id: String::new(),
            data: Value::String(message.into()),
        }
    }

    /// Snapshot of the room delivered to a participant right after admission.
    #[must_use]
    pub fn room_info(room: &Room) -> Self {
        Self {
            kind: "room_info".to_string(),
            room_id: room.id.clone(),
            sender_id: String::new(),
            data: json!({
                "roomId": room.id,
                "roomType": room.mode,
                "participants": room.participant_infos(),
                "chatHistory": room.chat_history(),
            }),
        }
    }

    /// Join notification broadcast to the other room members.
    #[must_use]
    pub fn participant_joined(room_id: String, participant: &Participant) -> Self {
        Self {
            kind: "participant_joined".to_string(),
            room_id,
            sender_id: participant.id.to_string(),
            data: json!({
                "username": participant.username,
                "isBroadcaster": participant.is_broadcaster,
                "isScreenShare": participant.is_screen_share(),
            }),
        }
    }

    /// Departure notification broadcast to the remaining room members.
    #[must_use]
    pub fn participant_left(room_id: String, participant_id: &ParticipantId) -> Self {
        Self {
            kind: "participant_left".to_string(),
            room_id,
            sender_id: participant_id.to_string(),
            data: Value::Null,
        }
    }

    /// Chat fan-out, delivered to every participant including the sender.
    #[must_use]
    pub fn chat(room_id: String, message: &ChatMessage) -> Self {
        Self {
            kind: "chat".to_string(),
            room_id,
            sender_id: message.sender_id.clone(),
            data: json!(message),
        }
    }

    /// SDP answer produced by the SFU engine for the offering participant.
    /// An empty `senderId` marks it server-originated.
    #[must_use]
    pub fn answer(room_id: String, sdp: String) -> Self {
        Self {
            kind: "answer".to_string(),
            room_id,
            sender_id: String::new(),
            data: json!({ "type": "answer", "sdp": sdp }),
        }
    }
}
