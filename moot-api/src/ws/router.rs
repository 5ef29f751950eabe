//! Per-message fan-out rules
//!
//! Negotiation messages relay to the other room members and, for SFU-engaged
//! rooms, also drive the sender's server-side peer connection. Chat is the
//! only payload the router inspects; everything else passes through verbatim.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use moot_core::{ChatMessage, Participant, ParticipantId, Room, RoomMode, SignalingMessage};

use crate::http::AppState;

/// Whether the room's media runs through the server. One-to-one rooms stay
/// peer-to-peer; broadcasting and screen sharing go through the SFU.
#[must_use]
pub fn sfu_engaged(room: &Room) -> bool {
    room.mode != RoomMode::OneToOne
}

/// Route one inbound message. `message` already carries server-authoritative
/// `senderId` and `roomId`.
pub async fn dispatch(
    state: &AppState,
    room: &Arc<Room>,
    participant: &Arc<Participant>,
    message: SignalingMessage,
) {
    match message.kind.as_str() {
        "offer" => {
            broadcast_to_room(room, message.clone(), Some(&participant.id));
            if sfu_engaged(room) {
                apply_offer(state, room, participant, &message.data).await;
            }
        }
        "answer" => {
            broadcast_to_room(room, message.clone(), Some(&participant.id));
            if sfu_engaged(room) {
                if let Some(sdp) = sdp_payload(&message.data) {
                    if let Err(e) = state.sfu.handle_answer(&participant.id, sdp).await {
                        warn!(participant_id = %participant.id, error = %e, "failed to apply answer");
                    }
                }
            }
        }
        "ice_candidate" => {
            broadcast_to_room(room, message.clone(), Some(&participant.id));
            if sfu_engaged(room) {
                apply_ice_candidate(state, participant, &message.data).await;
            }
        }
        "chat" => handle_chat(room, participant, &message),
        "screen_share_start" => {
            participant.set_screen_share(true);
            broadcast_to_room(room, message, Some(&participant.id));
        }
        "screen_share_stop" => {
            participant.set_screen_share(false);
            broadcast_to_room(room, message, Some(&participant.id));
        }
        // Anything else is forwarded verbatim to the rest of the room.
        _ => broadcast_to_room(room, message, Some(&participant.id)),
    }
}

/// Deliver a message to every participant of the room except `exclude`,
/// evaluated against a point-in-time snapshot of the membership. A failing
/// recipient is its own problem: the send is logged by the participant's
/// outbox and the broadcast continues.
pub fn broadcast_to_room(room: &Room, message: SignalingMessage, exclude: Option<&ParticipantId>) {
    for recipient in room.participants() {
        if exclude == Some(&recipient.id) {
            continue;
        }
        recipient.enqueue(message.clone());
    }
}

fn handle_chat(room: &Arc<Room>, participant: &Arc<Participant>, message: &SignalingMessage) {
    // Only string payloads are chat; anything else is dropped silently.
    let Some(content) = message.data.as_str() else {
        debug!(participant_id = %participant.id, "ignoring chat with non-string payload");
        return;
    };

    let chat = ChatMessage {
        sender_id: participant.id.to_string(),
        sender_name: participant.username.clone(),
        content: content.to_string(),
        timestamp: Utc::now().timestamp(),
    };
    room.append_chat(chat.clone());
    broadcast_to_room(room, SignalingMessage::chat(room.id.clone(), &chat), None);
}

async fn apply_offer(
    state: &AppState,
    room: &Arc<Room>,
    participant: &Arc<Participant>,
    data: &Value,
) {
    let Some(sdp) = sdp_payload(data) else {
        debug!(participant_id = %participant.id, "offer without sdp payload");
        return;
    };

    match state.sfu.handle_offer(&participant.id, sdp).await {
        Ok(answer_sdp) => {
            participant.enqueue(SignalingMessage::answer(room.id.clone(), answer_sdp));
        }
        Err(e) => {
            warn!(participant_id = %participant.id, error = %e, "offer negotiation failed");
            participant.enqueue(SignalingMessage::error(format!("negotiation failed: {e}")));
        }
    }
}

async fn apply_ice_candidate(state: &AppState, participant: &Arc<Participant>, data: &Value) {
    let (candidate, sdp_mid, sdp_mline_index) = match data {
        Value::String(candidate) => (candidate.clone(), None, None),
        Value::Object(_) => {
            let Some(candidate) = data.get("candidate").and_then(Value::as_str) else {
                debug!(participant_id = %participant.id, "ice_candidate without candidate field");
                return;
            };
            (
                candidate.to_string(),
                data.get("sdpMid").and_then(Value::as_str).map(str::to_string),
                data.get("sdpMLineIndex")
                    .and_then(Value::as_u64)
                    .map(|index| index as u16),
            )
        }
        _ => {
            debug!(participant_id = %participant.id, "unusable ice_candidate payload");
            return;
        }
    };

    if let Err(e) = state
        .sfu
        .handle_ice_candidate(&participant.id, candidate, sdp_mid, sdp_mline_index)
        .await
    {
        warn!(participant_id = %participant.id, error = %e, "failed to add ice candidate");
    }
}

/// The SDP may arrive as a bare string or as an `RTCSessionDescription`-shaped
/// object.
fn sdp_payload(data: &Value) -> Option<String> {
    data.as_str()
        .or_else(|| data.get("sdp").and_then(Value::as_str))
        .map(str::to_string)
}
