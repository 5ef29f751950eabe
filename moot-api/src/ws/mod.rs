//! WebSocket signaling sessions
//!
//! One session per accepted client. The session registers a participant in
//! its room, replays the room snapshot, announces the join, then relays
//! messages until the connection drops. The split socket halves get one task
//! each: the read loop runs here, and a dedicated writer task drains the
//! participant's outbox so no two producers ever touch the frame writer
//! concurrently.

pub mod router;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use moot_core::models::participant::OUTBOX_CAPACITY;
use moot_core::{Participant, ParticipantId, RoomMode, SignalingMessage};

use crate::http::{AppError, AppState};

/// Signaling frames are small; cap them well below the transport default.
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// How long a departing session waits for its writer to flush the outbox.
const WRITER_DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Query parameters for a `/ws` connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "roomId")]
    pub room_id: Option<String>,
    /// Room mode; unrecognized values coerce to `one_to_one`.
    #[serde(rename = "type")]
    pub mode: Option<String>,
    pub username: Option<String>,
    /// `"true"` claims the broadcaster slot.
    pub broadcaster: Option<String>,
    /// `"true"` marks the participant as screen sharing.
    #[serde(rename = "screenShare")]
    pub screen_share: Option<String>,
}

struct JoinRequest {
    room_id: String,
    mode: RoomMode,
    username: String,
    is_broadcaster: bool,
    is_screen_share: bool,
}

/// WebSocket handler for the signaling channel at `/ws`
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let Some(room_id) = query.room_id.filter(|id| !id.is_empty()) else {
        return Err(AppError::bad_request("roomId query parameter is required"));
    };

    let join = JoinRequest {
        room_id,
        mode: RoomMode::parse(query.mode.as_deref().unwrap_or_default()),
        username: query.username.unwrap_or_default(),
        is_broadcaster: query.broadcaster.as_deref() == Some("true"),
        is_screen_share: query.screen_share.as_deref() == Some("true"),
    };

    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, join)))
}

async fn handle_socket(socket: WebSocket, state: AppState, join: JoinRequest) {
    let participant_id = ParticipantId::new();
    let room = state.registry.get_or_create(&join.room_id, join.mode);

    let (outbox_tx, outbox_rx) = mpsc::channel::<SignalingMessage>(OUTBOX_CAPACITY);
    let shutdown = CancellationToken::new();
    let participant = Arc::new(Participant::new(
        participant_id.clone(),
        join.username,
        join.is_broadcaster,
        join.is_screen_share,
        outbox_tx,
        shutdown.clone(),
    ));

    let (mut sink, mut stream) = socket.split();

    if let Err(e) = room.add(Arc::clone(&participant)) {
        warn!(room_id = %room.id, participant_id = %participant_id, error = %e, "participant rejected");
        let reject = SignalingMessage::error(e.to_string());
        if let Ok(frame) = serde_json::to_string(&reject) {
            let _ = sink.send(Message::Text(frame)).await;
        }
        return;
    }

    info!(
        room_id = %room.id,
        participant_id = %participant_id,
        username = %participant.username,
        "participant joined"
    );

    // From here on the writer task owns the sink; everything reaches the
    // client through the participant's outbox.
    let mut writer = tokio::spawn(write_loop(sink, outbox_rx, shutdown.clone()));

    // Snapshot first, then announce, both through the outboxes, so every
    // recipient sees them in that order.
    participant.enqueue(SignalingMessage::room_info(&room));
    router::broadcast_to_room(
        &room,
        SignalingMessage::participant_joined(room.id.clone(), &participant),
        Some(&participant_id),
    );

    let sfu_active = router::sfu_engaged(&room);
    if sfu_active {
        if let Err(e) = state.sfu.add(participant_id.clone()).await {
            warn!(participant_id = %participant_id, error = %e, "failed to create sfu peer connection");
        }
    }

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                debug!(participant_id = %participant_id, "session cancelled");
                break;
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let mut message: SignalingMessage = match serde_json::from_str(&text) {
                            Ok(message) => message,
                            Err(e) => {
                                warn!(participant_id = %participant_id, error = %e, "undecodable frame, closing session");
                                break;
                            }
                        };
                        // Identity and room are server-authoritative.
                        message.sender_id = participant_id.to_string();
                        message.room_id = room.id.clone();
                        router::dispatch(&state, &room, &participant, message).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong/binary
                    Some(Err(e)) => {
                        debug!(participant_id = %participant_id, error = %e, "read error");
                        break;
                    }
                }
            }
        }
    }

    // Departure fan-out runs on every exit path.
    room.remove(&participant_id);
    if sfu_active {
        state.sfu.remove(&participant_id).await;
    }
    router::broadcast_to_room(
        &room,
        SignalingMessage::participant_left(room.id.clone(), &participant_id),
        Some(&participant_id),
    );

    info!(room_id = %room.id, participant_id = %participant_id, "participant left");

    // Dropping our handle lets the writer drain whatever is queued and exit.
    drop(participant);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }
}

/// The single owner of the outbound frame writer. Exits once every sender is
/// gone and the queue is drained, or on the first transport failure.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::Receiver<SignalingMessage>,
    shutdown: CancellationToken,
) {
    while let Some(message) = outbox.recv().await {
        let frame = match serde_json::to_string(&message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode outbound message");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(frame)).await {
            debug!(error = %e, "websocket send failed");
            shutdown.cancel();
            break;
        }
    }
}
