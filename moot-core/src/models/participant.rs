use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::message::SignalingMessage;
use crate::models::{ConnectionInfo, ParticipantId, RoomMode};

/// Soft bound on a participant's outbound queue. A producer that finds the
/// queue full marks the session slow and cancels it.
pub const OUTBOX_CAPACITY: usize = 1024;

/// One connected client in one room.
///
/// The `sender` half feeds the participant's dedicated writer task, which is
/// the only owner of the underlying frame writer. Other sessions deliver
/// messages into this participant exclusively through [`Participant::enqueue`].
pub struct Participant {
    pub id: ParticipantId,
    pub username: String,
    pub is_broadcaster: bool,
    screen_share: AtomicBool,
    sender: mpsc::Sender<SignalingMessage>,
    shutdown: CancellationToken,
}

impl Participant {
    #[must_use]
    pub fn new(
        id: ParticipantId,
        username: String,
        is_broadcaster: bool,
        is_screen_share: bool,
        sender: mpsc::Sender<SignalingMessage>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            username,
            is_broadcaster,
            screen_share: AtomicBool::new(is_screen_share),
            sender,
            shutdown,
        }
    }

    #[must_use]
    pub fn is_screen_share(&self) -> bool {
        self.screen_share.load(Ordering::Relaxed)
    }

    pub fn set_screen_share(&self, active: bool) {
        self.screen_share.store(active, Ordering::Relaxed);
    }

    /// Queue a message for delivery to this participant.
    ///
    /// Never blocks. A full queue means the client is not keeping up with the
    /// fan-out; the session is cancelled and will run its departure path. A
    /// closed queue means the session is already shutting down.
    pub fn enqueue(&self, message: SignalingMessage) {
        match self.sender.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    participant_id = %self.id,
                    "outbound queue full, closing slow session"
                );
                self.shutdown.cancel();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(participant_id = %self.id, "dropping message for closing session");
            }
        }
    }

    /// Snapshot of the participant for `room_info` payloads.
    #[must_use]
    pub fn info(&self, mode: RoomMode) -> ParticipantInfo {
        ParticipantInfo {
            id: self.id.to_string(),
            username: self.username.clone(),
            connection_info: ConnectionInfo {
                mode,
                is_broadcaster: self.is_broadcaster,
                is_screen_share: self.is_screen_share(),
            },
        }
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("is_broadcaster", &self.is_broadcaster)
            .field("is_screen_share", &self.is_screen_share())
            .finish_non_exhaustive()
    }
}

/// Wire representation of a participant inside `room_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: String,
    pub username: String,
    #[serde(rename = "connectionInfo")]
    pub connection_info: ConnectionInfo,
}

/// A chat message appended to a room's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    /// Unix seconds.
    pub timestamp: i64,
}
