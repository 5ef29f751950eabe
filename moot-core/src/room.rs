use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{ChatMessage, Participant, ParticipantId, ParticipantInfo, RoomMode};
use crate::{Error, Result};

/// A named grouping of participants sharing a signaling channel.
///
/// All state lives behind a single readers-writer lock; critical sections are
/// short and never perform I/O or serialization. Callers take snapshots and
/// release the lock before enqueuing messages, so admission and removal are
/// atomic with respect to concurrent membership observation.
pub struct Room {
    pub id: String,
    pub mode: RoomMode,
    inner: RwLock<RoomInner>,
}

struct RoomInner {
    participants: HashMap<ParticipantId, Arc<Participant>>,
    broadcaster: Option<ParticipantId>,
    chat_history: Vec<ChatMessage>,
}

impl Room {
    #[must_use]
    pub fn new(id: String, mode: RoomMode) -> Self {
        Self {
            id,
            mode,
            inner: RwLock::new(RoomInner {
                participants: HashMap::new(),
                broadcaster: None,
                chat_history: Vec::new(),
            }),
        }
    }

    /// Admit a participant, enforcing the room mode's policy:
    /// `OneToOne` caps membership at two, `Broadcasting` allows a single
    /// broadcaster, `ScreenSharing` has no cap.
    pub fn add(&self, participant: Arc<Participant>) -> Result<()> {
        let mut inner = self.inner.write();

        match self.mode {
            RoomMode::OneToOne => {
                if inner.participants.len() >= 2 {
                    return Err(Error::RoomFull);
                }
            }
            RoomMode::Broadcasting => {
                if participant.is_broadcaster {
                    if inner.broadcaster.is_some() {
                        return Err(Error::BroadcasterExists);
                    }
                    inner.broadcaster = Some(participant.id.clone());
                }
            }
            RoomMode::ScreenSharing => {}
        }

        inner.participants.insert(participant.id.clone(), participant);
        Ok(())
    }

    /// Remove a participant, clearing the broadcaster slot if it held them.
    /// Removing an absent id is a no-op.
    pub fn remove(&self, participant_id: &ParticipantId) {
        let mut inner = self.inner.write();
        if inner.participants.remove(participant_id).is_some()
            && inner.broadcaster.as_ref() == Some(participant_id)
        {
            inner.broadcaster = None;
        }
    }

    #[must_use]
    pub fn get(&self, participant_id: &ParticipantId) -> Option<Arc<Participant>> {
        self.inner.read().participants.get(participant_id).cloned()
    }

    /// Point-in-time snapshot of the participant set.
    #[must_use]
    pub fn participants(&self) -> Vec<Arc<Participant>> {
        self.inner.read().participants.values().cloned().collect()
    }

    /// Wire-ready participant snapshot for `room_info`.
    #[must_use]
    pub fn participant_infos(&self) -> Vec<ParticipantInfo> {
        self.inner
            .read()
            .participants
            .values()
            .map(|p| p.info(self.mode))
            .collect()
    }

    #[must_use]
    pub fn broadcaster(&self) -> Option<ParticipantId> {
        self.inner.read().broadcaster.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().participants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().participants.is_empty()
    }

    /// Append a chat message. History is strictly append-only; indices never
    /// shift.
    pub fn append_chat(&self, message: ChatMessage) {
        self.inner.write().chat_history.push(message);
    }

    #[must_use]
    pub fn chat_history(&self) -> Vec<ChatMessage> {
        self.inner.read().chat_history.clone()
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("participants", &self.len())
            .finish_non_exhaustive()
    }
}
