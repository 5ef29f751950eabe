use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

use crate::models::RoomMode;
use crate::room::Room;

/// Name to room mapping.
///
/// Admission follows the get-or-create pattern: the first join under a name
/// creates the room and fixes its mode; later joins reuse the existing room
/// regardless of the mode they carry.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a room, creating it with the supplied mode if absent. The mode
    /// of an existing room is never reconfigured.
    #[must_use]
    pub fn get_or_create(&self, room_id: &str, mode: RoomMode) -> Arc<Room> {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                info!(room_id, mode = %mode, "created room");
                Arc::new(Room::new(room_id.to_string(), mode))
            })
            .clone()
    }

    #[must_use]
    pub fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn exists(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn delete(&self, room_id: &str) {
        if self.rooms.remove(room_id).is_some() {
            info!(room_id, "deleted room");
        }
    }

    #[must_use]
    pub fn list_by_mode(&self, mode: RoomMode) -> Vec<Arc<Room>> {
        self.rooms
            .iter()
            .filter(|entry| entry.value().mode == mode)
            .map(|entry| entry.value().clone())
            .collect()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drop rooms that have no participants left. Emptiness is re-checked
    /// under the map entry so a concurrent join is never lost.
    pub fn remove_empty(&self) -> usize {
        let candidates: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for room_id in candidates {
            if self
                .rooms
                .remove_if(&room_id, |_, room| room.is_empty())
                .is_some()
            {
                debug!(room_id = %room_id, "removed empty room");
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, remaining = self.rooms.len(), "cleaned up empty rooms");
        }
        removed
    }

    /// Background loop sweeping empty rooms on a fixed cadence.
    pub async fn cleanup_task(self: Arc<Self>, period: Duration) {
        let mut ticker = interval(period);
        info!(period_secs = period.as_secs(), "starting room cleanup task");
        loop {
            ticker.tick().await;
            self.remove_empty();
        }
    }
}
