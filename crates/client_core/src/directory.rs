use std::sync::Arc;

use shared::domain::{Identity, Room, RoomId};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::{
    error::{ChatError, ChatResult},
    resolver, DirectoryBackend,
};

/// Rooms visible to one identity. Owns the listing; the only mutation after a
/// load is [`RoomDirectory::apply_live_update`].
pub struct RoomDirectory {
    backend: Arc<dyn DirectoryBackend>,
    store_url: Option<String>,
    rooms: RwLock<Vec<Room>>,
}

impl RoomDirectory {
    pub fn new(backend: Arc<dyn DirectoryBackend>, store_url: Option<String>) -> Self {
        Self {
            backend,
            store_url,
            rooms: RwLock::new(Vec::new()),
        }
    }

    /// Replaces the listing with the personal rooms owned by `identity`.
    /// On failure the previous listing is kept and `DirectoryUnavailable`
    /// is returned; it is never turned into an empty list.
    pub async fn load(&self, identity: &Identity) -> ChatResult<Vec<Room>> {
        let summaries = self
            .backend
            .fetch_rooms(identity.member_id, self.store_url.as_deref())
            .await
            .map_err(|err| {
                error!(
                    member_id = identity.member_id.0,
                    "chat: room directory load failed: {err:#}"
                );
                ChatError::DirectoryUnavailable(format!("{err:#}"))
            })?;

        let total = summaries.len();
        let rooms = owned_personal_rooms(summaries.into_iter().map(Room::from), identity);
        info!(
            member_id = identity.member_id.0,
            total,
            visible = rooms.len(),
            "chat: room directory loaded"
        );

        *self.rooms.write().await = rooms.clone();
        Ok(rooms)
    }

    pub async fn rooms(&self) -> Vec<Room> {
        self.rooms.read().await.clone()
    }

    pub async fn get(&self, room_id: &RoomId) -> Option<Room> {
        self.rooms
            .read()
            .await
            .iter()
            .find(|room| &room.room_id == room_id)
            .cloned()
    }

    /// Sets `last_message` on the matching entry in place. Returns false when
    /// the room is not listed.
    pub async fn apply_live_update(&self, room_id: &RoomId, last_message: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms.iter_mut().find(|room| &room.room_id == room_id) {
            Some(room) => {
                room.last_message = Some(last_message.to_string());
                true
            }
            None => false,
        }
    }

    pub async fn search(&self, query: &str, identity: &Identity) -> Vec<Room> {
        filter_rooms(&self.rooms.read().await, query, identity)
    }
}

/// Keeps `personal_<owner>_<partner>` rooms whose owner is `identity`.
pub fn owned_personal_rooms(
    rooms: impl IntoIterator<Item = Room>,
    identity: &Identity,
) -> Vec<Room> {
    rooms
        .into_iter()
        .filter(|room| {
            room.room_id
                .personal_names()
                .is_some_and(|(owner, _)| owner == identity.display_name)
        })
        .collect()
}

/// Case-insensitive substring match over each room's resolved label. An empty
/// query keeps every room.
pub fn filter_rooms(rooms: &[Room], query: &str, identity: &Identity) -> Vec<Room> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rooms.to_vec();
    }
    rooms
        .iter()
        .filter(|room| {
            resolver::resolve(room, identity)
                .trim()
                .to_lowercase()
                .contains(&needle)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "tests/directory_tests.rs"]
mod tests;
