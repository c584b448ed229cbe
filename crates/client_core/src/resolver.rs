use shared::domain::{Identity, Room, RoomKind, ADMINISTRATOR_LABEL};

pub const UNKNOWN_USER_LABEL: &str = "알 수 없는 사용자";
pub const GENERIC_ROOM_LABEL: &str = "채팅방";

/// Human-readable counterpart label for `room` as seen by `identity`.
/// Pure; recompute on every render.
pub fn resolve(room: &Room, identity: &Identity) -> String {
    match room.room_id.kind() {
        RoomKind::Admin => return ADMINISTRATOR_LABEL.to_string(),
        RoomKind::Personal => {
            if let Some((owner, partner)) = room.room_id.personal_names() {
                if owner == identity.display_name {
                    return partner.to_string();
                }
            }
        }
        RoomKind::Generic => {}
    }

    if let Some(roster) = &room.roster_names {
        return roster
            .iter()
            .find(|name| **name != identity.display_name)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_USER_LABEL.to_string());
    }

    room.store_name
        .clone()
        .or_else(|| room.room_label.clone())
        .unwrap_or_else(|| GENERIC_ROOM_LABEL.to_string())
}

#[cfg(test)]
#[path = "tests/resolver_tests.rs"]
mod tests;
