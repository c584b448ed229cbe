use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);
    };
}

id_newtype!(MemberId);

pub const PERSONAL_ROOM_PREFIX: &str = "personal_";
pub const ADMIN_ROOM_PREFIX: &str = "admin_";

/// Label shown for the platform administrator side of an admin room.
pub const ADMINISTRATOR_LABEL: &str = "관리자";

/// The authenticated actor. Supplied by the host application after login and
/// never changed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub member_id: MemberId,
    pub display_name: String,
}

impl Identity {
    pub fn new(member_id: i64, display_name: impl Into<String>) -> Self {
        Self {
            member_id: MemberId(member_id),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomKind {
    Personal,
    Admin,
    Generic,
}

/// Message category carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatType {
    #[default]
    Personal,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> RoomKind {
        if self.0.starts_with(ADMIN_ROOM_PREFIX) {
            RoomKind::Admin
        } else if self.0.starts_with(PERSONAL_ROOM_PREFIX) {
            RoomKind::Personal
        } else {
            RoomKind::Generic
        }
    }

    /// `PERSONAL` for personal-shaped ids, `ADMIN` for everything else.
    pub fn chat_type(&self) -> ChatType {
        match self.kind() {
            RoomKind::Personal => ChatType::Personal,
            RoomKind::Admin | RoomKind::Generic => ChatType::Admin,
        }
    }

    /// Splits `personal_<owner>_<partner>` into `(owner, partner)`.
    ///
    /// Returns `None` for non-personal ids and for name parts that do not split
    /// into exactly two segments (a display name containing `_` is ambiguous).
    pub fn personal_names(&self) -> Option<(&str, &str)> {
        let names = self.0.strip_prefix(PERSONAL_ROOM_PREFIX)?;
        let mut segments = names.split('_');
        let owner = segments.next()?;
        let partner = segments.next()?;
        if segments.next().is_some() {
            return None;
        }
        Some((owner, partner))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Directory entry as surfaced to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub room_id: RoomId,
    pub last_message: Option<String>,
    pub roster_names: Option<Vec<String>>,
    pub store_name: Option<String>,
    pub room_label: Option<String>,
}

impl Room {
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        Self {
            room_id: room_id.into(),
            last_message: None,
            roster_names: None,
            store_name: None,
            room_label: None,
        }
    }
}
