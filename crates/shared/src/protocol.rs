use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{ChatType, MemberId, Room, RoomId};

/// REST envelope wrapping every response body: `{data, status, message}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            status: Some(200),
            message: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomSummary {
    pub chatroom_id: RoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u64>,
}

impl From<ChatRoomSummary> for Room {
    fn from(value: ChatRoomSummary) -> Self {
        Room {
            room_id: value.chatroom_id,
            last_message: value.last_message,
            roster_names: value.member_names,
            store_name: value.store_name,
            room_label: value.room_name,
        }
    }
}

/// A message frame as persisted by the history store and broadcast on the
/// live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub chatroom_id: RoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<MemberId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<MemberId>,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: ChatType,
    #[serde(
        default,
        with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub send_at: Option<NaiveDateTime>,
}

impl ChatMessage {
    /// Identity used to recognise the same persisted message arriving twice.
    pub fn dedup_key(&self) -> DedupKey<'_> {
        match &self.id {
            Some(id) => DedupKey::Id(id),
            None => DedupKey::Content {
                sender_id: self.sender_id,
                send_at: self.send_at,
                message: &self.message,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupKey<'a> {
    Id(&'a str),
    Content {
        sender_id: Option<MemberId>,
        send_at: Option<NaiveDateTime>,
        message: &'a str,
    },
}

/// Envelope posted by the client on the live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundChatMessage {
    pub sender_id: MemberId,
    pub sender_name: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ChatType,
    pub chatroom_id: RoomId,
    #[serde(
        default,
        with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub send_at: Option<NaiveDateTime>,
}

pub mod timestamp {
    //! `sendAt` arrives as RFC 3339, as a zone-less ISO-8601 date-time, or as a
    //! Jackson-style `[year, month, day, hour, minute, second, nanos]` array.
    //! Decoded values are local wall-clock time; offsets are converted.

    use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
    use serde::{de::IgnoredAny, Deserialize, Deserializer, Serializer};

    const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Text(String),
        Parts(Vec<i64>),
        Other(IgnoredAny),
    }

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format(WIRE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    /// Unrecognised values decode as `None` rather than rejecting the frame.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<RawTimestamp>::deserialize(deserializer)? {
            None => None,
            Some(RawTimestamp::Text(text)) => parse_text(&text),
            Some(RawTimestamp::Parts(parts)) => parse_parts(&parts),
            Some(RawTimestamp::Other(_)) => None,
        })
    }

    pub fn parse_text(text: &str) -> Option<NaiveDateTime> {
        let text = text.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
            return Some(ts.with_timezone(&Local).naive_local());
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
    }

    fn parse_parts(parts: &[i64]) -> Option<NaiveDateTime> {
        let field = |idx: usize| parts.get(idx).copied().unwrap_or(0);
        if parts.len() < 3 {
            return None;
        }
        let date = NaiveDate::from_ymd_opt(
            i32::try_from(field(0)).ok()?,
            u32::try_from(field(1)).ok()?,
            u32::try_from(field(2)).ok()?,
        )?;
        date.and_hms_nano_opt(
            u32::try_from(field(3)).ok()?,
            u32::try_from(field(4)).ok()?,
            u32::try_from(field(5)).ok()?,
            u32::try_from(field(6)).ok()?,
        )
    }
}
