use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::MemberId,
    protocol::{ChatMessage, ChatRoomSummary},
};

pub mod address;
pub mod api;
pub mod config;
pub mod connection;
pub mod directory;
pub mod display;
pub mod error;
pub mod resolver;
pub mod session;
pub mod transport;

pub use address::ChannelAddress;
pub use api::HttpChatApi;
pub use config::{load_settings, ClientSettings};
pub use connection::{ConnectionEvent, ConnectionState, OpenedConnection, RoomConnection};
pub use directory::RoomDirectory;
pub use display::{DisplayMessage, MessageClass};
pub use error::{ChatError, ChatResult};
pub use session::{ConversationSession, SessionEvent};
pub use transport::{ChannelConnector, WebSocketConnector};

/// Upstream room listing for one member.
#[async_trait]
pub trait DirectoryBackend: Send + Sync {
    async fn fetch_rooms(
        &self,
        member_id: MemberId,
        store_url: Option<&str>,
    ) -> Result<Vec<ChatRoomSummary>>;
}

/// Persisted message history, keyed by encoded room address.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Messages in the store's own order.
    async fn fetch_history(&self, address: &ChannelAddress) -> Result<Vec<ChatMessage>>;
    async fn mark_read(&self, address: &ChannelAddress, member_id: MemberId) -> Result<()>;
}

pub struct MissingDirectoryBackend;

#[async_trait]
impl DirectoryBackend for MissingDirectoryBackend {
    async fn fetch_rooms(
        &self,
        member_id: MemberId,
        _store_url: Option<&str>,
    ) -> Result<Vec<ChatRoomSummary>> {
        Err(anyhow!(
            "room directory backend unavailable for member {}",
            member_id.0
        ))
    }
}

pub struct MissingHistoryStore;

#[async_trait]
impl HistoryStore for MissingHistoryStore {
    async fn fetch_history(&self, address: &ChannelAddress) -> Result<Vec<ChatMessage>> {
        Err(anyhow!("history store unavailable for {address}"))
    }

    async fn mark_read(&self, address: &ChannelAddress, _member_id: MemberId) -> Result<()> {
        Err(anyhow!("history store unavailable for {address}"))
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod api_tests;
