use shared::error::AddressError;
use thiserror::Error;

/// Failures surfaced by the messaging core. None of them is fatal to the host
/// process; each is scoped to the directory or to the current room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("chat room directory is unavailable: {0}")]
    DirectoryUnavailable(String),
    #[error("chat history is unavailable: {0}")]
    HistoryUnavailable(String),
    #[error("failed to connect to chat room: {0}")]
    ConnectFailed(String),
    #[error("timed out connecting to chat room after {0} ms")]
    ConnectTimeout(u64),
    #[error("chat connection was lost: {0}")]
    ConnectionLost(String),
    #[error("chat connection is not open")]
    NotConnected,
    #[error("chat connection is already open; close it first")]
    AlreadyOpen,
    #[error("message is empty")]
    EmptyMessage,
    #[error("no chat room selected")]
    NoActiveRoom,
    #[error("failed to send message: {0}")]
    SendFailed(String),
    #[error("read receipt was not recorded: {0}")]
    ReadReceiptFailed(String),
    #[error("invalid channel address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ChatError {
    /// Whether the presentation layer must show this failure to the user.
    /// History failures only degrade the room to live-only mode.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, ChatError::HistoryUnavailable(_))
    }
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;
