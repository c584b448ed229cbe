use thiserror::Error;

use crate::protocol::ApiResponse;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("channel address is empty")]
    Empty,
    #[error("channel address is not valid base64: {0}")]
    NotBase64(String),
    #[error("channel address does not decode to UTF-8: {0}")]
    NotUtf8(String),
}

/// Failure reported inside a REST envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upstream status {status:?}: {message}")]
pub struct UpstreamError {
    pub status: Option<i32>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl<T> From<&ApiResponse<T>> for UpstreamError {
    fn from(value: &ApiResponse<T>) -> Self {
        Self {
            status: value.status,
            message: value
                .message
                .clone()
                .unwrap_or_else(|| "response carried no data".to_string()),
        }
    }
}
