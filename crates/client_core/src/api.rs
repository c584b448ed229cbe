use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::MemberId,
    error::UpstreamError,
    protocol::{ApiResponse, ChatMessage, ChatRoomSummary},
};

use crate::{address::ChannelAddress, config::ClientSettings, DirectoryBackend, HistoryStore};

/// REST client for the marketplace chat endpoints.
#[derive(Clone)]
pub struct HttpChatApi {
    http: Client,
    api_base_url: String,
}

#[derive(Serialize)]
struct RoomsQuery<'a> {
    #[serde(rename = "storeUrl", skip_serializing_if = "Option::is_none")]
    store_url: Option<&'a str>,
}

#[derive(Serialize)]
struct ReadQuery<'a> {
    #[serde(rename = "chatroomId")]
    chatroom_id: &'a str,
    #[serde(rename = "memberId")]
    member_id: i64,
}

impl HttpChatApi {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self::new(settings.api_base_url())
    }

    async fn get_envelope<T, Q>(&self, path: &str, query: &Q) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let envelope = self
            .http
            .get(format!("{}{path}", self.api_base_url))
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json::<ApiResponse<T>>()
            .await?;
        Ok(envelope)
    }
}

#[async_trait]
impl DirectoryBackend for HttpChatApi {
    async fn fetch_rooms(
        &self,
        member_id: MemberId,
        store_url: Option<&str>,
    ) -> Result<Vec<ChatRoomSummary>> {
        let envelope: ApiResponse<Vec<ChatRoomSummary>> = self
            .get_envelope(
                &format!("/chat/rooms/{}", member_id.0),
                &RoomsQuery { store_url },
            )
            .await?;
        match envelope.data {
            Some(rooms) => Ok(rooms),
            None => Err(anyhow!(UpstreamError::from(&envelope))),
        }
    }
}

#[async_trait]
impl HistoryStore for HttpChatApi {
    async fn fetch_history(&self, address: &ChannelAddress) -> Result<Vec<ChatMessage>> {
        let envelope: ApiResponse<Vec<ChatMessage>> = self
            .get_envelope(&format!("/chat/history/{address}"), &[] as &[(&str, &str)])
            .await?;
        // An empty history comes back with `data: null` and a not-found code.
        Ok(envelope.data.unwrap_or_default())
    }

    async fn mark_read(&self, address: &ChannelAddress, member_id: MemberId) -> Result<()> {
        self.http
            .put(format!("{}/chat/read", self.api_base_url))
            .query(&ReadQuery {
                chatroom_id: address.as_str(),
                member_id: member_id.0,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
