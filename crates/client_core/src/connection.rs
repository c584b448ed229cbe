use std::{sync::Arc, time::Duration};

use futures::{stream::BoxStream, StreamExt};
use shared::protocol::{ChatMessage, OutboundChatMessage};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    address::ChannelAddress,
    error::{ChatError, ChatResult},
    transport::{ChannelConnector, FrameSink, InboundFrame},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Message(ChatMessage),
    Closed { code: Option<u16>, reason: String },
    Failed(String),
}

/// Event stamped with the generation of the `open()` it arrived under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: ConnectionEvent,
}

pub struct OpenedConnection {
    pub generation: u64,
    pub events: mpsc::UnboundedReceiver<TaggedEvent>,
}

struct ConnectionInner {
    state: ConnectionState,
    generation: u64,
    address: Option<ChannelAddress>,
    sink: Option<Arc<dyn FrameSink>>,
    reader: Option<JoinHandle<()>>,
}

impl ConnectionInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.state == ConnectionState::Open
    }
}

/// The one live channel a session may hold. Reused across rooms; every
/// `open()` starts a new generation and frames from older generations are
/// never delivered.
pub struct RoomConnection {
    connector: Arc<dyn ChannelConnector>,
    ws_base_url: String,
    connect_timeout: Duration,
    inner: Arc<Mutex<ConnectionInner>>,
}

impl RoomConnection {
    pub fn new(
        connector: Arc<dyn ChannelConnector>,
        ws_base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            ws_base_url: ws_base_url.into().trim_end_matches('/').to_string(),
            connect_timeout,
            inner: Arc::new(Mutex::new(ConnectionInner {
                state: ConnectionState::Closed,
                generation: 0,
                address: None,
                sink: None,
                reader: None,
            })),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub async fn generation(&self) -> u64 {
        self.inner.lock().await.generation
    }

    pub async fn address(&self) -> Option<ChannelAddress> {
        self.inner.lock().await.address.clone()
    }

    pub fn channel_url(&self, address: &ChannelAddress) -> String {
        format!("{}/{address}", self.ws_base_url)
    }

    /// Connects to `address`. Fails with `AlreadyOpen` while a previous
    /// connection is still connecting or open.
    pub async fn open(&self, address: &ChannelAddress) -> ChatResult<OpenedConnection> {
        let generation = {
            let mut guard = self.inner.lock().await;
            if matches!(
                guard.state,
                ConnectionState::Connecting | ConnectionState::Open
            ) {
                return Err(ChatError::AlreadyOpen);
            }
            guard.generation += 1;
            guard.state = ConnectionState::Connecting;
            guard.address = Some(address.clone());
            guard.generation
        };

        let url = self.channel_url(address);
        info!(generation, address = %address, "chat: connecting room channel");

        let link = match tokio::time::timeout(self.connect_timeout, self.connector.connect(&url))
            .await
        {
            Ok(Ok(link)) => link,
            Ok(Err(err)) => {
                self.mark_failed(generation).await;
                warn!(generation, address = %address, "chat: room channel connect failed: {err:#}");
                return Err(ChatError::ConnectFailed(format!("{err:#}")));
            }
            Err(_) => {
                self.mark_failed(generation).await;
                warn!(generation, address = %address, "chat: room channel connect timed out");
                return Err(ChatError::ConnectTimeout(
                    u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX),
                ));
            }
        };

        let sink: Arc<dyn FrameSink> = Arc::from(link.sink);
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut guard = self.inner.lock().await;
            if guard.generation != generation || guard.state != ConnectionState::Connecting {
                drop(guard);
                debug!(generation, "chat: connection closed during handshake");
                sink.close().await.ok();
                return Err(ChatError::ConnectFailed(
                    "connection was closed before the handshake completed".into(),
                ));
            }
            guard.state = ConnectionState::Open;
            guard.sink = Some(Arc::clone(&sink));
            guard.reader = Some(tokio::spawn(read_frames(
                Arc::clone(&self.inner),
                generation,
                link.frames,
                tx,
            )));
        }

        info!(generation, address = %address, "chat: room channel open");
        Ok(OpenedConnection {
            generation,
            events: rx,
        })
    }

    pub async fn send(&self, message: &OutboundChatMessage) -> ChatResult<()> {
        let sink = {
            let guard = self.inner.lock().await;
            if guard.state != ConnectionState::Open {
                return Err(ChatError::NotConnected);
            }
            guard.sink.clone().ok_or(ChatError::NotConnected)?
        };

        let payload =
            serde_json::to_string(message).map_err(|err| ChatError::SendFailed(err.to_string()))?;
        sink.send_text(payload)
            .await
            .map_err(|err| ChatError::SendFailed(format!("{err:#}")))
    }

    /// Stops delivery from the current generation before returning. Closing a
    /// closed connection does nothing.
    pub async fn close(&self) {
        let (generation, sink, reader) = {
            let mut guard = self.inner.lock().await;
            if guard.state == ConnectionState::Closed && guard.sink.is_none() {
                return;
            }
            guard.state = ConnectionState::Closed;
            guard.address = None;
            (guard.generation, guard.sink.take(), guard.reader.take())
        };

        if let Some(reader) = reader {
            reader.abort();
        }
        if let Some(sink) = sink {
            match tokio::time::timeout(self.connect_timeout, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!(generation, "chat: close frame not delivered: {err:#}"),
                Err(_) => debug!(generation, "chat: close frame timed out"),
            }
        }
        info!(generation, "chat: room channel closed");
    }

    async fn mark_failed(&self, generation: u64) {
        let mut guard = self.inner.lock().await;
        if guard.generation == generation && guard.state == ConnectionState::Connecting {
            guard.state = ConnectionState::Error;
        }
    }
}

impl Drop for RoomConnection {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.inner.try_lock() {
            if let Some(reader) = guard.reader.take() {
                reader.abort();
            }
        }
    }
}

/// Moves the current generation to a terminal state. Returns false when the
/// generation was already superseded or closed.
async fn finish(
    inner: &Mutex<ConnectionInner>,
    generation: u64,
    terminal: ConnectionState,
) -> bool {
    let mut guard = inner.lock().await;
    if !guard.is_current(generation) {
        return false;
    }
    guard.state = terminal;
    guard.sink = None;
    guard.reader = None;
    true
}

async fn read_frames(
    inner: Arc<Mutex<ConnectionInner>>,
    generation: u64,
    mut frames: BoxStream<'static, anyhow::Result<InboundFrame>>,
    tx: mpsc::UnboundedSender<TaggedEvent>,
) {
    while let Some(frame) = frames.next().await {
        let event = match frame {
            Ok(InboundFrame::Text(text)) => match serde_json::from_str::<ChatMessage>(&text) {
                Ok(message) => {
                    if !inner.lock().await.is_current(generation) {
                        return;
                    }
                    ConnectionEvent::Message(message)
                }
                Err(err) => {
                    warn!(generation, "chat: dropping malformed frame: {err}");
                    continue;
                }
            },
            Ok(InboundFrame::Closed { code, reason }) => {
                if !finish(&inner, generation, ConnectionState::Closed).await {
                    return;
                }
                info!(generation, ?code, %reason, "chat: room channel closed by peer");
                let _ = tx.send(TaggedEvent {
                    generation,
                    event: ConnectionEvent::Closed { code, reason },
                });
                return;
            }
            Err(err) => {
                if !finish(&inner, generation, ConnectionState::Error).await {
                    return;
                }
                warn!(generation, "chat: room channel failed: {err:#}");
                let _ = tx.send(TaggedEvent {
                    generation,
                    event: ConnectionEvent::Failed(format!("{err:#}")),
                });
                return;
            }
        };

        if tx.send(TaggedEvent { generation, event }).is_err() {
            return;
        }
    }

    if finish(&inner, generation, ConnectionState::Closed).await {
        info!(generation, "chat: room channel stream ended");
        let _ = tx.send(TaggedEvent {
            generation,
            event: ConnectionEvent::Closed {
                code: None,
                reason: "stream ended".into(),
            },
        });
    }
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
