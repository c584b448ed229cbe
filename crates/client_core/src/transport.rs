use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{
    stream::{BoxStream, SplitSink},
    SinkExt, StreamExt,
};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

/// Inbound item read from a live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Closed { code: Option<u16>, reason: String },
}

/// Outbound half of an established live channel.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send_text(&self, text: String) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

pub struct ChannelLink {
    pub sink: Box<dyn FrameSink>,
    pub frames: BoxStream<'static, Result<InboundFrame>>,
}

/// Opens a persistent bidirectional channel to `url`. Resolves once the
/// handshake is confirmed.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<ChannelLink>;
}

pub struct MissingChannelConnector;

#[async_trait]
impl ChannelConnector for MissingChannelConnector {
    async fn connect(&self, url: &str) -> Result<ChannelLink> {
        Err(anyhow!("live channel transport is unavailable for {url}"))
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketConnector;

struct WebSocketSink {
    writer: Mutex<SplitSink<WsStream, Message>>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&self, text: String) -> Result<()> {
        self.writer
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .context("websocket send failed")
    }

    async fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.send(Message::Close(None)).await {
            debug!("websocket close frame not delivered: {err}");
        }
        writer.close().await.ok();
        Ok(())
    }
}

#[async_trait]
impl ChannelConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<ChannelLink> {
        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect websocket: {url}"))?;
        let (writer, reader) = ws_stream.split();

        let frames = reader
            .filter_map(|msg| async move {
                match msg {
                    Ok(Message::Text(text)) => Some(Ok(InboundFrame::Text(text))),
                    Ok(Message::Close(frame)) => Some(Ok(match frame {
                        Some(frame) => InboundFrame::Closed {
                            code: Some(u16::from(frame.code)),
                            reason: frame.reason.to_string(),
                        },
                        None => InboundFrame::Closed {
                            code: None,
                            reason: String::new(),
                        },
                    })),
                    Ok(_) => None,
                    Err(err) => Some(Err(anyhow!("websocket receive failed: {err}"))),
                }
            })
            .boxed();

        Ok(ChannelLink {
            sink: Box::new(WebSocketSink {
                writer: Mutex::new(writer),
            }),
            frames,
        })
    }
}
