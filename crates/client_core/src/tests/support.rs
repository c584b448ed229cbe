//! In-memory doubles for the transport, directory and history seams.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex as StdMutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use shared::{
    domain::{ChatType, MemberId, RoomId},
    protocol::{ChatMessage, ChatRoomSummary},
};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};

use crate::{
    address::ChannelAddress,
    session::SessionEvent,
    transport::{ChannelConnector, ChannelLink, FrameSink, InboundFrame},
    DirectoryBackend, HistoryStore,
};

pub fn chat_message(room: &str, sender_id: i64, body: &str) -> ChatMessage {
    ChatMessage {
        id: None,
        chatroom_id: RoomId::from(room),
        sender_id: Some(MemberId(sender_id)),
        receiver_id: None,
        sender_name: format!("member-{sender_id}"),
        message: body.to_string(),
        kind: ChatType::Personal,
        send_at: None,
    }
}

pub fn with_id(mut message: ChatMessage, id: &str) -> ChatMessage {
    message.id = Some(id.to_string());
    message
}

/// Server side of one in-memory channel.
#[derive(Clone)]
pub struct MemoryPeer {
    pub url: String,
    frames: mpsc::UnboundedSender<Result<InboundFrame>>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl MemoryPeer {
    pub fn push(&self, message: &ChatMessage) {
        let text = serde_json::to_string(message).expect("serialize frame");
        let _ = self.frames.send(Ok(InboundFrame::Text(text)));
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.frames.send(Ok(InboundFrame::Text(text.to_string())));
    }

    pub fn hang_up(&self) {
        let _ = self.frames.send(Ok(InboundFrame::Closed {
            code: Some(1000),
            reason: "bye".into(),
        }));
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.frames.send(Err(anyhow!(reason.to_string())));
    }

    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MemorySink {
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&self, text: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(anyhow!("sink closed"));
        }
        self.sent.lock().expect("sent lock").push(text);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    Accept,
    Refuse,
    Hang,
}

#[derive(Default)]
pub struct MemoryConnector {
    peers: StdMutex<Vec<MemoryPeer>>,
    scripted: StdMutex<VecDeque<ConnectBehavior>>,
    pub connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, behavior: ConnectBehavior) {
        self.scripted.lock().expect("script lock").push_back(behavior);
    }

    pub fn peer(&self, index: usize) -> MemoryPeer {
        self.peers.lock().expect("peers lock")[index].clone()
    }

    pub fn last_peer(&self) -> MemoryPeer {
        self.peers
            .lock()
            .expect("peers lock")
            .last()
            .cloned()
            .expect("at least one connection")
    }

    pub fn open_peers(&self) -> usize {
        self.peers
            .lock()
            .expect("peers lock")
            .iter()
            .filter(|peer| !peer.is_closed())
            .count()
    }
}

#[async_trait]
impl ChannelConnector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<ChannelLink> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .scripted
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(ConnectBehavior::Accept);
        match behavior {
            ConnectBehavior::Accept => {}
            ConnectBehavior::Refuse => return Err(anyhow!("connection refused")),
            ConnectBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Err(anyhow!("unreachable"));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        self.peers.lock().expect("peers lock").push(MemoryPeer {
            url: url.to_string(),
            frames: tx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        });

        let frames = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();

        Ok(ChannelLink {
            sink: Box::new(MemorySink { sent, closed }),
            frames,
        })
    }
}

pub struct StaticDirectory {
    rooms: StdMutex<Option<Vec<ChatRoomSummary>>>,
    pub requests: StdMutex<Vec<(MemberId, Option<String>)>>,
}

impl StaticDirectory {
    pub fn with_rooms(ids: &[&str]) -> Arc<Self> {
        let rooms = ids
            .iter()
            .map(|id| ChatRoomSummary {
                chatroom_id: RoomId::from(*id),
                member_names: None,
                store_name: None,
                last_message: None,
                room_name: None,
                unread_count: None,
            })
            .collect();
        Arc::new(Self {
            rooms: StdMutex::new(Some(rooms)),
            requests: StdMutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            rooms: StdMutex::new(None),
            requests: StdMutex::new(Vec::new()),
        })
    }

    pub fn start_failing(&self) {
        *self.rooms.lock().expect("rooms lock") = None;
    }
}

#[async_trait]
impl DirectoryBackend for StaticDirectory {
    async fn fetch_rooms(
        &self,
        member_id: MemberId,
        store_url: Option<&str>,
    ) -> Result<Vec<ChatRoomSummary>> {
        self.requests
            .lock()
            .expect("requests lock")
            .push((member_id, store_url.map(str::to_string)));
        self.rooms
            .lock()
            .expect("rooms lock")
            .clone()
            .ok_or_else(|| anyhow!("listing endpoint returned 500"))
    }
}

/// History store whose responses are released by the test, one per fetch.
#[derive(Default)]
pub struct GatedHistory {
    pending: Mutex<VecDeque<oneshot::Sender<Result<Vec<ChatMessage>>>>>,
    pub requested: StdMutex<Vec<String>>,
    pub read_receipts: StdMutex<Vec<(String, MemberId)>>,
}

impl GatedHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Resolves the newest fetch that is still being awaited. Fetches whose
    /// task was aborted by a room switch are skipped.
    pub async fn release(&self, result: Result<Vec<ChatMessage>>) {
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let mut pending = self.pending.lock().await;
            while let Some(tx) = pending.pop_back() {
                if !tx.is_closed() {
                    let _ = tx.send(result);
                    return;
                }
            }
        }
        panic!("no history fetch was requested");
    }
}

#[async_trait]
impl HistoryStore for GatedHistory {
    async fn fetch_history(&self, address: &ChannelAddress) -> Result<Vec<ChatMessage>> {
        self.requested
            .lock()
            .expect("requested lock")
            .push(address.to_string());
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.push_back(tx);
        rx.await.map_err(|_| anyhow!("history request abandoned"))?
    }

    async fn mark_read(&self, address: &ChannelAddress, member_id: MemberId) -> Result<()> {
        self.read_receipts
            .lock()
            .expect("receipts lock")
            .push((address.to_string(), member_id));
        Ok(())
    }
}

/// Skips session events until one satisfies `wanted`.
pub async fn wait_for(
    events: &mut broadcast::Receiver<SessionEvent>,
    wanted: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(event) if wanted(&event) => return event,
                Ok(_) => continue,
                Err(err) => panic!("event stream ended: {err}"),
            }
        }
    })
    .await
    .expect("event arrived in time")
}
