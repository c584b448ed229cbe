use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use shared::{
    domain::{Identity, Room, RoomId},
    protocol::{ChatMessage, DedupKey, OutboundChatMessage},
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    address::{decode, encode, ChannelAddress},
    api::HttpChatApi,
    config::ClientSettings,
    connection::{ConnectionEvent, ConnectionState, OpenedConnection, RoomConnection, TaggedEvent},
    directory::RoomDirectory,
    display::DisplayMessage,
    error::{ChatError, ChatResult},
    transport::WebSocketConnector,
    HistoryStore,
};

const EVENT_CAPACITY: usize = 256;

/// Notifications for the presentation layer. After `HistoryLoaded` or
/// `HistoryUnavailable` the whole sequence should be re-read through
/// [`ConversationSession::messages`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    RoomSelected(RoomId),
    MessageAppended(ChatMessage),
    HistoryLoaded { room_id: RoomId, count: usize },
    /// Carries `ChatError::HistoryUnavailable`; the room continues live-only.
    HistoryUnavailable { room_id: RoomId, error: ChatError },
    ConnectionStateChanged(ConnectionState),
    DirectoryUpdated(RoomId),
    Error(ChatError),
}

enum FeedMode {
    Idle,
    /// History is in flight; live frames wait here.
    Backfilling(Vec<ChatMessage>),
    Live,
}

struct SessionState {
    active_room: Option<RoomId>,
    generation: Option<u64>,
    feed: FeedMode,
    messages: Vec<ChatMessage>,
    pump: Option<JoinHandle<()>>,
    backfill: Option<JoinHandle<()>>,
}

/// One operator's view of the chat: the active room, its message sequence
/// and the single live connection feeding it.
pub struct ConversationSession {
    identity: Identity,
    directory: Arc<RoomDirectory>,
    history: Arc<dyn HistoryStore>,
    connection: RoomConnection,
    selection: Mutex<()>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl ConversationSession {
    pub fn new(
        identity: Identity,
        directory: Arc<RoomDirectory>,
        history: Arc<dyn HistoryStore>,
        connection: RoomConnection,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            identity,
            directory,
            history,
            connection,
            selection: Mutex::new(()),
            state: Mutex::new(SessionState {
                active_room: None,
                generation: None,
                feed: FeedMode::Idle,
                messages: Vec::new(),
                pump: None,
                backfill: None,
            }),
            events,
        })
    }

    /// Wires the REST api and the WebSocket transport from `settings`.
    pub fn from_settings(identity: Identity, settings: &ClientSettings) -> ChatResult<Arc<Self>> {
        let api = Arc::new(HttpChatApi::from_settings(settings));
        let directory = Arc::new(RoomDirectory::new(api.clone(), settings.store_url.clone()));
        let connection = RoomConnection::new(
            Arc::new(WebSocketConnector),
            settings.ws_base_url()?,
            settings.connect_timeout(),
        );
        Ok(Self::new(identity, directory, api, connection))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn directory(&self) -> &Arc<RoomDirectory> {
        &self.directory
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn active_room_id(&self) -> Option<RoomId> {
        self.state.lock().await.active_room.clone()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.state().await
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().await.messages.clone()
    }

    pub async fn display_messages(&self) -> Vec<DisplayMessage> {
        self.state
            .lock()
            .await
            .messages
            .iter()
            .map(|message| DisplayMessage::new(message, &self.identity))
            .collect()
    }

    pub async fn load_directory(&self) -> ChatResult<Vec<Room>> {
        self.directory.load(&self.identity).await.map_err(|err| {
            self.emit(SessionEvent::Error(err.clone()));
            err
        })
    }

    pub async fn search_rooms(&self, query: &str) -> Vec<Room> {
        self.directory.search(query, &self.identity).await
    }

    /// Makes `room_id` the active room. Any previous connection is closed and
    /// its sequence cleared before the new connection is opened. Selections
    /// are serialized per session.
    pub async fn select_room(self: &Arc<Self>, room_id: RoomId) -> ChatResult<()> {
        let _selection = self.selection.lock().await;
        if let Some(previous) = self.detach_active().await {
            debug!(room_id = %previous, "chat: left room");
        }

        self.state.lock().await.active_room = Some(room_id.clone());
        info!(room_id = %room_id, "chat: room selected");
        self.emit(SessionEvent::RoomSelected(room_id.clone()));
        self.emit(SessionEvent::ConnectionStateChanged(ConnectionState::Connecting));

        let address = encode(&room_id);
        let OpenedConnection { generation, events } = match self.connection.open(&address).await
        {
            Ok(opened) => opened,
            Err(err) => {
                self.emit(SessionEvent::ConnectionStateChanged(
                    self.connection.state().await,
                ));
                self.emit(SessionEvent::Error(err.clone()));
                return Err(err);
            }
        };

        let mut state = self.state.lock().await;
        state.generation = Some(generation);
        state.feed = FeedMode::Backfilling(Vec::new());
        self.emit(SessionEvent::ConnectionStateChanged(ConnectionState::Open));
        state.pump = Some(tokio::spawn(pump_events(Arc::downgrade(self), events)));
        state.backfill = Some(tokio::spawn(run_backfill(
            Arc::downgrade(self),
            Arc::clone(&self.history),
            address,
            generation,
        )));
        Ok(())
    }

    /// Selects the room behind a channel address, as carried in shared links.
    pub async fn select_address(self: &Arc<Self>, address: &str) -> ChatResult<()> {
        let room_id = match decode(address) {
            Ok(room_id) => room_id,
            Err(err) => {
                let err = ChatError::from(err);
                self.emit(SessionEvent::Error(err.clone()));
                return Err(err);
            }
        };
        self.select_room(room_id).await
    }

    /// Posts `body` to the active room. Blank input never reaches the network.
    pub async fn send_message(&self, body: &str) -> ChatResult<()> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let _selection = self.selection.lock().await;
        let room_id = self
            .active_room_id()
            .await
            .ok_or(ChatError::NoActiveRoom)?;
        let envelope = OutboundChatMessage {
            sender_id: self.identity.member_id,
            sender_name: self.identity.display_name.clone(),
            message: body.to_string(),
            kind: room_id.chat_type(),
            chatroom_id: room_id.clone(),
            send_at: Some(chrono::Local::now().naive_local()),
        };

        self.connection.send(&envelope).await.map_err(|err| {
            warn!(room_id = %room_id, "chat: send failed: {err}");
            self.emit(SessionEvent::Error(err.clone()));
            err
        })
    }

    /// Records that the identity has read the active room.
    pub async fn mark_read(&self) -> ChatResult<()> {
        let room_id = self
            .active_room_id()
            .await
            .ok_or(ChatError::NoActiveRoom)?;
        self.history
            .mark_read(&encode(&room_id), self.identity.member_id)
            .await
            .map_err(|err| {
                warn!(room_id = %room_id, "chat: mark read failed: {err:#}");
                ChatError::ReadReceiptFailed(format!("{err:#}"))
            })
    }

    /// Closes the connection and clears the active room. The directory is
    /// left as it is.
    pub async fn leave_room(&self) {
        let _selection = self.selection.lock().await;
        if let Some(room_id) = self.detach_active().await {
            info!(room_id = %room_id, "chat: room left");
            self.emit(SessionEvent::ConnectionStateChanged(ConnectionState::Closed));
        }
    }

    pub async fn shutdown(&self) {
        let _selection = self.selection.lock().await;
        let previous = self.detach_active().await;
        info!(active_room = ?previous, "chat: session shut down");
    }

    /// Closes the connection first so no frame from it can be appended, then
    /// clears the per-room state.
    async fn detach_active(&self) -> Option<RoomId> {
        self.connection.close().await;

        let mut state = self.state.lock().await;
        if let Some(pump) = state.pump.take() {
            pump.abort();
        }
        if let Some(backfill) = state.backfill.take() {
            backfill.abort();
        }
        state.generation = None;
        state.feed = FeedMode::Idle;
        state.messages.clear();
        state.active_room.take()
    }

    async fn handle_connection_event(&self, tagged: TaggedEvent) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.generation != Some(tagged.generation) {
            debug!(
                generation = tagged.generation,
                current = ?state.generation,
                "chat: discarding event from stale connection"
            );
            return;
        }
        let Some(room_id) = state.active_room.clone() else {
            return;
        };

        match tagged.event {
            ConnectionEvent::Message(message) => {
                let preview = message.message.clone();
                match &mut state.feed {
                    FeedMode::Backfilling(buffer) => buffer.push(message),
                    FeedMode::Live | FeedMode::Idle => {
                        state.messages.push(message.clone());
                        self.emit(SessionEvent::MessageAppended(message));
                    }
                }
                drop(guard);

                if self.directory.apply_live_update(&room_id, &preview).await {
                    self.emit(SessionEvent::DirectoryUpdated(room_id));
                }
            }
            ConnectionEvent::Closed { code, reason } => {
                info!(room_id = %room_id, ?code, %reason, "chat: connection closed");
                self.emit(SessionEvent::ConnectionStateChanged(ConnectionState::Closed));
            }
            ConnectionEvent::Failed(reason) => {
                warn!(room_id = %room_id, "chat: connection failed: {reason}");
                self.emit(SessionEvent::ConnectionStateChanged(ConnectionState::Error));
                self.emit(SessionEvent::Error(ChatError::ConnectionLost(reason)));
            }
        }
    }

    async fn complete_backfill(&self, generation: u64, result: anyhow::Result<Vec<ChatMessage>>) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.generation != Some(generation) {
            debug!(generation, "chat: discarding history for a room no longer active");
            return;
        }
        let Some(room_id) = state.active_room.clone() else {
            return;
        };
        let buffered = match std::mem::replace(&mut state.feed, FeedMode::Live) {
            FeedMode::Backfilling(buffered) => buffered,
            other => {
                state.feed = other;
                return;
            }
        };
        state.backfill = None;

        match result {
            Ok(history) => {
                let count = history.len();
                let live = buffered.len();
                state.messages = merge_backfill(history, buffered);
                info!(room_id = %room_id, generation, count, live, "chat: history loaded");
                self.emit(SessionEvent::HistoryLoaded { room_id, count });
            }
            Err(err) => {
                let error = ChatError::HistoryUnavailable(format!("{err:#}"));
                warn!(
                    room_id = %room_id,
                    generation,
                    "chat: continuing with live messages only: {error}"
                );
                state.messages.extend(buffered);
                self.emit(SessionEvent::HistoryUnavailable { room_id, error });
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// History in store order, then the buffered live frames not already in it.
/// Each history entry absorbs at most one matching buffered frame, so repeated
/// identical messages sent during the backfill are kept.
pub fn merge_backfill(history: Vec<ChatMessage>, buffered: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let keep: Vec<bool> = {
        let mut persisted: HashMap<DedupKey<'_>, usize> = HashMap::new();
        for message in &history {
            *persisted.entry(message.dedup_key()).or_default() += 1;
        }
        buffered
            .iter()
            .map(|message| match persisted.get_mut(&message.dedup_key()) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    false
                }
                _ => true,
            })
            .collect()
    };
    let fresh = buffered
        .into_iter()
        .zip(keep)
        .filter_map(|(message, keep)| keep.then_some(message));
    let mut merged = history;
    merged.extend(fresh);
    merged
}

async fn pump_events(
    session: Weak<ConversationSession>,
    mut events: mpsc::UnboundedReceiver<TaggedEvent>,
) {
    while let Some(tagged) = events.recv().await {
        let Some(session) = session.upgrade() else {
            return;
        };
        session.handle_connection_event(tagged).await;
    }
}

async fn run_backfill(
    session: Weak<ConversationSession>,
    history: Arc<dyn HistoryStore>,
    address: ChannelAddress,
    generation: u64,
) {
    let result = history.fetch_history(&address).await;
    if let Some(session) = session.upgrade() {
        session.complete_backfill(generation, result).await;
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
