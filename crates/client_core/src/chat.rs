//! One chat session per open conversation. Direct and group conversations
//! share the same state machine; everything mode specific sits behind
//! [`ChatMode`].

use std::{path::Path, sync::Arc};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{GroupId, MessageKind, RoomId, UserId, UserProfile},
    protocol::{
        ClientFrame, GroupMessage, HistoryRecord, JoinGroup, JoinRoom, PrivateMessage, ServerFrame,
    },
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    api::ApiClient,
    error::{ApiClientError, ChatError},
    reconnect::ReconnectPolicy,
    session::Session,
    transcript::{ChatMessage, RemoteOutcome, Transcript, TranscriptEntry},
    transport::{RealtimeLink, RealtimeTransport},
};

#[async_trait]
pub trait ChatMode: Send + Sync {
    fn title(&self) -> &str;
    fn room(&self, me: UserId) -> RoomId;
    fn join_frame(&self, me: UserId, room: &RoomId) -> ClientFrame;
    fn leave_frame(&self, me: UserId, room: &RoomId) -> ClientFrame;
    fn outgoing_frame(&self, message: &ChatMessage) -> ClientFrame;
    /// Converts a server frame into a transcript message, or `None` when the
    /// frame belongs to another mode or another room.
    fn incoming(&self, frame: ServerFrame, room: &RoomId) -> Option<ChatMessage>;
    async fn load_history(
        &self,
        api: &ApiClient,
        room: &RoomId,
    ) -> std::result::Result<Vec<HistoryRecord>, ApiClientError>;
}

#[derive(Debug, Clone)]
pub struct DirectChat {
    pub peer: UserId,
    pub peer_name: String,
}

impl DirectChat {
    pub fn new(peer: UserId, peer_name: impl Into<String>) -> Self {
        Self {
            peer,
            peer_name: peer_name.into(),
        }
    }
}

#[async_trait]
impl ChatMode for DirectChat {
    fn title(&self) -> &str {
        if self.peer_name.is_empty() {
            "Chat"
        } else {
            &self.peer_name
        }
    }

    fn room(&self, me: UserId) -> RoomId {
        RoomId::direct(me, self.peer)
    }

    fn join_frame(&self, me: UserId, room: &RoomId) -> ClientFrame {
        ClientFrame::JoinRoom(JoinRoom {
            user_id: me,
            room_id: room.clone(),
        })
    }

    fn leave_frame(&self, me: UserId, room: &RoomId) -> ClientFrame {
        ClientFrame::LeaveRoom(JoinRoom {
            user_id: me,
            room_id: room.clone(),
        })
    }

    fn outgoing_frame(&self, message: &ChatMessage) -> ClientFrame {
        ClientFrame::PrivateMessage(PrivateMessage {
            id: None,
            client_msg_id: message.client_msg_id.clone(),
            from_user_id: message.sender,
            to_user_id: Some(self.peer),
            room_id: Some(message.room.clone()),
            message: message.body.clone(),
            kind: message.kind,
            file_url: message.file_url.clone(),
            sent_at: message.sent_at,
        })
    }

    fn incoming(&self, frame: ServerFrame, room: &RoomId) -> Option<ChatMessage> {
        let ServerFrame::PrivateMessage(payload) = frame else {
            return None;
        };
        if payload.room_id.as_ref().is_some_and(|id| id != room) {
            return None;
        }
        Some(ChatMessage {
            id: payload.id,
            client_msg_id: payload.client_msg_id,
            sender: payload.from_user_id,
            sender_name: None,
            room: room.clone(),
            body: payload.message,
            kind: payload.kind,
            file_url: payload.file_url,
            sent_at: payload.sent_at,
        })
    }

    async fn load_history(
        &self,
        api: &ApiClient,
        room: &RoomId,
    ) -> std::result::Result<Vec<HistoryRecord>, ApiClientError> {
        api.direct_history(room).await
    }
}

#[derive(Debug, Clone)]
pub struct GroupChat {
    pub group: GroupId,
    pub group_name: String,
}

impl GroupChat {
    pub fn new(group: GroupId, group_name: impl Into<String>) -> Self {
        Self {
            group,
            group_name: group_name.into(),
        }
    }
}

#[async_trait]
impl ChatMode for GroupChat {
    fn title(&self) -> &str {
        if self.group_name.is_empty() {
            "Group Chat"
        } else {
            &self.group_name
        }
    }

    fn room(&self, _me: UserId) -> RoomId {
        RoomId::group(self.group)
    }

    fn join_frame(&self, me: UserId, _room: &RoomId) -> ClientFrame {
        ClientFrame::JoinGroup(JoinGroup {
            group_id: self.group,
            user_id: me,
        })
    }

    fn leave_frame(&self, me: UserId, _room: &RoomId) -> ClientFrame {
        ClientFrame::LeaveGroup(JoinGroup {
            group_id: self.group,
            user_id: me,
        })
    }

    fn outgoing_frame(&self, message: &ChatMessage) -> ClientFrame {
        ClientFrame::GroupMessage(GroupMessage {
            id: None,
            client_msg_id: message.client_msg_id.clone(),
            sender: message.sender,
            sender_name: message.sender_name.clone(),
            group_id: Some(self.group),
            message: message.body.clone(),
            kind: message.kind,
            file_url: message.file_url.clone(),
            sent_at: message.sent_at,
        })
    }

    fn incoming(&self, frame: ServerFrame, room: &RoomId) -> Option<ChatMessage> {
        let ServerFrame::GroupMessage(payload) = frame else {
            return None;
        };
        if payload.group_id.is_some_and(|id| id != self.group) {
            return None;
        }
        Some(ChatMessage {
            id: payload.id,
            client_msg_id: payload.client_msg_id,
            sender: payload.sender,
            sender_name: payload.sender_name,
            room: room.clone(),
            body: payload.message,
            kind: payload.kind,
            file_url: payload.file_url,
            sent_at: payload.sent_at,
        })
    }

    async fn load_history(
        &self,
        api: &ApiClient,
        _room: &RoomId,
    ) -> std::result::Result<Vec<HistoryRecord>, ApiClientError> {
        api.group_history(self.group).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    Joined,
    Reconnecting,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    PhaseChanged(SessionPhase),
    HistoryLoaded { count: usize },
    EntryAppended { index: usize, entry: TranscriptEntry },
    EntryConfirmed { index: usize, entry: TranscriptEntry },
    Error(String),
}

struct ChatState {
    phase: SessionPhase,
    transcript: Transcript,
    outbound: Option<mpsc::UnboundedSender<ClientFrame>>,
    reader: Option<JoinHandle<()>>,
}

pub struct ChatSession {
    api: Arc<ApiClient>,
    transport: Arc<dyn RealtimeTransport>,
    mode: Arc<dyn ChatMode>,
    me: UserProfile,
    room: RoomId,
    policy: ReconnectPolicy,
    inner: Mutex<ChatState>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatSession {
    pub fn new(
        api: Arc<ApiClient>,
        transport: Arc<dyn RealtimeTransport>,
        mode: Arc<dyn ChatMode>,
        session: &Session,
        policy: ReconnectPolicy,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        let room = mode.room(session.user_id());
        Arc::new(Self {
            api,
            transport,
            mode,
            me: session.user.clone(),
            room,
            policy,
            inner: Mutex::new(ChatState {
                phase: SessionPhase::Disconnected,
                transcript: Transcript::new(),
                outbound: None,
                reader: None,
            }),
            events,
        })
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn title(&self) -> &str {
        self.mode.title()
    }

    pub fn user_id(&self) -> UserId {
        self.me.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.phase
    }

    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.inner.lock().await.transcript.entries().to_vec()
    }

    fn set_phase(&self, state: &mut ChatState, phase: SessionPhase) {
        if state.phase != phase {
            debug!(room = %self.room, from = ?state.phase, to = ?phase, "chat: phase change");
            state.phase = phase;
            let _ = self.events.send(ChatEvent::PhaseChanged(phase));
        }
    }

    /// Loads history and connects concurrently, seeds the transcript, joins
    /// the room, then starts consuming real-time frames.
    pub async fn open(self: &Arc<Self>) -> Result<()> {
        {
            let mut guard = self.inner.lock().await;
            let phase = guard.phase;
            match phase {
                SessionPhase::Disconnected => self.set_phase(&mut guard, SessionPhase::Connecting),
                SessionPhase::Closed => return Err(ChatError::Closed.into()),
                other => return Err(anyhow!("chat session already opened ({other:?})")),
            }
        }

        let (history, link) = tokio::join!(
            self.mode.load_history(&self.api, &self.room),
            self.transport.connect(self.me.id)
        );

        match history {
            Ok(records) => {
                let mut guard = self.inner.lock().await;
                let count = guard.transcript.seed_history(records, &self.room);
                info!(room = %self.room, count, "chat: history loaded");
                let _ = self.events.send(ChatEvent::HistoryLoaded { count });
            }
            Err(err) => {
                warn!(room = %self.room, "chat: failed to load history: {err}");
                let _ = self
                    .events
                    .send(ChatEvent::Error(format!("failed to load history: {err}")));
            }
        }

        let link = match link {
            Ok(link) => {
                self.bind(&link).await?;
                Some(link)
            }
            Err(err) => {
                warn!(room = %self.room, "chat: real-time connect failed: {err:#}");
                let _ = self
                    .events
                    .send(ChatEvent::Error(format!("real-time connect failed: {err}")));
                if !self.policy.allows_reconnect() {
                    let mut guard = self.inner.lock().await;
                    self.set_phase(&mut guard, SessionPhase::Closed);
                    return Err(err.context("real-time connection unavailable"));
                }
                None
            }
        };

        let session = Arc::clone(self);
        let reader = tokio::spawn(async move { session.run(link).await });
        let mut guard = self.inner.lock().await;
        if guard.phase == SessionPhase::Closed {
            reader.abort();
        } else {
            guard.reader = Some(reader);
        }
        Ok(())
    }

    async fn bind(&self, link: &RealtimeLink) -> Result<()> {
        let mut guard = self.inner.lock().await;
        if guard.phase == SessionPhase::Closed {
            return Err(ChatError::Closed.into());
        }
        link.outbound
            .send(self.mode.join_frame(self.me.id, &self.room))
            .map_err(|_| anyhow!("real-time connection dropped before join"))?;
        guard.outbound = Some(link.outbound.clone());
        info!(room = %self.room, user_id = self.me.id.0, "chat: joined room");
        self.set_phase(&mut guard, SessionPhase::Joined);
        Ok(())
    }

    async fn run(self: Arc<Self>, mut link: Option<RealtimeLink>) {
        let mut attempt = 0u32;
        loop {
            if let Some(mut active) = link.take() {
                while let Some(frame) = active.inbound.recv().await {
                    self.handle_frame(frame).await;
                }
                let mut guard = self.inner.lock().await;
                if guard.phase == SessionPhase::Closed {
                    return;
                }
                guard.outbound = None;
                drop(guard);
                warn!(room = %self.room, "chat: real-time connection lost");
                let _ = self
                    .events
                    .send(ChatEvent::Error("real-time connection lost".to_string()));
            }

            let Some(delay) = self.policy.delay_for(attempt) else {
                let mut guard = self.inner.lock().await;
                self.set_phase(&mut guard, SessionPhase::Closed);
                info!(room = %self.room, attempts = attempt, "chat: giving up on real-time connection");
                return;
            };

            {
                let mut guard = self.inner.lock().await;
                if guard.phase == SessionPhase::Closed {
                    return;
                }
                self.set_phase(&mut guard, SessionPhase::Reconnecting);
            }
            tokio::time::sleep(delay).await;
            attempt += 1;

            match self.transport.connect(self.me.id).await {
                Ok(new_link) => match self.bind(&new_link).await {
                    Ok(()) => {
                        attempt = 0;
                        link = Some(new_link);
                    }
                    Err(err) => {
                        if self.phase().await == SessionPhase::Closed {
                            return;
                        }
                        warn!(room = %self.room, attempt, "chat: rejoin failed: {err:#}");
                        let _ = self
                            .events
                            .send(ChatEvent::Error(format!("rejoin failed: {err}")));
                    }
                },
                Err(err) => {
                    warn!(room = %self.room, attempt, "chat: reconnect failed: {err:#}");
                    let _ = self
                        .events
                        .send(ChatEvent::Error(format!("reconnect failed: {err}")));
                }
            }
        }
    }

    async fn handle_frame(&self, frame: ServerFrame) {
        if let ServerFrame::Error(notice) = &frame {
            warn!(room = %self.room, "chat: server error: {}", notice.message);
            let _ = self.events.send(ChatEvent::Error(notice.message.clone()));
            return;
        }

        let Some(message) = self.mode.incoming(frame, &self.room) else {
            debug!(room = %self.room, "chat: ignoring frame for another conversation");
            return;
        };

        let mut guard = self.inner.lock().await;
        match guard.transcript.apply_remote(message, self.me.id) {
            RemoteOutcome::Appended(index) => {
                let entry = guard.transcript.entries()[index].clone();
                let _ = self.events.send(ChatEvent::EntryAppended { index, entry });
            }
            RemoteOutcome::Confirmed(index) => {
                let entry = guard.transcript.entries()[index].clone();
                let _ = self.events.send(ChatEvent::EntryConfirmed { index, entry });
            }
            RemoteOutcome::Duplicate => debug!(room = %self.room, "chat: dropped duplicate message"),
            RemoteOutcome::EchoSuppressed => debug!(room = %self.room, "chat: suppressed own echo"),
        }
    }

    /// Emits a message and appends it to the transcript right away. There is
    /// no acknowledgement and no retry.
    pub async fn send_message(
        &self,
        body: &str,
        kind: MessageKind,
        file_url: Option<String>,
    ) -> std::result::Result<usize, ChatError> {
        let is_blank = body.trim().is_empty();
        let has_url = file_url.as_deref().is_some_and(|url| !url.is_empty());
        if is_blank && (kind == MessageKind::Text || !has_url) {
            return Err(ChatError::EmptyMessage);
        }

        let mut guard = self.inner.lock().await;
        match guard.phase {
            SessionPhase::Joined => {}
            SessionPhase::Closed => return Err(ChatError::Closed),
            _ => return Err(ChatError::NotConnected),
        }
        let outbound = guard.outbound.clone().ok_or(ChatError::NotConnected)?;

        let message = ChatMessage {
            id: None,
            client_msg_id: Some(Uuid::new_v4().to_string()),
            sender: self.me.id,
            sender_name: Some(self.me.name.clone()).filter(|name| !name.is_empty()),
            room: self.room.clone(),
            body: body.to_string(),
            kind,
            file_url,
            sent_at: Some(Utc::now()),
        };

        outbound
            .send(self.mode.outgoing_frame(&message))
            .map_err(|_| ChatError::NotConnected)?;

        let index = guard.transcript.push_local(message);
        let entry = guard.transcript.entries()[index].clone();
        let _ = self.events.send(ChatEvent::EntryAppended { index, entry });
        Ok(index)
    }

    pub async fn send_text(&self, text: &str) -> std::result::Result<usize, ChatError> {
        self.send_message(text, MessageKind::Text, None).await
    }

    /// Uploads a local file and sends the returned URL as a file message.
    pub async fn send_file(&self, path: &Path) -> Result<usize> {
        let uploaded = match self.api.upload_file(path).await {
            Ok(uploaded) => uploaded,
            Err(err) => {
                warn!(path = %path.display(), "chat: file upload failed: {err}");
                let _ = self
                    .events
                    .send(ChatEvent::Error("File upload failed".to_string()));
                return Err(err).context("file upload failed");
            }
        };
        let url = uploaded.file_url;
        Ok(self
            .send_message(&url, MessageKind::File, Some(url.clone()))
            .await?)
    }

    /// Leaves the room, drops the connection and stops the reader task.
    pub async fn close(&self) {
        let mut guard = self.inner.lock().await;
        if guard.phase == SessionPhase::Closed {
            return;
        }
        if let Some(outbound) = guard.outbound.take() {
            let _ = outbound.send(self.mode.leave_frame(self.me.id, &self.room));
        }
        if let Some(reader) = guard.reader.take() {
            reader.abort();
        }
        self.set_phase(&mut guard, SessionPhase::Closed);
        info!(room = %self.room, "chat: session closed");
    }
}

#[cfg(test)]
#[path = "tests/chat_tests.rs"]
mod tests;
