use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast;

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod group;
pub mod reconnect;
pub mod session;
pub mod transcript;
pub mod transport;

pub use api::ApiClient;
pub use auth::{AuthController, SignupForm};
pub use chat::{ChatEvent, ChatMode, ChatSession, DirectChat, GroupChat, SessionPhase};
pub use config::{load_settings, ClientSettings};
pub use dashboard::{ConversationEntry, Dashboard, DashboardData, DashboardTab};
pub use error::{ApiClientError, ChatError};
pub use events::{ClientEvent, Route};
pub use group::{GroupCreator, GroupDraft};
pub use reconnect::ReconnectPolicy;
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionHandle, SessionStore};
pub use transcript::{Attachment, ChatMessage, RenderedBody, Transcript, TranscriptEntry};
pub use transport::{RealtimeLink, RealtimeTransport, WsTransport};

/// Wires the shared session, the REST client and the real-time transport
/// together and hands out the per-screen controllers.
pub struct ChatClient {
    settings: ClientSettings,
    session: Arc<SessionHandle>,
    api: Arc<ApiClient>,
    transport: Arc<dyn RealtimeTransport>,
}

impl ChatClient {
    pub async fn from_settings(settings: ClientSettings) -> Result<Self> {
        let store = Arc::new(FileSessionStore::new(settings.session_path.clone()));
        let transport = Arc::new(WsTransport::from_settings(&settings)?);
        Self::with_parts(settings, store, transport).await
    }

    pub async fn with_parts(
        settings: ClientSettings,
        store: Arc<dyn SessionStore>,
        transport: Arc<dyn RealtimeTransport>,
    ) -> Result<Self> {
        let (events, _) = broadcast::channel(256);
        let session = SessionHandle::restore(store, events)
            .await
            .context("failed to restore session")?;
        let api = Arc::new(ApiClient::new(&settings, Arc::clone(&session))?);
        Ok(Self {
            settings,
            session,
            api,
            transport,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn session(&self) -> &Arc<SessionHandle> {
        &self.session
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.session.subscribe()
    }

    pub fn auth(&self) -> AuthController {
        AuthController::new(Arc::clone(&self.api))
    }

    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(Arc::clone(&self.api))
    }

    pub fn groups(&self) -> GroupCreator {
        GroupCreator::new(Arc::clone(&self.api))
    }

    /// Builds the chat session for a chat route. The session is returned
    /// unopened so callers can subscribe before history arrives.
    pub async fn chat_for(&self, route: &Route) -> Result<Arc<ChatSession>> {
        let session = self.session.require().await?;
        let mode: Arc<dyn ChatMode> = match route {
            Route::DirectChat { peer, peer_name } => {
                if *peer == session.user_id() {
                    return Err(anyhow!("cannot open a direct chat with yourself"));
                }
                Arc::new(DirectChat::new(*peer, peer_name.clone()))
            }
            Route::GroupChat { group, group_name } => {
                Arc::new(GroupChat::new(*group, group_name.clone()))
            }
            other => return Err(anyhow!("route {other:?} is not a chat")),
        };
        Ok(ChatSession::new(
            Arc::clone(&self.api),
            Arc::clone(&self.transport),
            mode,
            &session,
            self.settings.reconnect,
        ))
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
