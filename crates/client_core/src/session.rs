//! Authenticated identity shared by every controller, plus its persistent
//! backing store.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::domain::{UserId, UserProfile};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use crate::{
    error::ApiClientError,
    events::{ClientEvent, Route},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: UserProfile,
    pub token: String,
}

impl Session {
    pub fn user_id(&self) -> UserId {
        self.user.id
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>>;
    async fn save(&self, session: &Session) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Persists the session as a small JSON document holding the `user` and
/// `token` keys.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read session file {}", self.path.display())
                })
            }
        };

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    "session: ignoring unreadable session file: {err}"
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("failed to create session directory {}", parent.display())
                })?;
            }
        }
        let body = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("failed to write session file {}", self.path.display()))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove session file {}", self.path.display())),
        }
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Session>>,
    saves: AtomicUsize,
}

impl MemorySessionStore {
    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
            saves: AtomicUsize::new(0),
        }
    }

    pub async fn snapshot(&self) -> Option<Session> {
        self.slot.lock().await.clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.slot.lock().await = Some(session.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.slot.lock().await.take();
        Ok(())
    }
}

/// The single in-memory session passed explicitly to every controller.
/// Authorization failures anywhere end up in [`SessionHandle::invalidate`].
pub struct SessionHandle {
    store: Arc<dyn SessionStore>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<ClientEvent>,
}

impl SessionHandle {
    pub async fn restore(
        store: Arc<dyn SessionStore>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Result<Arc<Self>> {
        let current = store.load().await?;
        if let Some(session) = &current {
            info!(user_id = session.user_id().0, "session: restored from storage");
        }
        Ok(Arc::new(Self {
            store,
            current: RwLock::new(current),
            events,
        }))
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn require(&self) -> std::result::Result<Session, ApiClientError> {
        self.current().await.ok_or(ApiClientError::NotLoggedIn)
    }

    pub async fn token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|session| session.token.clone())
    }

    /// Route the front end should open at startup.
    pub async fn initial_route(&self) -> Route {
        if self.current.read().await.is_some() {
            Route::Dashboard
        } else {
            Route::Login
        }
    }

    pub async fn establish(&self, session: Session) -> Result<()> {
        self.store
            .save(&session)
            .await
            .context("failed to persist session")?;
        let user_id = session.user_id();
        *self.current.write().await = Some(session);
        info!(user_id = user_id.0, "session: established");
        let _ = self.events.send(ClientEvent::SessionChanged {
            user_id: Some(user_id),
        });
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.current.write().await.take();
        self.store
            .clear()
            .await
            .context("failed to clear stored session")?;
        let _ = self
            .events
            .send(ClientEvent::SessionChanged { user_id: None });
        let _ = self.events.send(ClientEvent::Navigate(Route::Login));
        Ok(())
    }

    /// Drops the session after the server rejected its token and sends the
    /// user back to the login route.
    pub async fn invalidate(&self) {
        let previous = self.current.write().await.take();
        if let Err(err) = self.store.clear().await {
            warn!("session: failed to clear storage after 401: {err:#}");
        }
        warn!(
            user_id = previous.as_ref().map(|session| session.user_id().0),
            "session: unauthorized response, redirecting to login"
        );
        let _ = self
            .events
            .send(ClientEvent::SessionChanged { user_id: None });
        let _ = self.events.send(ClientEvent::Navigate(Route::Login));
    }

    pub fn events(&self) -> broadcast::Sender<ClientEvent> {
        self.events.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
