//! Fixtures shared by the unit tests: a stub HTTP backend and a logged-in
//! API client wired to an in-memory session store.

use std::sync::Arc;

use axum::Router;
use shared::domain::{UserId, UserProfile};
use tokio::{net::TcpListener, sync::broadcast};

use crate::{
    api::ApiClient,
    config::ClientSettings,
    events::ClientEvent,
    session::{MemorySessionStore, Session, SessionHandle},
};

pub(crate) fn session_for(id: i64, name: &str) -> Session {
    Session {
        user: UserProfile {
            id: UserId(id),
            name: name.to_string(),
            email: Some(format!("{name}@example.com")),
        },
        token: format!("token-{id}"),
    }
}

pub(crate) async fn spawn_router(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

pub(crate) fn settings_for(server_url: &str) -> ClientSettings {
    ClientSettings {
        server_url: server_url.to_string(),
        ..ClientSettings::default()
    }
}

pub(crate) struct TestApi {
    pub api: Arc<ApiClient>,
    pub store: Arc<MemorySessionStore>,
    pub events: broadcast::Receiver<ClientEvent>,
}

pub(crate) async fn api_for(server_url: &str, session: Option<Session>) -> TestApi {
    let store = Arc::new(match session {
        Some(session) => MemorySessionStore::with_session(session),
        None => MemorySessionStore::default(),
    });
    let (events_tx, _) = broadcast::channel(64);
    let handle = SessionHandle::restore(store.clone(), events_tx)
        .await
        .expect("restore session");
    let events = handle.subscribe();
    let api = Arc::new(ApiClient::new(&settings_for(server_url), handle).expect("api client"));
    TestApi { api, store, events }
}

/// Drains whatever client events are already queued.
pub(crate) fn drain(events: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
