use super::*;
use async_trait::async_trait;
use shared::domain::{GroupId, RoomId, UserId};

use crate::test_support::{session_for, settings_for};

struct OfflineTransport;

#[async_trait]
impl RealtimeTransport for OfflineTransport {
    async fn connect(&self, _user_id: UserId) -> Result<RealtimeLink> {
        Err(anyhow!("offline"))
    }
}

async fn client_with(session: Option<Session>) -> ChatClient {
    let store = Arc::new(match session {
        Some(session) => MemorySessionStore::with_session(session),
        None => MemorySessionStore::default(),
    });
    ChatClient::with_parts(
        settings_for("http://127.0.0.1:9"),
        store,
        Arc::new(OfflineTransport),
    )
    .await
    .expect("client")
}

#[tokio::test]
async fn chat_for_builds_direct_and_group_sessions() {
    let client = client_with(Some(session_for(5, "eve"))).await;

    let direct = client
        .chat_for(&Route::DirectChat {
            peer: UserId(2),
            peer_name: "Bob".into(),
        })
        .await
        .expect("direct chat");
    assert_eq!(direct.room(), &RoomId("2_5".into()));
    assert_eq!(direct.title(), "Bob");
    assert_eq!(direct.user_id(), UserId(5));
    assert_eq!(direct.phase().await, SessionPhase::Disconnected);

    let group = client
        .chat_for(&Route::GroupChat {
            group: GroupId(12),
            group_name: String::new(),
        })
        .await
        .expect("group chat");
    assert_eq!(group.room(), &RoomId("12".into()));
    assert_eq!(group.title(), "Group Chat");
}

#[tokio::test]
async fn chat_for_rejects_self_chat_and_non_chat_routes() {
    let client = client_with(Some(session_for(5, "eve"))).await;

    assert!(client
        .chat_for(&Route::DirectChat {
            peer: UserId(5),
            peer_name: "me".into(),
        })
        .await
        .is_err());
    assert!(client.chat_for(&Route::Dashboard).await.is_err());
}

#[tokio::test]
async fn chat_for_requires_login() {
    let client = client_with(None).await;
    let err = client
        .chat_for(&Route::GroupChat {
            group: GroupId(1),
            group_name: "g".into(),
        })
        .await
        .err()
        .expect("not logged in");
    assert!(matches!(
        err.downcast_ref::<ApiClientError>(),
        Some(ApiClientError::NotLoggedIn)
    ));
    assert_eq!(client.session().initial_route().await, Route::Login);
}

#[tokio::test]
async fn never_policy_from_settings_fails_open_when_offline() {
    let mut settings = settings_for("http://127.0.0.1:9");
    settings.reconnect = ReconnectPolicy::Never;
    let client = ChatClient::with_parts(
        settings,
        Arc::new(MemorySessionStore::with_session(session_for(5, "eve"))),
        Arc::new(OfflineTransport),
    )
    .await
    .expect("client");

    let chat = client
        .chat_for(&Route::DirectChat {
            peer: UserId(6),
            peer_name: "Finn".into(),
        })
        .await
        .expect("chat");
    assert!(chat.open().await.is_err());
    assert_eq!(chat.phase().await, SessionPhase::Closed);
}

#[tokio::test]
async fn logout_broadcasts_to_subscribers() {
    let client = client_with(Some(session_for(5, "eve"))).await;
    let mut events = client.subscribe_events();

    client.session().logout().await.expect("logout");

    assert_eq!(
        events.recv().await.expect("event"),
        ClientEvent::SessionChanged { user_id: None }
    );
    assert_eq!(
        events.recv().await.expect("event"),
        ClientEvent::Navigate(Route::Login)
    );
    assert_eq!(client.session().current().await, None);
}
