use super::*;

fn sample_session(id: i64) -> Session {
    Session {
        user: UserProfile {
            id: UserId(id),
            name: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
        },
        token: format!("token-{id}"),
    }
}

#[tokio::test]
async fn file_store_round_trips_and_clears() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

    assert_eq!(store.load().await.expect("load empty"), None);

    store.save(&sample_session(3)).await.expect("save");
    assert_eq!(
        store.load().await.expect("load"),
        Some(sample_session(3))
    );

    store.clear().await.expect("clear");
    assert!(!store.path().exists());
    store.clear().await.expect("clearing twice is fine");
}

#[tokio::test]
async fn file_store_ignores_corrupt_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");
    tokio::fs::write(&path, b"{not json").await.expect("write");

    let store = FileSessionStore::new(&path);
    assert_eq!(store.load().await.expect("load"), None);
}

#[tokio::test]
async fn file_store_accepts_underscore_id_and_string_ids() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");
    tokio::fs::write(
        &path,
        br#"{"user":{"_id":"42","name":"bob"},"token":"abc"}"#,
    )
    .await
    .expect("write");

    let session = FileSessionStore::new(&path)
        .load()
        .await
        .expect("load")
        .expect("session present");
    assert_eq!(session.user_id(), UserId(42));
    assert_eq!(session.token, "abc");
}

#[tokio::test]
async fn restore_picks_initial_route_from_storage() {
    let (events, _) = broadcast::channel(8);
    let empty = SessionHandle::restore(Arc::new(MemorySessionStore::default()), events.clone())
        .await
        .expect("restore");
    assert_eq!(empty.initial_route().await, Route::Login);
    assert!(matches!(
        empty.require().await,
        Err(ApiClientError::NotLoggedIn)
    ));

    let stored = SessionHandle::restore(
        Arc::new(MemorySessionStore::with_session(sample_session(5))),
        events,
    )
    .await
    .expect("restore");
    assert_eq!(stored.initial_route().await, Route::Dashboard);
    assert_eq!(stored.token().await.as_deref(), Some("token-5"));
}

#[tokio::test]
async fn establish_then_logout_updates_store_and_events() {
    let store = Arc::new(MemorySessionStore::default());
    let (events, _) = broadcast::channel(8);
    let handle = SessionHandle::restore(store.clone(), events)
        .await
        .expect("restore");
    let mut rx = handle.subscribe();

    handle.establish(sample_session(9)).await.expect("establish");
    assert_eq!(store.snapshot().await, Some(sample_session(9)));
    assert_eq!(store.save_count(), 1);
    assert_eq!(
        rx.recv().await.expect("event"),
        ClientEvent::SessionChanged {
            user_id: Some(UserId(9))
        }
    );

    handle.logout().await.expect("logout");
    assert_eq!(store.snapshot().await, None);
    assert_eq!(handle.current().await, None);
    assert_eq!(
        rx.recv().await.expect("event"),
        ClientEvent::SessionChanged { user_id: None }
    );
    assert_eq!(
        rx.recv().await.expect("event"),
        ClientEvent::Navigate(Route::Login)
    );
}

#[tokio::test]
async fn invalidate_clears_session_and_redirects_to_login() {
    let store = Arc::new(MemorySessionStore::with_session(sample_session(2)));
    let (events, _) = broadcast::channel(8);
    let handle = SessionHandle::restore(store.clone(), events)
        .await
        .expect("restore");
    let mut rx = handle.subscribe();

    handle.invalidate().await;

    assert_eq!(handle.current().await, None);
    assert_eq!(store.snapshot().await, None);
    assert_eq!(
        rx.recv().await.expect("event"),
        ClientEvent::SessionChanged { user_id: None }
    );
    assert_eq!(
        rx.recv().await.expect("event"),
        ClientEvent::Navigate(Route::Login)
    );
}
