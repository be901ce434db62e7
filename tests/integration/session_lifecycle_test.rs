//! Integration tests for the session lifecycle
use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use session_bridge::backend::memory::Operation;
use session_bridge::backend::Document;
use session_bridge::session::PersistenceStatus;
use session_bridge::{BackendError, Identity, KeyValueStore, SessionError, SessionMarkers};

use crate::test_harness::{TestEnvironment, APP_VIEW, LOGIN_VIEW};

fn alice() -> Identity {
    Identity::new("u1", "a@x.com")
}

#[tokio::test]
async fn test_sign_in_then_sign_out_end_to_end() -> Result<()> {
    let mut env = TestEnvironment::new(APP_VIEW);
    let initial = env.start().await?;
    assert!(!initial.is_signed_in());

    env.backend.sign_in(alice());
    env.next_transition().await?;

    let cache = env.context.cache().clone();
    assert!(cache.is_authenticated());
    assert_eq!(cache.current_user(), Some(alice()));
    assert_eq!(cache.current_user_id().as_deref(), Some("u1"));
    assert_eq!(cache.current_user_email().as_deref(), Some("a@x.com"));
    assert_eq!(
        cache.markers(),
        Some(SessionMarkers {
            user_email: "a@x.com".into(),
            user_id: "u1".into(),
        })
    );

    env.backend.set_current(None);
    env.next_transition().await?;

    assert!(!cache.is_authenticated());
    assert_eq!(cache.current_user(), None);
    assert_eq!(cache.current_user_id(), None);
    assert_eq!(cache.current_user_email(), None);
    assert_eq!(cache.markers(), None);
    assert!(env.session_store.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cache_tracks_every_event() -> Result<()> {
    let mut env = TestEnvironment::new(APP_VIEW);
    env.start().await?;

    let events = [
        Some(alice()),
        Some(Identity::new("u2", "b@x.com")),
        None,
        None,
        Some(alice()),
        None,
    ];

    for event in events {
        env.backend.set_current(event.clone());
        env.next_transition().await?;

        let cache = env.context.cache();
        assert_eq!(cache.is_authenticated(), event.is_some());
        assert_eq!(cache.markers().is_some(), event.is_some());
        assert_eq!(cache.current_user_id(), event.as_ref().map(|i| i.user_id.clone()));
    }
    Ok(())
}

#[tokio::test]
async fn test_initialization_is_idempotent() -> Result<()> {
    let mut env = TestEnvironment::new(APP_VIEW);
    env.start().await?;

    let config = env.context.config().clone();
    env.context.initializer().ensure_initialized(&config).await?;
    env.context.start().await?;

    assert_eq!(env.factory.instances_created(), 1);
    // Still a single standing auth subscription
    assert_eq!(env.backend.listener_count(), 1);
    assert_eq!(
        env.context.initializer().persistence_status(),
        PersistenceStatus::Enabled
    );
    Ok(())
}

#[tokio::test]
async fn test_wait_for_ready_does_not_leak() -> Result<()> {
    let mut env = TestEnvironment::new(APP_VIEW);
    env.start().await?;
    env.backend.sign_in(alice());
    env.next_transition().await?;

    let ready = env.context.actions().wait_for_ready().await?;
    assert_eq!(ready, Some(alice()));
    assert_eq!(env.backend.listener_count(), 1);

    // A later event reaches only the bridge
    env.backend.set_current(None);
    env.next_transition().await?;
    assert!(!env.transition_within(Duration::from_millis(50)).await);
    assert_eq!(env.backend.listener_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_wait_for_ready_when_signed_out() -> Result<()> {
    let mut env = TestEnvironment::new(APP_VIEW);
    env.start().await?;

    assert_eq!(env.context.actions().wait_for_ready().await?, None);
    Ok(())
}

#[tokio::test]
async fn test_sign_out_clears_storage_and_navigates() -> Result<()> {
    let mut env = TestEnvironment::new(APP_VIEW);
    env.start().await?;
    env.backend.sign_in(alice());
    env.next_transition().await?;
    env.persistent_store.set("preferredClass", "cs101")?;

    env.context.actions().sign_out().await?;
    env.next_transition().await?;

    assert!(env.session_store.is_empty());
    assert!(env.persistent_store.is_empty());
    assert_eq!(env.navigator.navigations(), vec![LOGIN_VIEW.to_string()]);
    assert!(!env.context.cache().is_authenticated());
    Ok(())
}

#[tokio::test]
async fn test_sign_out_failure_still_clears_and_navigates() -> Result<()> {
    let mut env = TestEnvironment::new(APP_VIEW);
    env.start().await?;
    env.backend.sign_in(alice());
    env.next_transition().await?;
    env.persistent_store.set("preferredClass", "cs101")?;
    env.backend
        .fail(Operation::SignOut, BackendError::unavailable("network unreachable"));

    let result = env.context.actions().sign_out().await;

    assert!(matches!(result, Err(SessionError::SignOut(_))));
    assert!(env.session_store.is_empty());
    assert!(env.persistent_store.is_empty());
    assert_eq!(env.navigator.navigation_count(), 1);

    // Markers are gone while the backend still reports the user
    let cache = env.context.cache().clone();
    assert!(cache.is_authenticated());
    assert_eq!(cache.markers(), None);

    // The next auth change brings the cache back in line
    env.backend.set_current(None);
    env.next_transition().await?;
    assert!(!cache.is_authenticated());
    assert_eq!(cache.markers(), None);
    Ok(())
}

#[tokio::test]
async fn test_check_connection() -> Result<()> {
    let mut env = TestEnvironment::new(APP_VIEW);
    env.start().await?;

    assert!(env.context.actions().check_connection().await);

    env.backend
        .insert_document(Document::new("system/test").with_field("status", json!("ok")));
    assert!(env.context.actions().check_connection().await);

    env.backend
        .fail(Operation::Read, BackendError::unavailable("offline"));
    assert!(!env.context.actions().check_connection().await);
    Ok(())
}

#[tokio::test]
async fn test_degraded_start_without_backend() -> Result<()> {
    let env = TestEnvironment::new(APP_VIEW);
    env.factory
        .set_failure(Some(BackendError::unavailable("bad project")));

    assert!(matches!(
        env.context.start().await,
        Err(SessionError::Initialization(_))
    ));

    assert!(!env.context.cache().is_authenticated());
    assert!(!env.context.actions().check_connection().await);
    assert_eq!(
        env.context.actions().wait_for_ready().await,
        Err(SessionError::NotInitialized)
    );

    assert_eq!(
        env.context.actions().sign_out().await,
        Err(SessionError::NotInitialized)
    );
    assert_eq!(env.navigator.navigation_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_releases_subscription() -> Result<()> {
    let mut env = TestEnvironment::new(APP_VIEW);
    env.start().await?;
    assert_eq!(env.backend.listener_count(), 1);

    env.context.shutdown();

    assert_eq!(env.backend.listener_count(), 0);
    assert!(!env.context.bridge().is_running());
    Ok(())
}
