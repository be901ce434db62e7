//! Integration tests for unhandled failure routing
use std::time::Duration;

use anyhow::Result;
use tokio::time::timeout;

use session_bridge::{BackendError, FaultKind, UnhandledFailure};

use crate::test_harness::{TestEnvironment, APP_VIEW, LOGIN_VIEW};

#[tokio::test]
async fn test_unauthenticated_fault_redirects_once() -> Result<()> {
    let mut env = TestEnvironment::new(APP_VIEW);
    let mut records = env.context.fault_router().subscribe();
    env.start().await?;

    let reporter = env.context.fault_reporter();
    assert!(reporter.report(BackendError::unauthenticated("token expired")));

    let record = timeout(Duration::from_secs(1), records.recv()).await??;
    assert_eq!(record.kind, FaultKind::Unauthenticated);
    assert!(record.redirected);
    assert_eq!(env.navigator.navigations(), vec![LOGIN_VIEW.to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_unauthenticated_fault_on_login_view() -> Result<()> {
    let mut env = TestEnvironment::new("/index.html");
    let mut records = env.context.fault_router().subscribe();
    env.start().await?;

    env.context
        .fault_reporter()
        .report(BackendError::unauthenticated("no user"));

    let record = timeout(Duration::from_secs(1), records.recv()).await??;
    assert!(!record.redirected);
    assert_eq!(env.navigator.navigation_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_faults_are_classified_without_navigation() -> Result<()> {
    let mut env = TestEnvironment::new(APP_VIEW);
    let mut records = env.context.fault_router().subscribe();
    env.start().await?;

    let reporter = env.context.fault_reporter();
    reporter.report(BackendError::permission_denied("rules"));
    reporter.report(UnhandledFailure::uncoded("plain failure"));
    reporter.report(BackendError::unavailable("offline"));
    reporter.report(UnhandledFailure::new(Some("deadline-exceeded".into()), "slow"));

    let mut kinds = Vec::new();
    for _ in 0..3 {
        kinds.push(timeout(Duration::from_secs(1), records.recv()).await??.kind);
    }

    assert_eq!(
        kinds,
        vec![
            FaultKind::PermissionDenied,
            FaultKind::Unavailable,
            FaultKind::Other("deadline-exceeded".into()),
        ]
    );
    assert_eq!(env.navigator.navigation_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_router_runs_even_when_backend_is_missing() -> Result<()> {
    let env = TestEnvironment::new(APP_VIEW);
    let mut records = env.context.fault_router().subscribe();
    env.factory
        .set_failure(Some(BackendError::unavailable("bad project")));
    assert!(env.context.start().await.is_err());

    env.context
        .fault_reporter()
        .report(BackendError::unauthenticated("expired"));

    let record = timeout(Duration::from_secs(1), records.recv()).await??;
    assert!(record.redirected);
    Ok(())
}
