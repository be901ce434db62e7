//! Integration test harness
//! Builds a SessionContext wired to the in-memory backend and stores

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::time::timeout;

use session_bridge::backend::{MemoryBackend, MemoryBackendFactory};
use session_bridge::events::Subscriber;
use session_bridge::{
    BackendConfig, HistoryNavigator, MemoryStore, SessionConfig, SessionContext, SessionTransition,
};

pub const APP_VIEW: &str = "/app/attendance.html";
pub const LOGIN_VIEW: &str = "index.html";

/// Test environment for integration tests
pub struct TestEnvironment {
    pub context: SessionContext,
    pub factory: Arc<MemoryBackendFactory>,
    pub backend: MemoryBackend,
    pub navigator: Arc<HistoryNavigator>,
    pub session_store: Arc<MemoryStore>,
    pub persistent_store: Arc<MemoryStore>,
    transitions: Subscriber<SessionTransition>,
}

pub fn test_config() -> SessionConfig {
    let mut config = SessionConfig::new(BackendConfig {
        api_key: "test-api-key".into(),
        auth_domain: "attendance.example.com".into(),
        project_id: "attendance".into(),
        app_id: "1:web:test".into(),
        ..Default::default()
    });
    config.ready_timeout = Duration::from_millis(200);
    config
}

impl TestEnvironment {
    /// Create an environment whose user is looking at `view`
    pub fn new(view: &str) -> Self {
        let backend = MemoryBackend::new();
        let factory = Arc::new(MemoryBackendFactory::new(backend.clone()));
        let navigator = Arc::new(HistoryNavigator::new(view));
        let session_store = Arc::new(MemoryStore::new());
        let persistent_store = Arc::new(MemoryStore::new());

        let context = SessionContext::new(
            test_config(),
            factory.clone(),
            navigator.clone(),
            session_store.clone(),
            persistent_store.clone(),
        );
        let transitions = context.bridge().subscribe_transitions();

        Self {
            context,
            factory,
            backend,
            navigator,
            session_store,
            persistent_store,
            transitions,
        }
    }

    /// Start the context and consume the initial auth state
    pub async fn start(&mut self) -> Result<SessionTransition> {
        self.context
            .start()
            .await
            .map_err(|e| anyhow!("context failed to start: {}", e))?;
        self.next_transition().await
    }

    /// Wait until the bridge has processed the next auth change
    pub async fn next_transition(&mut self) -> Result<SessionTransition> {
        timeout(Duration::from_secs(1), self.transitions.recv())
            .await
            .map_err(|_| anyhow!("no transition within 1s"))?
            .map_err(|e| anyhow!("transition stream error: {}", e))
    }

    /// Whether another transition arrives within `window`
    pub async fn transition_within(&mut self, window: Duration) -> bool {
        timeout(window, self.transitions.recv()).await.is_ok()
    }
}
