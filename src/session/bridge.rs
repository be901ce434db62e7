use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::cache::SessionCache;
use super::identity::{AuthChange, SessionTransition};
use crate::backend::{AuthBackend, AuthStream, Subscription};
use crate::error::{SessionError, SessionResult};
use crate::events::{EventStream, Subscriber};

#[derive(Default)]
struct BridgeState {
    subscription: Option<Subscription>,
    task: Option<JoinHandle<()>>,
}

/// Translates the backend's auth-change stream into [`SessionCache`] state.
///
/// One standing subscription per bridge; events are applied one at a time
/// by a single consumer task.
pub struct AuthStateBridge {
    cache: SessionCache,
    transitions: Arc<EventStream<SessionTransition>>,
    ready_timeout: Duration,
    state: Mutex<BridgeState>,
}

impl AuthStateBridge {
    pub fn new(cache: SessionCache, ready_timeout: Duration) -> Self {
        Self {
            cache,
            transitions: Arc::new(EventStream::default()),
            ready_timeout,
            state: Mutex::new(BridgeState::default()),
        }
    }

    /// Subscribe to `auth` and start mirroring its changes.
    ///
    /// Returns `Ok(false)` if the bridge was already started. A failed
    /// subscription is not retried.
    pub fn start(&self, auth: &dyn AuthBackend) -> SessionResult<bool> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.subscription.is_some() {
            debug!("Auth state bridge already started");
            return Ok(false);
        }

        let stream = auth.subscribe().map_err(|e| {
            error!(error = %e, "Auth state change error");
            SessionError::Subscription(e)
        })?;

        let subscription = stream.subscription().clone();
        info!(subscription_id = %subscription.id(), "Auth state bridge started");

        let cache = self.cache.clone();
        let transitions = Arc::clone(&self.transitions);
        let task = tokio::spawn(Self::consume(stream, cache, transitions));

        state.subscription = Some(subscription);
        state.task = Some(task);
        Ok(true)
    }

    async fn consume(
        mut stream: AuthStream,
        cache: SessionCache,
        transitions: Arc<EventStream<SessionTransition>>,
    ) {
        while let Some(change) = stream.next().await {
            Self::apply_change(&cache, &transitions, change).await;
        }
        debug!("Auth state stream ended");
    }

    async fn apply_change(
        cache: &SessionCache,
        transitions: &EventStream<SessionTransition>,
        change: AuthChange,
    ) {
        if let Err(e) = cache.apply(&change) {
            error!(error = %e, "Failed to sync session markers");
        }

        match &change {
            Some(identity) => info!(email = %identity.email, "User is signed in"),
            None => info!("User is signed out"),
        }

        transitions
            .publish(SessionTransition::from_change(&change))
            .await;
    }

    /// Cancel the standing subscription and stop the consumer task
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(subscription) = state.subscription.take() {
            subscription.cancel();
        }
        if let Some(task) = state.task.take() {
            task.abort();
        }
        debug!("Auth state bridge stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscription
            .as_ref()
            .is_some_and(|s| !s.is_cancelled())
    }

    /// Subscribe to processed transitions
    pub fn subscribe_transitions(&self) -> Subscriber<SessionTransition> {
        self.transitions.subscribe()
    }

    /// Most recent processed transitions, oldest first
    pub async fn recent_transitions(&self) -> Vec<SessionTransition> {
        self.transitions.recent().await
    }

    /// Resolve with the first auth state the backend reports.
    ///
    /// Uses its own one-shot subscription, cancelled exactly once before
    /// returning, whether a state arrived or the timeout expired.
    pub async fn wait_for_ready(&self, auth: &dyn AuthBackend) -> SessionResult<AuthChange> {
        let mut stream = auth.subscribe().map_err(|e| {
            error!(error = %e, "Failed to subscribe while waiting for auth state");
            SessionError::Subscription(e)
        })?;

        let first = timeout(self.ready_timeout, stream.recv()).await;
        stream.subscription().cancel();

        match first {
            Ok(Some(change)) => Ok(change),
            Ok(None) => Err(SessionError::StreamClosed),
            Err(_) => {
                warn!(
                    timeout_ms = self.ready_timeout.as_millis() as u64,
                    "Timed out waiting for the first auth state"
                );
                Err(SessionError::ReadyTimeout(self.ready_timeout))
            }
        }
    }
}

impl Drop for AuthStateBridge {
    fn drop(&mut self) {
        self.stop();
    }
}
