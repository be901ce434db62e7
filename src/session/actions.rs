use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::bridge::AuthStateBridge;
use super::identity::AuthChange;
use super::initializer::ServiceInitializer;
use crate::error::{SessionError, SessionResult};
use crate::navigation::Navigator;
use crate::storage::KeyValueStore;

/// Imperative session operations built on the backend handle
pub struct SessionActions {
    initializer: Arc<ServiceInitializer>,
    bridge: Arc<AuthStateBridge>,
    session_store: Arc<dyn KeyValueStore>,
    persistent_store: Arc<dyn KeyValueStore>,
    navigator: Arc<dyn Navigator>,
    login_view: String,
    sentinel_document: String,
}

impl SessionActions {
    pub fn new(
        initializer: Arc<ServiceInitializer>,
        bridge: Arc<AuthStateBridge>,
        session_store: Arc<dyn KeyValueStore>,
        persistent_store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        login_view: impl Into<String>,
        sentinel_document: impl Into<String>,
    ) -> Self {
        Self {
            initializer,
            bridge,
            session_store,
            persistent_store,
            navigator,
            login_view: login_view.into(),
            sentinel_document: sentinel_document.into(),
        }
    }

    /// Sign out with a full local teardown.
    ///
    /// Both stores are emptied and the login view is shown whether or not the
    /// backend call succeeds; the returned error only reports the backend side.
    pub async fn sign_out(&self) -> SessionResult<()> {
        self.clear_local_storage();

        let result = match self.initializer.handle() {
            Some(handle) => handle.auth().sign_out().await.map_err(SessionError::SignOut),
            None => Err(SessionError::NotInitialized),
        };

        match &result {
            Ok(()) => info!("Signed out"),
            Err(e) => {
                error!(error = %e, "Logout error");
                // Force the local side of the logout even though the backend refused
                self.clear_local_storage();
            }
        }

        self.navigator.navigate_to(&self.login_view);
        result
    }

    fn clear_local_storage(&self) {
        if let Err(e) = self.persistent_store.clear() {
            error!(error = %e, "Failed to clear persistent storage");
        }
        if let Err(e) = self.session_store.clear() {
            error!(error = %e, "Failed to clear session storage");
        }
    }

    /// Read the sentinel document, reporting why the backend could not be reached
    pub async fn probe_connection(&self) -> SessionResult<()> {
        let handle = self.initializer.handle().ok_or(SessionError::NotInitialized)?;

        handle
            .documents()
            .get_document(&self.sentinel_document)
            .await
            .map(|document| {
                debug!(
                    path = %self.sentinel_document,
                    exists = document.is_some(),
                    "Connection probe succeeded"
                );
            })
            .map_err(SessionError::ConnectionCheck)
    }

    /// Whether the backend answered a read of the sentinel document.
    ///
    /// A missing document still counts as reachable. Permission and network
    /// failures both report `false`.
    pub async fn check_connection(&self) -> bool {
        match self.probe_connection().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Connection check failed");
                false
            }
        }
    }

    /// First auth state reported by the backend, bounded by the ready timeout
    pub async fn wait_for_ready(&self) -> SessionResult<AuthChange> {
        let handle = self.initializer.handle().ok_or(SessionError::NotInitialized)?;
        self.bridge.wait_for_ready(handle.auth().as_ref()).await
    }
}
