use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::backend::{BackendFactory, ServiceHandle};
use crate::config::SessionConfig;
use crate::error::{BackendError, PersistenceUnavailable, SessionError, SessionResult};

/// Outcome of the offline persistence request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceStatus {
    NotRequested,
    Enabled,
    Unavailable(PersistenceUnavailable),
    Failed(BackendError),
}

/// One-time setup of the backend handle.
///
/// Concurrent callers share a single construction; a failed construction
/// leaves the slot empty so a later call can try again.
pub struct ServiceInitializer {
    factory: Arc<dyn BackendFactory>,
    handle: OnceCell<ServiceHandle>,
    persistence: RwLock<PersistenceStatus>,
}

impl ServiceInitializer {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            handle: OnceCell::new(),
            persistence: RwLock::new(PersistenceStatus::NotRequested),
        }
    }

    /// Return the registered handle, creating and configuring it on first use
    pub async fn ensure_initialized(&self, config: &SessionConfig) -> SessionResult<ServiceHandle> {
        if let Some(handle) = self.handle.get() {
            info!(app = %handle.app_name(), "Backend already initialized");
            return Ok(handle.clone());
        }

        let handle = self
            .handle
            .get_or_try_init(|| async {
                config.backend.validate().map_err(|e| {
                    error!(error = %e, "Backend initialization error");
                    e
                })?;

                let handle = self.factory.create(&config.backend).map_err(|e| {
                    error!(error = %e, "Backend initialization error");
                    SessionError::Initialization(e)
                })?;
                info!(app = %handle.app_name(), "Backend initialized successfully");

                self.configure(&handle, config).await;
                Ok::<_, SessionError>(handle)
            })
            .await?;

        Ok(handle.clone())
    }

    async fn configure(&self, handle: &ServiceHandle, config: &SessionConfig) {
        let documents = handle.documents();

        if let Err(e) = documents.configure(&config.settings) {
            warn!(error = %e, "Failed to apply document store settings");
        }

        let status = match documents.enable_persistence(&config.persistence).await {
            Ok(()) => {
                info!(synchronize_tabs = config.persistence.synchronize_tabs, "Offline persistence enabled");
                PersistenceStatus::Enabled
            }
            Err(e) => match PersistenceUnavailable::classify(&e) {
                Some(kind) => {
                    warn!("Offline persistence unavailable: {}", kind);
                    PersistenceStatus::Unavailable(kind)
                }
                None => {
                    warn!(error = %e, "Failed to enable offline persistence");
                    PersistenceStatus::Failed(e)
                }
            },
        };

        *self.persistence.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// The registered handle, if initialization has succeeded
    pub fn handle(&self) -> Option<ServiceHandle> {
        self.handle.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.initialized()
    }

    pub fn persistence_status(&self) -> PersistenceStatus {
        self.persistence
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
