use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::backend::{BackendFactory, ServiceHandle};
use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::faults::{fault_channel, FaultReceiver, FaultReporter, FaultRouter};
use crate::navigation::Navigator;
use crate::session::{AuthStateBridge, SessionActions, SessionCache, ServiceInitializer};
use crate::storage::{KeyValueStore, MemoryStore};

/// Owner of every session component for one application instance.
///
/// Construct it once, call [`SessionContext::start`], and hand out references.
pub struct SessionContext {
    config: SessionConfig,
    initializer: Arc<ServiceInitializer>,
    cache: SessionCache,
    bridge: Arc<AuthStateBridge>,
    actions: SessionActions,
    fault_router: Arc<FaultRouter>,
    fault_reporter: FaultReporter,
    fault_receiver: Mutex<Option<FaultReceiver>>,
    fault_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionContext {
    pub fn new(
        config: SessionConfig,
        factory: Arc<dyn BackendFactory>,
        navigator: Arc<dyn Navigator>,
        session_store: Arc<dyn KeyValueStore>,
        persistent_store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let initializer = Arc::new(ServiceInitializer::new(factory));
        let cache = SessionCache::new(Arc::clone(&session_store));
        let bridge = Arc::new(AuthStateBridge::new(cache.clone(), config.ready_timeout));
        let actions = SessionActions::new(
            Arc::clone(&initializer),
            Arc::clone(&bridge),
            session_store,
            persistent_store,
            Arc::clone(&navigator),
            config.login_view.clone(),
            config.sentinel_document.clone(),
        );
        let fault_router = Arc::new(FaultRouter::new(navigator, config.login_view.clone()));
        let (fault_reporter, fault_receiver) = fault_channel();

        Self {
            config,
            initializer,
            cache,
            bridge,
            actions,
            fault_router,
            fault_reporter,
            fault_receiver: Mutex::new(Some(fault_receiver)),
            fault_task: Mutex::new(None),
        }
    }

    /// Context with in-memory stores for both storage scopes
    pub fn in_memory(
        config: SessionConfig,
        factory: Arc<dyn BackendFactory>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::new(
            config,
            factory,
            navigator,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Initialize the backend, start the auth bridge and the fault router.
    ///
    /// The fault router runs even when initialization fails; the context then
    /// stays usable in a degraded mode where backend calls fail one by one.
    pub async fn start(&self) -> SessionResult<ServiceHandle> {
        self.start_fault_router();

        let handle = match self.initializer.ensure_initialized(&self.config).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "Continuing without a backend");
                return Err(e);
            }
        };

        if let Err(e) = self.bridge.start(handle.auth().as_ref()) {
            error!(error = %e, "Auth state bridge did not start");
            return Err(e);
        }

        info!(app = %handle.app_name(), "Session context started");
        Ok(handle)
    }

    fn start_fault_router(&self) {
        let receiver = self
            .fault_receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(receiver) = receiver {
            let task = Arc::clone(&self.fault_router).spawn(receiver);
            *self.fault_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        }
    }

    /// Stop the auth bridge and the fault router
    pub fn shutdown(&self) {
        self.bridge.stop();
        if let Some(task) = self
            .fault_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        info!("Session context shut down");
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn initializer(&self) -> &ServiceInitializer {
        &self.initializer
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn bridge(&self) -> &AuthStateBridge {
        &self.bridge
    }

    pub fn actions(&self) -> &SessionActions {
        &self.actions
    }

    pub fn fault_router(&self) -> &FaultRouter {
        &self.fault_router
    }

    /// Handle for reporting failures no caller dealt with
    pub fn fault_reporter(&self) -> FaultReporter {
        self.fault_reporter.clone()
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        if let Some(task) = self
            .fault_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}
