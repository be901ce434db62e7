//! In-process emulator of the managed backend.
//!
//! Useful for local development and for exercising the session layer
//! without network access: auth state can be driven by hand, documents
//! seeded, and any operation made to fail with a chosen error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AuthBackend, AuthStream, BackendFactory, Document, DocumentStore, ServiceHandle, Subscription, SubscriptionId};
use crate::config::{BackendConfig, PersistenceOptions, StoreSettings};
use crate::error::BackendError;
use crate::session::{AuthChange, Identity};

pub const DEFAULT_APP_NAME: &str = "[DEFAULT]";

/// Backend operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Subscribe,
    SignOut,
    Read,
    Configure,
    EnablePersistence,
}

#[derive(Default)]
struct Inner {
    /// Held while a change is broadcast or a listener registers, so every
    /// listener sees the current state followed by every later change
    current: Mutex<AuthChange>,
    listeners: DashMap<SubscriptionId, mpsc::UnboundedSender<AuthChange>>,
    documents: DashMap<String, Document>,
    settings: RwLock<Option<StoreSettings>>,
    persistence: RwLock<Option<PersistenceOptions>>,
    failures: DashMap<Operation, BackendError>,
}

/// Emulated backend; clones share the same state
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign a user in and notify every listener
    pub fn sign_in(&self, identity: Identity) {
        info!(email = %identity.email, "Emulated sign-in");
        self.set_current(Some(identity));
    }

    /// Replace the auth state and notify every listener
    pub fn set_current(&self, change: AuthChange) {
        let mut current = self
            .inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *current = change.clone();
        self.broadcast(change);
    }

    pub fn current_user(&self) -> AuthChange {
        self.inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn insert_document(&self, document: Document) {
        self.inner.documents.insert(document.path.clone(), document);
    }

    /// Make every future call of `operation` fail with `error`
    pub fn fail(&self, operation: Operation, error: BackendError) {
        self.inner.failures.insert(operation, error);
    }

    pub fn clear_failure(&self, operation: Operation) {
        self.inner.failures.remove(&operation);
    }

    /// Number of live auth subscriptions
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub fn settings(&self) -> Option<StoreSettings> {
        self.inner
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn persistence(&self) -> Option<PersistenceOptions> {
        self.inner
            .persistence
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self, operation: Operation) -> Result<(), BackendError> {
        match self.inner.failures.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn broadcast(&self, change: AuthChange) {
        // Snapshot first so no map guard is held while listeners run
        let listeners: Vec<_> = self
            .inner
            .listeners
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (id, sender) in listeners {
            if sender.send(change.clone()).is_err() {
                self.inner.listeners.remove(&id);
            }
        }
        debug!(listeners = self.inner.listeners.len(), "Broadcast auth change");
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    fn subscribe(&self) -> Result<AuthStream, BackendError> {
        self.check(Operation::Subscribe)?;

        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();

        // The current state is delivered first
        {
            let current = self
                .inner
                .current
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let _ = sender.send(current.clone());
            self.inner.listeners.insert(id, sender);
        }

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let subscription = Subscription::new(id, move |id| {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.remove(&id);
            }
        });

        debug!(subscription_id = %id, "Registered auth listener");
        Ok(AuthStream::new(receiver, subscription))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.check(Operation::SignOut)?;
        info!("Emulated sign-out");
        self.set_current(None);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    fn configure(&self, settings: &StoreSettings) -> Result<(), BackendError> {
        self.check(Operation::Configure)?;
        *self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        Ok(())
    }

    async fn enable_persistence(&self, options: &PersistenceOptions) -> Result<(), BackendError> {
        self.check(Operation::EnablePersistence)?;
        *self
            .inner
            .persistence
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(options.clone());
        Ok(())
    }

    async fn get_document(&self, path: &str) -> Result<Option<Document>, BackendError> {
        self.check(Operation::Read)?;
        Ok(self.inner.documents.get(path).map(|doc| doc.clone()))
    }
}

/// Factory handing out the same emulated backend, counting constructions
#[derive(Default)]
pub struct MemoryBackendFactory {
    backend: MemoryBackend,
    created: AtomicUsize,
    failure: Mutex<Option<BackendError>>,
}

impl MemoryBackendFactory {
    pub fn new(backend: MemoryBackend) -> Self {
        Self {
            backend,
            created: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    /// Number of successful `create` calls
    pub fn instances_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Make `create` fail (or succeed again with `None`)
    pub fn set_failure(&self, failure: Option<BackendError>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = failure;
    }
}

impl BackendFactory for MemoryBackendFactory {
    fn create(&self, config: &BackendConfig) -> Result<ServiceHandle, BackendError> {
        if let Some(error) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }

        self.created.fetch_add(1, Ordering::SeqCst);

        let app_name = if config.app_id.is_empty() {
            DEFAULT_APP_NAME.to_string()
        } else {
            config.app_id.clone()
        };

        Ok(ServiceHandle::new(
            app_name,
            Arc::new(self.backend.clone()),
            Arc::new(self.backend.clone()),
        ))
    }
}
