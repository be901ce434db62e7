//! Contract of the managed backend consumed by the session layer.
//!
//! The backend is opaque: it exposes an authentication-change stream,
//! sign-out, document reads, and store settings. Bundled implementations are
//! an in-process emulator ([`MemoryBackend`]) and a REST document reader
//! ([`RestDocumentStore`], paired with any auth backend by
//! [`RestBackendFactory`]).

pub mod memory;
pub mod rest;
pub mod subscription;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{BackendConfig, PersistenceOptions, StoreSettings};
use crate::error::BackendError;

pub use memory::{MemoryBackend, MemoryBackendFactory};
pub use rest::{RestBackendFactory, RestDocumentStore};
pub use subscription::{AuthStream, Subscription, SubscriptionId};

/// A document read from the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Slash separated path, e.g. `system/test`
    pub path: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Authentication half of the backend
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Subscribe to authentication changes.
    ///
    /// The stream yields the current state first and then every transition.
    fn subscribe(&self) -> Result<AuthStream, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;
}

/// Document database half of the backend
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn configure(&self, settings: &StoreSettings) -> Result<(), BackendError>;

    async fn enable_persistence(&self, options: &PersistenceOptions) -> Result<(), BackendError>;

    /// Read a document; `Ok(None)` when it does not exist
    async fn get_document(&self, path: &str) -> Result<Option<Document>, BackendError>;
}

/// Builds backend handles from connection settings
pub trait BackendFactory: Send + Sync {
    fn create(&self, config: &BackendConfig) -> Result<ServiceHandle, BackendError>;
}

/// A registered backend instance
#[derive(Clone)]
pub struct ServiceHandle {
    app_name: String,
    auth: Arc<dyn AuthBackend>,
    documents: Arc<dyn DocumentStore>,
}

impl ServiceHandle {
    pub fn new(
        app_name: impl Into<String>,
        auth: Arc<dyn AuthBackend>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            auth,
            documents,
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn auth(&self) -> Arc<dyn AuthBackend> {
        Arc::clone(&self.auth)
    }

    pub fn documents(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.documents)
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("app_name", &self.app_name)
            .finish_non_exhaustive()
    }
}
