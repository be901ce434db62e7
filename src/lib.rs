//! Session and auth-state synchronization over a managed backend.
//!
//! A [`SessionContext`] owns the backend handle, mirrors the backend's
//! authentication stream into a synchronously readable [`SessionCache`],
//! offers sign-out / connection-probe / wait-for-ready actions, and routes
//! unhandled backend failures.

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod faults;
pub mod logging;
pub mod navigation;
pub mod session;
pub mod storage;

pub use backend::{AuthBackend, BackendFactory, Document, DocumentStore, ServiceHandle};
pub use config::{BackendConfig, SessionConfig};
pub use context::SessionContext;
pub use error::{BackendError, BackendErrorCode, SessionError, SessionResult};
pub use faults::{FaultKind, FaultRecord, FaultReporter, FaultRouter, UnhandledFailure};
pub use navigation::{HistoryNavigator, Navigator};
pub use session::{AuthChange, Identity, SessionActions, SessionCache, SessionMarkers, SessionTransition};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
