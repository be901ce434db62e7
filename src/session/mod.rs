//! Session state mirrored from the backend's authentication stream.

pub mod actions;
pub mod bridge;
pub mod cache;
pub mod identity;
pub mod initializer;

pub use actions::SessionActions;
pub use bridge::AuthStateBridge;
pub use cache::SessionCache;
pub use identity::{AuthChange, Identity, SessionMarkers, SessionTransition, USER_EMAIL_KEY, USER_ID_KEY};
pub use initializer::{PersistenceStatus, ServiceInitializer};
