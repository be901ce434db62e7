use std::sync::{Arc, PoisonError, RwLock};

use super::identity::{AuthChange, Identity, SessionMarkers, USER_EMAIL_KEY, USER_ID_KEY};
use crate::error::StorageResult;
use crate::storage::KeyValueStore;

/// Locally mirrored identity, readable synchronously from anywhere.
///
/// The identity and the session markers are only changed together under the
/// write lock, so a reader never sees one updated without the other. None of
/// the accessors touch the backend.
#[derive(Clone)]
pub struct SessionCache {
    identity: Arc<RwLock<AuthChange>>,
    session_store: Arc<dyn KeyValueStore>,
}

impl SessionCache {
    pub fn new(session_store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            identity: Arc::new(RwLock::new(None)),
            session_store,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.read(|identity| identity.is_some())
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.read(Clone::clone)
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.read(|identity| identity.as_ref().map(|i| i.user_id.clone()))
    }

    pub fn current_user_email(&self) -> Option<String> {
        self.read(|identity| identity.as_ref().map(|i| i.email.clone()))
    }

    /// Markers as currently held by the session store
    pub fn markers(&self) -> Option<SessionMarkers> {
        self.read(|_| {
            let user_email = self.session_store.get(USER_EMAIL_KEY)?;
            let user_id = self.session_store.get(USER_ID_KEY)?;
            Some(SessionMarkers {
                user_email,
                user_id,
            })
        })
    }

    fn read<T>(&self, f: impl FnOnce(&AuthChange) -> T) -> T {
        let guard = self.identity.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Replace the identity and sync the markers in one critical section.
    ///
    /// The identity is replaced even when the store write fails.
    pub(crate) fn apply(&self, change: &AuthChange) -> StorageResult<()> {
        let mut guard = self.identity.write().unwrap_or_else(PoisonError::into_inner);
        *guard = change.clone();

        match change {
            Some(identity) => self.write_markers(&SessionMarkers::from(identity)),
            None => self.clear_markers(),
        }
    }

    fn write_markers(&self, markers: &SessionMarkers) -> StorageResult<()> {
        self.session_store.set(USER_EMAIL_KEY, &markers.user_email)?;
        self.session_store.set(USER_ID_KEY, &markers.user_id)
    }

    fn clear_markers(&self) -> StorageResult<()> {
        self.session_store.remove(USER_EMAIL_KEY)?;
        self.session_store.remove(USER_ID_KEY)
    }
}
