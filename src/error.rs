use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes reported by the managed backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendErrorCode {
    PermissionDenied,
    Unavailable,
    Unauthenticated,
    FailedPrecondition,
    Unimplemented,
    NotFound,
    InvalidArgument,
    Internal,
    Unknown,
}

impl BackendErrorCode {
    /// Wire form of the code, as the backend spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendErrorCode::PermissionDenied => "permission-denied",
            BackendErrorCode::Unavailable => "unavailable",
            BackendErrorCode::Unauthenticated => "unauthenticated",
            BackendErrorCode::FailedPrecondition => "failed-precondition",
            BackendErrorCode::Unimplemented => "unimplemented",
            BackendErrorCode::NotFound => "not-found",
            BackendErrorCode::InvalidArgument => "invalid-argument",
            BackendErrorCode::Internal => "internal",
            BackendErrorCode::Unknown => "unknown",
        }
    }

    /// Map the upper-case status names used by the REST API
    /// (e.g. `PERMISSION_DENIED`) onto a code
    pub fn from_status_name(status: &str) -> Self {
        match status {
            "PERMISSION_DENIED" => BackendErrorCode::PermissionDenied,
            "UNAVAILABLE" => BackendErrorCode::Unavailable,
            "UNAUTHENTICATED" => BackendErrorCode::Unauthenticated,
            "FAILED_PRECONDITION" => BackendErrorCode::FailedPrecondition,
            "UNIMPLEMENTED" => BackendErrorCode::Unimplemented,
            "NOT_FOUND" => BackendErrorCode::NotFound,
            "INVALID_ARGUMENT" => BackendErrorCode::InvalidArgument,
            "INTERNAL" => BackendErrorCode::Internal,
            _ => BackendErrorCode::Unknown,
        }
    }
}

impl fmt::Display for BackendErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure returned by any backend call
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct BackendError {
    /// Error code for programmatic handling
    pub code: BackendErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl BackendError {
    pub fn new(code: BackendErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::PermissionDenied, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::Unavailable, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::Unauthenticated, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::FailedPrecondition, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(BackendErrorCode::Unimplemented, message)
    }
}

/// Why offline persistence could not be enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceUnavailable {
    /// Another tab already holds the persistence lease
    MultiTabConflict,
    /// The environment lacks a capability persistence needs
    UnsupportedEnvironment,
}

impl PersistenceUnavailable {
    /// Classify a persistence failure; `None` for errors outside the two known kinds
    pub fn classify(error: &BackendError) -> Option<Self> {
        match error.code {
            BackendErrorCode::FailedPrecondition => Some(PersistenceUnavailable::MultiTabConflict),
            BackendErrorCode::Unimplemented => Some(PersistenceUnavailable::UnsupportedEnvironment),
            _ => None,
        }
    }
}

impl fmt::Display for PersistenceUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceUnavailable::MultiTabConflict => write!(
                f,
                "multiple tabs open, persistence can only be enabled in one tab at a time"
            ),
            PersistenceUnavailable::UnsupportedEnvironment => write!(
                f,
                "the current environment doesn't support all features required for persistence"
            ),
        }
    }
}

/// Failures of the local key/value stores
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage I/O failed for '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to serialize store contents: {0}")]
    Serialization(String),
}

/// Session layer error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Backend initialization failed: {0}")]
    Initialization(BackendError),

    #[error("Missing configuration value '{key}'")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for '{key}': {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Backend is not initialized")]
    NotInitialized,

    #[error("Failed to subscribe to authentication changes: {0}")]
    Subscription(BackendError),

    #[error("Sign-out failed: {0}")]
    SignOut(BackendError),

    #[error("Connection check failed: {0}")]
    ConnectionCheck(BackendError),

    #[error("No authentication state received within {0:?}")]
    ReadyTimeout(Duration),

    #[error("Authentication stream closed before delivering a state")]
    StreamClosed,
}

impl SessionError {
    /// The backend error underneath this failure, if any
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            SessionError::Initialization(e)
            | SessionError::Subscription(e)
            | SessionError::SignOut(e)
            | SessionError::ConnectionCheck(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for the session layer
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for the key/value stores
pub type StorageResult<T> = Result<T, StorageError>;
