//! Routing of backend failures nobody handled.
//!
//! Callers that cannot deal with a failure hand it to a [`FaultReporter`];
//! a single [`FaultRouter`] task drains the channel, classifies each
//! failure, logs it, and sends the user to the login view when the backend
//! says the session is no longer authenticated.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::BackendError;
use crate::events::{EventStream, Subscriber};
use crate::navigation::{is_on_view, Navigator};

/// Classification of an unhandled failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    PermissionDenied,
    Unavailable,
    Unauthenticated,
    Other(String),
}

impl FaultKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "permission-denied" => FaultKind::PermissionDenied,
            "unavailable" => FaultKind::Unavailable,
            "unauthenticated" => FaultKind::Unauthenticated,
            other => FaultKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::PermissionDenied => write!(f, "permission denied"),
            FaultKind::Unavailable => write!(f, "service unavailable"),
            FaultKind::Unauthenticated => write!(f, "unauthenticated"),
            FaultKind::Other(code) => write!(f, "{}", code),
        }
    }
}

/// A failure that reached the process-wide channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnhandledFailure {
    /// Backend error code, if the failure carried one
    pub code: Option<String>,
    pub detail: String,
}

impl UnhandledFailure {
    pub fn new(code: Option<String>, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    /// A failure without a code, e.g. a plain panic message
    pub fn uncoded(detail: impl Into<String>) -> Self {
        Self::new(None, detail)
    }
}

impl From<BackendError> for UnhandledFailure {
    fn from(error: BackendError) -> Self {
        Self {
            code: Some(error.code.as_str().to_string()),
            detail: error.message,
        }
    }
}

/// What the router did with one failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub kind: FaultKind,
    pub detail: String,
    pub observed_at: DateTime<Utc>,
    /// Whether the router navigated to the login view
    pub redirected: bool,
}

/// Sending side of the unhandled-failure channel
#[derive(Clone)]
pub struct FaultReporter {
    sender: mpsc::UnboundedSender<UnhandledFailure>,
}

impl FaultReporter {
    /// Returns `false` once the router is gone
    pub fn report(&self, failure: impl Into<UnhandledFailure>) -> bool {
        self.sender.send(failure.into()).is_ok()
    }
}

/// Receiving side, consumed by [`FaultRouter::spawn`]
pub struct FaultReceiver {
    receiver: mpsc::UnboundedReceiver<UnhandledFailure>,
}

/// Create the unhandled-failure channel
pub fn fault_channel() -> (FaultReporter, FaultReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (FaultReporter { sender }, FaultReceiver { receiver })
}

/// Classifies unhandled failures and redirects on lost authentication
pub struct FaultRouter {
    navigator: Arc<dyn Navigator>,
    login_view: String,
    records: EventStream<FaultRecord>,
}

impl FaultRouter {
    pub fn new(navigator: Arc<dyn Navigator>, login_view: impl Into<String>) -> Self {
        Self {
            navigator,
            login_view: login_view.into(),
            records: EventStream::default(),
        }
    }

    /// Route one failure. Failures without a code are left alone.
    pub async fn route(&self, failure: UnhandledFailure) -> Option<FaultRecord> {
        let code = match failure.code.as_deref() {
            Some(code) if !code.is_empty() => code,
            _ => {
                debug!(detail = %failure.detail, "Ignoring failure without a code");
                return None;
            }
        };

        let kind = FaultKind::from_code(code);
        let mut redirected = false;

        match &kind {
            FaultKind::PermissionDenied => {
                error!(detail = %failure.detail, "Backend permission denied")
            }
            FaultKind::Unavailable => {
                error!(detail = %failure.detail, "Backend service unavailable")
            }
            FaultKind::Unauthenticated => {
                error!(detail = %failure.detail, "Backend unauthenticated");
                if !is_on_view(&self.navigator.current_view(), &self.login_view) {
                    self.navigator.navigate_to(&self.login_view);
                    redirected = true;
                }
            }
            FaultKind::Other(code) => {
                error!(code = %code, detail = %failure.detail, "Backend error")
            }
        }

        let record = FaultRecord {
            kind,
            detail: failure.detail,
            observed_at: Utc::now(),
            redirected,
        };
        self.records.publish(record.clone()).await;
        Some(record)
    }

    /// Drain `receiver` until every reporter is dropped
    pub fn spawn(self: Arc<Self>, receiver: FaultReceiver) -> JoinHandle<()> {
        let mut receiver = receiver.receiver;
        tokio::spawn(async move {
            info!("Fault router started");
            while let Some(failure) = receiver.recv().await {
                self.route(failure).await;
            }
            debug!("Fault router stopped");
        })
    }

    /// Subscribe to routed fault records
    pub fn subscribe(&self) -> Subscriber<FaultRecord> {
        self.records.subscribe()
    }

    pub async fn recent(&self) -> Vec<FaultRecord> {
        self.records.recent().await
    }
}
