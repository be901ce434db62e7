use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::session::AuthChange;

/// Type for subscription IDs
pub type SubscriptionId = Uuid;

type ReleaseFn = dyn Fn(SubscriptionId) + Send + Sync;

/// Handle to a live subscription on the auth-change stream.
///
/// Clones share state: `cancel` releases the backend side exactly once no
/// matter how many clones call it, including from inside the consumer loop.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    cancelled: Arc<AtomicBool>,
    release: Arc<ReleaseFn>,
}

impl Subscription {
    pub fn new<F>(id: SubscriptionId, release: F) -> Self
    where
        F: Fn(SubscriptionId) + Send + Sync + 'static,
    {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
            release: Arc::new(release),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Cancel the subscription. Returns `true` only for the call that did it.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            debug!(subscription_id = %self.id, "Subscription already cancelled");
            return false;
        }

        (self.release)(self.id);
        debug!(subscription_id = %self.id, "Cancelled subscription");
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Single-consumer stream of authentication changes.
///
/// Dropping the stream cancels its subscription.
pub struct AuthStream {
    receiver: mpsc::UnboundedReceiver<AuthChange>,
    subscription: Subscription,
}

impl AuthStream {
    pub fn new(receiver: mpsc::UnboundedReceiver<AuthChange>, subscription: Subscription) -> Self {
        Self {
            receiver,
            subscription,
        }
    }

    /// Next change; `None` once the backend side has gone away or the
    /// subscription was cancelled and drained
    pub async fn recv(&mut self) -> Option<AuthChange> {
        if self.subscription.is_cancelled() {
            return None;
        }
        self.receiver.recv().await
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Stream for AuthStream {
    type Item = AuthChange;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.subscription.is_cancelled() {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for AuthStream {
    fn drop(&mut self) {
        self.subscription.cancel();
    }
}
