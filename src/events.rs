use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};

pub const EVENT_STREAM_CAPACITY: usize = 64;
pub const EVENT_BUFFER_SIZE: usize = 32;

/// Broadcast stream that also keeps the most recent events for late readers
pub struct EventStream<T: Clone + Send + Sync + 'static> {
    sender: broadcast::Sender<T>,
    buffer: Arc<RwLock<VecDeque<T>>>,
    buffer_size: usize,
    stats: Arc<RwLock<EventStreamStats>>,
}

/// Statistics for monitoring stream activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStreamStats {
    pub events_published: u64,
    /// Events published while nobody was subscribed
    pub events_unobserved: u64,
}

impl<T: Clone + Send + Sync + 'static> EventStream<T> {
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(buffer_size))),
            buffer_size,
            stats: Arc::new(RwLock::new(EventStreamStats::default())),
        }
    }

    pub fn subscribe(&self) -> Subscriber<T> {
        debug!("New subscriber registered to event stream");
        Subscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish to current subscribers and buffer the event.
    ///
    /// Returns how many subscribers received it; having none is not an error.
    pub async fn publish(&self, event: T) -> usize {
        let delivered = self.sender.send(event.clone()).unwrap_or(0);
        self.buffer_event(event).await;

        let mut stats = self.stats.write().await;
        stats.events_published += 1;
        if delivered == 0 {
            stats.events_unobserved += 1;
        }
        trace!(receivers = delivered, "Event published");

        delivered
    }

    async fn buffer_event(&self, event: T) {
        let mut buffer = self.buffer.write().await;
        buffer.push_back(event);

        while buffer.len() > self.buffer_size {
            buffer.pop_front();
        }
    }

    /// Buffered events, oldest first
    pub async fn recent(&self) -> Vec<T> {
        self.buffer.read().await.iter().cloned().collect()
    }

    pub async fn get_stats(&self) -> EventStreamStats {
        self.stats.read().await.clone()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for EventStream<T> {
    fn default() -> Self {
        Self::new(EVENT_STREAM_CAPACITY, EVENT_BUFFER_SIZE)
    }
}

/// Subscriber for receiving events from a stream
pub struct Subscriber<T: Clone + Send + 'static> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> Subscriber<T> {
    pub async fn recv(&mut self) -> Result<T, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}
