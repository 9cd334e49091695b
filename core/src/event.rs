//! Change notification: "something in the collection changed, refetch".
//!
//! Notices carry no delta payload. The only correct reaction is a full
//! refetch, which sidesteps merge and conflict handling entirely.

use async_trait::async_trait;
use std::sync::Arc;

/// Topic carrying changes to the wish collection.
pub const WISHES_TOPIC: &str = "wishes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub topic: String,
}

impl ChangeNotice {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn wishes() -> Self {
        Self::new(WISHES_TOPIC)
    }
}

/// Represents a source of events (e.g., a broadcast channel, a socket).
#[async_trait]
pub trait EventSource<E>: Send + Sync {
    /// Returns the next event, or None if the source is exhausted/closed.
    async fn next_event(&mut self) -> Option<E>;
}

/// A live subscription to one topic. Dropping it unsubscribes.
pub struct Subscription {
    topic: String,
    source: Box<dyn EventSource<ChangeNotice>>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, source: impl EventSource<ChangeNotice> + 'static) -> Self {
        Self {
            topic: topic.into(),
            source: Box::new(source),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next notice; `None` once the feed is closed.
    pub async fn next_change(&mut self) -> Option<ChangeNotice> {
        self.source.next_event().await
    }

    pub fn unsubscribe(self) {
        tracing::debug!(tandem.topic = %self.topic, "Unsubscribed from change feed");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish()
    }
}

/// The realtime collaborator, reduced to subscribe and publish.
pub trait ChangeFeed: Send + Sync + 'static {
    fn subscribe(&self, topic: &str) -> Subscription;

    fn publish(&self, notice: ChangeNotice);
}

pub type SharedFeed = Arc<dyn ChangeFeed>;

impl<F: ChangeFeed + ?Sized> ChangeFeed for Arc<F> {
    fn subscribe(&self, topic: &str) -> Subscription {
        (**self).subscribe(topic)
    }

    fn publish(&self, notice: ChangeNotice) {
        (**self).publish(notice)
    }
}
