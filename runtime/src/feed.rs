//! In-process change feed over `tokio::sync::broadcast`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tandem_core::event::{ChangeFeed, ChangeNotice, EventSource, Subscription};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// One broadcast channel per topic, created on first use.
pub struct BroadcastFeed {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<ChangeNotice>>>,
}

impl BroadcastFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<ChangeNotice> {
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map_or(0, |tx| tx.receiver_count())
    }
}

impl Default for BroadcastFeed {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ChangeFeed for BroadcastFeed {
    fn subscribe(&self, topic: &str) -> Subscription {
        let rx = self.sender(topic).subscribe();
        tracing::debug!(tandem.topic = %topic, "Subscribed to change feed");
        Subscription::new(
            topic,
            BroadcastSource {
                topic: topic.to_string(),
                rx,
            },
        )
    }

    fn publish(&self, notice: ChangeNotice) {
        let tx = self.topics.lock().get(&notice.topic).cloned();
        match tx {
            Some(tx) => {
                // No receivers is not an error: nobody is mounted.
                let _ = tx.send(notice);
            }
            None => tracing::trace!(tandem.topic = %notice.topic, "No subscribers for notice"),
        }
    }
}

struct BroadcastSource {
    topic: String,
    rx: broadcast::Receiver<ChangeNotice>,
}

impl BroadcastSource {
    /// Swallows notices already queued behind the one just delivered.
    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }
}

#[async_trait]
impl EventSource<ChangeNotice> for BroadcastSource {
    async fn next_event(&mut self) -> Option<ChangeNotice> {
        let notice = match self.rx.recv().await {
            Ok(notice) => notice,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(tandem.topic = %self.topic, skipped, "Change feed lagged; coalescing");
                ChangeNotice::new(self.topic.clone())
            }
            Err(RecvError::Closed) => return None,
        };
        self.drain();
        Some(notice)
    }
}
