//! In-process event source fed by a producer

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use super::{EventSource, NetworkEvent};

/// Fan-out event source: every subscriber receives every published event
#[derive(Default)]
pub struct ChannelEventSource {
    subscribers: DashMap<u64, mpsc::Sender<NetworkEvent>>,
    next_id: AtomicU64,
}

impl ChannelEventSource {
    /// Create a source with no subscribers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every live subscriber, waiting for buffer space
    ///
    /// Returns the number of subscribers that received it.
    pub async fn publish(&self, event: NetworkEvent) -> usize {
        let senders: Vec<_> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (id, sender) in senders {
            if sender.send(event.clone()).await.is_ok() {
                delivered += 1;
            } else {
                debug!("Dropping closed subscriber {}", id);
                self.subscribers.remove(&id);
            }
        }

        delivered
    }

    /// Number of subscribers whose receiver is still alive
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.retain(|_, sender| !sender.is_closed());
        self.subscribers.len()
    }
}

impl EventSource for ChannelEventSource {
    fn subscribe(&self, capacity: usize) -> mpsc::Receiver<NetworkEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::error::BoxError;
    use crate::har::tests::entry;
    use crate::source::{Body, FetchContent};

    struct Empty;

    #[async_trait]
    impl FetchContent for Empty {
        async fn fetch_content(&self) -> Result<Body, BoxError> {
            Ok(Body::text(""))
        }
    }

    fn event(url: &str) -> NetworkEvent {
        NetworkEvent::new(entry(url), Arc::new(Empty))
    }

    #[tokio::test]
    async fn test_publish_fans_out() {
        let source = ChannelEventSource::new();
        let mut rx1 = source.subscribe(4);
        let mut rx2 = source.subscribe(4);

        let delivered = source.publish(event("https://example.com/a")).await;
        assert_eq!(delivered, 2);

        assert_eq!(rx1.recv().await.unwrap().entry.request.url, "https://example.com/a");
        assert_eq!(rx2.recv().await.unwrap().entry.request.url, "https://example.com/a");
    }

    #[tokio::test]
    async fn test_dropped_receiver_unsubscribes() {
        let source = ChannelEventSource::new();
        let rx = source.subscribe(4);
        assert_eq!(source.subscriber_count(), 1);

        drop(rx);

        assert_eq!(source.publish(event("https://example.com/a")).await, 0);
        assert_eq!(source.subscriber_count(), 0);
    }
}
