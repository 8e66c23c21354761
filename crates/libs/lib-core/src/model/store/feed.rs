//! # Live Message Feed
//!
//! Per-conversation change notifier backing the live query layer.
//! Subscribers reload a full ordered snapshot on every tick rather than
//! applying deltas, so a lagged receiver loses nothing but a redundant
//! reload.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const FEED_CAPACITY: usize = 64;

/// Registry of per-conversation broadcast senders, created on demand.
#[derive(Debug, Default)]
pub struct MessageFeed {
    senders: RwLock<HashMap<String, broadcast::Sender<()>>>,
}

impl MessageFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn sender(&self, conversation_id: &str) -> broadcast::Sender<()> {
        let mut senders = self.senders.write().await;

        if let Some(sender) = senders.get(conversation_id) {
            sender.clone()
        } else {
            let (tx, _) = broadcast::channel(FEED_CAPACITY);
            senders.insert(conversation_id.to_string(), tx.clone());
            tx
        }
    }

    /// Subscribe to change ticks for one conversation.
    pub async fn subscribe(&self, conversation_id: &str) -> broadcast::Receiver<()> {
        self.sender(conversation_id).await.subscribe()
    }

    /// Signal that the conversation's message log changed.
    pub async fn notify(&self, conversation_id: &str) {
        // No subscribers is fine; send only fails when nobody listens.
        let _ = self.sender(conversation_id).await.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_reaches_subscriber() {
        let feed = MessageFeed::new();
        let mut rx = feed.subscribe("c1").await;

        feed.notify("c1").await;
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let feed = MessageFeed::new();
        let mut rx = feed.subscribe("c1").await;

        feed.notify("c2").await;
        assert!(rx.try_recv().is_err());
    }
}
