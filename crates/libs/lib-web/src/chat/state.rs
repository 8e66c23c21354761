//! # Chat Application State
//!
//! Shared state for the chat websocket handlers: configuration, the store
//! handle, and the per-conversation typing broadcast registry.

use lib_core::model::store::ChatStore;
use lib_core::Config;
use shared::dto::chat::TypingBroadcast;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Capacity of each room's typing broadcast channel. Typing events are
/// ephemeral; a lagged receiver just misses stale presence.
const ROOM_CAPACITY: usize = 100;

/// Shared chat state handed to every websocket connection.
pub struct ChatAppState {
    pub config: Config,
    pub store: ChatStore,
    rooms: RwLock<HashMap<String, broadcast::Sender<TypingBroadcast>>>,
}

impl ChatAppState {
    pub fn new(config: Config, store: ChatStore) -> Self {
        Self {
            config,
            store,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the typing broadcast sender for a conversation room.
    pub async fn room_sender(&self, conversation_id: &str) -> broadcast::Sender<TypingBroadcast> {
        if let Some(sender) = self.rooms.read().await.get(conversation_id) {
            return sender.clone();
        }

        let mut rooms = self.rooms.write().await;
        rooms
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                debug!(conversation_id, "creating typing broadcast room");
                broadcast::channel(ROOM_CAPACITY).0
            })
            .clone()
    }

    /// Publish a typing event into a room.
    ///
    /// Returns the number of sessions the event reached. Zero receivers is
    /// normal when the peer has no live connection.
    pub async fn broadcast_typing(&self, conversation_id: &str, event: TypingBroadcast) -> usize {
        let sender = self.room_sender(conversation_id).await;
        sender.send(event).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_core::model::store::create_pool;

    fn test_config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret-key-must-be-at-least-32-chars-long!".to_string(),
            jwt_ttl_minutes: 30,
            chat_page_size: 500,
        }
    }

    async fn state() -> ChatAppState {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        ChatAppState::new(test_config(), ChatStore::new(pool))
    }

    #[tokio::test]
    async fn test_room_sender_is_stable_per_id() {
        let state = state().await;
        let a = state.room_sender("T1").await;
        let b = state.room_sender("T1").await;
        assert!(a.same_channel(&b));

        let other = state.room_sender("T2").await;
        assert!(!a.same_channel(&other));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let state = state().await;
        let mut rx = state.room_sender("T1").await.subscribe();

        let reached = state
            .broadcast_typing(
                "T1",
                TypingBroadcast {
                    sender_id: "poster".to_string(),
                    is_typing: true,
                },
            )
            .await;
        assert_eq!(reached, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.sender_id, "poster");
        assert!(event.is_typing);
    }

    #[tokio::test]
    async fn test_broadcast_without_listeners_is_zero() {
        let state = state().await;
        let reached = state
            .broadcast_typing(
                "T1",
                TypingBroadcast {
                    sender_id: "poster".to_string(),
                    is_typing: false,
                },
            )
            .await;
        assert_eq!(reached, 0);
    }
}
