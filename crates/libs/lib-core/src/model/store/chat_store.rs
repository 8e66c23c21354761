//! # Chat Store Facade
//!
//! High-level document-store interface combining the repositories and the
//! live feed. Both the client session (direct writes + subscription) and
//! the server join path (conversation materialization) go through this
//! type.

use super::conversation_repository::ConversationRepository;
use super::feed::MessageFeed;
use super::message_repository::MessageRepository;
use super::models::{Conversation, Message, MessageForCreate};
use super::DbPool;
use crate::error::{AppError, Result};
use lib_utils::time::{format_store_time, now_utc};
use lib_utils::validation::normalize_text;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Shared handle to the conversation/message store.
///
/// Cloning is cheap; clones share the pool and the feed.
#[derive(Debug, Clone)]
pub struct ChatStore {
    pool: DbPool,
    feed: Arc<MessageFeed>,
}

impl ChatStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            feed: MessageFeed::new(),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Look up a conversation record.
    pub async fn find_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(ConversationRepository::find(&self.pool, id).await?)
    }

    /// Idempotently create the conversation record.
    ///
    /// Concurrent calls for the same id are a tolerated race; the write is
    /// a merge, not a replacing insert.
    pub async fn ensure_conversation(
        &self,
        id: &str,
        participants: &[String; 2],
        task_id: Option<&str>,
    ) -> Result<()> {
        let now = format_store_time(now_utc());
        ConversationRepository::create_if_absent(&self.pool, id, participants, task_id, &now)
            .await?;
        Ok(())
    }

    /// Append a message and update the conversation preview.
    ///
    /// The append is the completion point: a preview failure after a
    /// successful append is logged and swallowed, since the message is
    /// durable and the preview is denormalized cosmetics.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        sender_name: Option<&str>,
        text: &str,
    ) -> Result<Message> {
        let text = normalize_text(text)
            .ok_or_else(|| AppError::InvalidInput("message text cannot be empty".to_string()))?;

        let created_at = format_store_time(now_utc());
        let message = MessageRepository::append(
            &self.pool,
            &MessageForCreate {
                conversation_id: conversation_id.to_string(),
                text: text.clone(),
                sender_id: sender_id.to_string(),
                sender_name: sender_name.map(str::to_string),
            },
            &created_at,
        )
        .await
        .map_err(|e| AppError::SendFailure(format!("message append failed: {}", e)))?;

        if let Err(e) =
            ConversationRepository::touch_preview(&self.pool, conversation_id, &text, &created_at)
                .await
        {
            warn!(conversation_id, error = %e, "preview update failed after append");
        }

        debug!(conversation_id, message_id = message.id, "message appended");
        self.feed.notify(conversation_id).await;

        Ok(message)
    }

    /// Load the current ordered snapshot of a conversation's messages.
    pub async fn snapshot(&self, conversation_id: &str, limit: u32) -> Result<Vec<Message>> {
        MessageRepository::list_ordered(&self.pool, conversation_id, limit)
            .await
            .map_err(|e| AppError::Subscription(format!("snapshot query failed: {}", e)))
    }

    /// Subscribe to change ticks for a conversation.
    ///
    /// Callers reload a full snapshot per tick; the receiver must be
    /// dropped on teardown to release the subscription.
    pub async fn subscribe(&self, conversation_id: &str) -> broadcast::Receiver<()> {
        self.feed.subscribe(conversation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;

    fn participants() -> [String; 2] {
        ["poster".to_string(), "provider".to_string()]
    }

    #[tokio::test]
    async fn test_append_assigns_order_and_status() {
        let pool = setup_test_db().await;
        let store = ChatStore::new(pool);
        store
            .ensure_conversation("T1", &participants(), Some("T1"))
            .await
            .unwrap();

        store
            .append_message("T1", "poster", Some("Pat"), "first")
            .await
            .unwrap();
        store
            .append_message("T1", "provider", None, "  second  ")
            .await
            .unwrap();

        let messages = store.snapshot("T1", 500).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "first");
        assert_eq!(messages[1].text, "second");
        assert!(messages[0].created_at <= messages[1].created_at);
        assert!(messages.iter().all(|m| m.status == "sent"));
    }

    #[tokio::test]
    async fn test_empty_text_never_stored() {
        let pool = setup_test_db().await;
        let store = ChatStore::new(pool);
        store
            .ensure_conversation("T1", &participants(), None)
            .await
            .unwrap();

        let err = store
            .append_message("T1", "poster", None, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(store.snapshot("T1", 500).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_updates_preview() {
        let pool = setup_test_db().await;
        let store = ChatStore::new(pool);
        store
            .ensure_conversation("T1", &participants(), Some("T1"))
            .await
            .unwrap();

        store
            .append_message("T1", "poster", None, "Hi there")
            .await
            .unwrap();

        let conversation = store.find_conversation("T1").await.unwrap().unwrap();
        assert_eq!(conversation.last_message, "Hi there");
        assert!(conversation.last_message_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_ensure_is_single_record() {
        let pool = setup_test_db().await;
        let store = ChatStore::new(pool);

        let participants_a = participants();
        let participants_b = participants();
        let a = store.ensure_conversation("T1", &participants_a, Some("T1"));
        let b = store.ensure_conversation("T1", &participants_b, Some("T1"));
        let (ra, rb) = tokio::join!(a, b);
        ra.unwrap();
        rb.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE id = 'T1'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);

        let conversation = store.find_conversation("T1").await.unwrap().unwrap();
        assert_eq!(conversation.participants(), ["poster", "provider"]);
    }

    #[tokio::test]
    async fn test_subscription_ticks_on_append() {
        let pool = setup_test_db().await;
        let store = ChatStore::new(pool);
        store
            .ensure_conversation("T1", &participants(), None)
            .await
            .unwrap();

        let mut rx = store.subscribe("T1").await;
        store
            .append_message("T1", "poster", None, "ping")
            .await
            .unwrap();

        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_respects_limit() {
        let pool = setup_test_db().await;
        let store = ChatStore::new(pool);
        store
            .ensure_conversation("T1", &participants(), None)
            .await
            .unwrap();

        for i in 0..5 {
            store
                .append_message("T1", "poster", None, &format!("m{}", i))
                .await
                .unwrap();
        }

        let window = store.snapshot("T1", 3).await.unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].text, "m0");
    }
}
