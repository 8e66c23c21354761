//! # Message Repository
//!
//! Database access layer for the per-conversation message log. Messages
//! are append-only; no update or delete operation exists.

use super::models::{Message, MessageForCreate};
use super::DbPool;
use sqlx::query_as;

pub struct MessageRepository;

impl MessageRepository {
    /// Append a message, assigning the server-side timestamp.
    ///
    /// Returns the stored row, including the generated id.
    pub async fn append(
        pool: &DbPool,
        message: &MessageForCreate,
        created_at: &str,
    ) -> Result<Message, sqlx::Error> {
        query_as::<_, Message>(
            r#"
            INSERT INTO messages (conversation_id, text, sender_id, sender_name, created_at, status)
            VALUES (?, ?, ?, ?, ?, 'sent')
            RETURNING *
            "#,
        )
        .bind(&message.conversation_id)
        .bind(&message.text)
        .bind(&message.sender_id)
        .bind(&message.sender_name)
        .bind(created_at)
        .fetch_one(pool)
        .await
    }

    /// Load the replay window for a conversation.
    ///
    /// Ordered by `created_at` ascending; insertion order breaks timestamp
    /// ties so replay is stable.
    pub async fn list_ordered(
        pool: &DbPool,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<Message>, sqlx::Error> {
        query_as::<_, Message>(
            r#"
            SELECT *
            FROM messages
            WHERE conversation_id = ?
            ORDER BY created_at ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
