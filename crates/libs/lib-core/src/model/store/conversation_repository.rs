//! # Conversation Repository
//!
//! Database access layer for conversation records.

use super::models::Conversation;
use super::DbPool;
use sqlx::query_as;

pub struct ConversationRepository;

impl ConversationRepository {
    /// Find a conversation by id.
    pub async fn find(pool: &DbPool, id: &str) -> Result<Option<Conversation>, sqlx::Error> {
        query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Create the conversation record if it does not exist.
    ///
    /// `ON CONFLICT DO NOTHING` makes concurrent creation a benign race:
    /// the duplicate write merges harmlessly instead of replacing the
    /// existing record, so no lock is needed around the existence check.
    pub async fn create_if_absent(
        pool: &DbPool,
        id: &str,
        participants: &[String; 2],
        task_id: Option<&str>,
        created_at: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO conversations
                (id, participant_a, participant_b, task_id, last_message, last_message_at)
            VALUES (?, ?, ?, ?, '', ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(&participants[0])
        .bind(&participants[1])
        .bind(task_id)
        .bind(created_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Update the denormalized preview fields after an accepted send.
    pub async fn touch_preview(
        pool: &DbPool,
        id: &str,
        preview: &str,
        at: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message = ?, last_message_at = ?
            WHERE id = ?
            "#,
        )
        .bind(preview)
        .bind(at)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }
}
