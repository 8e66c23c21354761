//! # Conversation Access Control
//!
//! Resolves a conversation id to its two authorized participant identities
//! and enforces membership. The conversation record is the primary source;
//! the originating task is the fallback, because a conversation must be
//! joinable before its record exists (no message has been sent yet).
//!
//! Resolution is stateless and side-effect free; it runs on every join and
//! every typing relay rather than being cached on the connection.

use lib_core::model::store::{ConversationRepository, DbPool, TaskRepository};
use lib_core::Result;

/// Where the participant set came from.
///
/// Callers branch on this to decide whether the conversation record still
/// needs to be materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantSource {
    Conversation,
    Task,
}

/// A resolved two-identity participant set, tagged with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParticipants {
    pub participants: [String; 2],
    pub source: ParticipantSource,
}

/// Resolve the authorized participant set for a conversation id.
///
/// Returns `None` when neither a conversation record nor a task with both
/// a poster and an accepted provider exists.
pub async fn resolve_participants(
    pool: &DbPool,
    conversation_id: &str,
) -> Result<Option<ResolvedParticipants>> {
    if let Some(conversation) = ConversationRepository::find(pool, conversation_id).await? {
        let [a, b] = conversation.participants();
        if !a.is_empty() && !b.is_empty() {
            return Ok(Some(ResolvedParticipants {
                participants: [a.to_string(), b.to_string()],
                source: ParticipantSource::Conversation,
            }));
        }
    }

    if let Some(task) = TaskRepository::find(pool, conversation_id).await? {
        if let Some(participants) = task.participant_pair() {
            return Ok(Some(ResolvedParticipants {
                participants,
                source: ParticipantSource::Task,
            }));
        }
    }

    Ok(None)
}

/// Order-insensitive membership check.
pub fn is_participant(identity: &str, resolved: &ResolvedParticipants) -> bool {
    !identity.is_empty() && resolved.participants.iter().any(|p| p == identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_core::model::store::ChatStore;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> DbPool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");

        sqlx::query(
            r#"
            CREATE TABLE tasks (
                id TEXT PRIMARY KEY,
                posted_by TEXT NOT NULL,
                accepted_by TEXT,
                title TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'open',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            r#"
            CREATE TABLE conversations (
                id TEXT PRIMARY KEY,
                participant_a TEXT NOT NULL,
                participant_b TEXT NOT NULL,
                task_id TEXT,
                last_message TEXT NOT NULL DEFAULT '',
                last_message_at TEXT
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    #[tokio::test]
    async fn test_unresolvable_id_is_none() {
        let pool = setup_test_db().await;
        assert!(resolve_participants(&pool, "missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_conversation_record_wins() {
        let pool = setup_test_db().await;
        let store = ChatStore::new(pool.clone());
        store
            .ensure_conversation(
                "T1",
                &["poster".to_string(), "provider".to_string()],
                Some("T1"),
            )
            .await
            .unwrap();

        let resolved = resolve_participants(&pool, "T1").await.unwrap().unwrap();
        assert_eq!(resolved.source, ParticipantSource::Conversation);
        assert!(is_participant("poster", &resolved));
        assert!(is_participant("provider", &resolved));
        assert!(!is_participant("stranger", &resolved));
    }

    #[tokio::test]
    async fn test_task_fallback_requires_accepted_provider() {
        let pool = setup_test_db().await;
        TaskRepository::create(&pool, "T1", "poster", None, "fix sink")
            .await
            .unwrap();

        // No accepted provider yet: not joinable.
        assert!(resolve_participants(&pool, "T1").await.unwrap().is_none());

        TaskRepository::create(&pool, "T2", "poster", Some("provider"), "walk dog")
            .await
            .unwrap();
        let resolved = resolve_participants(&pool, "T2").await.unwrap().unwrap();
        assert_eq!(resolved.source, ParticipantSource::Task);
        assert_eq!(
            resolved.participants,
            ["poster".to_string(), "provider".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_identity_never_member() {
        let resolved = ResolvedParticipants {
            participants: ["a".to_string(), "b".to_string()],
            source: ParticipantSource::Conversation,
        };
        assert!(!is_participant("", &resolved));
    }
}
