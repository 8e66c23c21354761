//! Test helpers: in-memory database with the chat schema.

use super::DbPool;
use sqlx::sqlite::SqlitePoolOptions;

/// Setup test database with schema
pub async fn setup_test_db() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("Failed to create test schema");
    }

    pool
}

/// Mirrors `backend/migrations/0001_init.sql`.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        posted_by TEXT NOT NULL,
        accepted_by TEXT,
        title TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'open',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        participant_a TEXT NOT NULL,
        participant_b TEXT NOT NULL,
        task_id TEXT,
        last_message TEXT NOT NULL DEFAULT '',
        last_message_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id TEXT NOT NULL REFERENCES conversations(id),
        text TEXT NOT NULL,
        sender_id TEXT NOT NULL,
        sender_name TEXT,
        created_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'sent'
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
        ON messages (conversation_id, created_at, id)
    "#,
];
