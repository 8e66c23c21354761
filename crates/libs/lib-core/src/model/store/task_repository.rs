//! # Task Repository
//!
//! Read access to the task table. The marketplace itself maintains these
//! rows; the chat subsystem only consults them as the authorization
//! fallback and seeds them in tests.

use super::models::Task;
use super::DbPool;
use lib_utils::time::{format_store_time, now_utc};
use sqlx::query_as;

pub struct TaskRepository;

impl TaskRepository {
    /// Find a task by id.
    pub async fn find(pool: &DbPool, id: &str) -> Result<Option<Task>, sqlx::Error> {
        query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a task row. Used by tests and seeding tools; the marketplace
    /// service owns this table in production.
    pub async fn create(
        pool: &DbPool,
        id: &str,
        posted_by: &str,
        accepted_by: Option<&str>,
        title: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, posted_by, accepted_by, title, status, created_at)
            VALUES (?, ?, ?, ?, 'open', ?)
            "#,
        )
        .bind(id)
        .bind(posted_by)
        .bind(accepted_by)
        .bind(title)
        .bind(format_store_time(now_utc()))
        .execute(pool)
        .await?;

        Ok(())
    }
}
