//! # Document Store
//!
//! Database connection pool, repository implementations, and the live
//! message feed.

// region: --- Modules
pub mod chat_store;
pub mod conversation_repository;
pub mod feed;
pub mod message_repository;
pub mod models;
pub mod task_repository;

#[cfg(test)]
pub(crate) mod test_support;
// endregion: --- Modules

// region: --- Re-exports
pub use chat_store::ChatStore;
pub use conversation_repository::ConversationRepository;
pub use feed::MessageFeed;
pub use message_repository::MessageRepository;
pub use task_repository::TaskRepository;
// endregion: --- Re-exports

// region: --- Types and Functions
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};

/// Type alias for SQLite connection pool.
pub type DbPool = SqlitePool;

/// Create a new SQLite connection pool.
pub async fn create_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let options = database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;

    Ok(pool)
}
// endregion: --- Types and Functions
