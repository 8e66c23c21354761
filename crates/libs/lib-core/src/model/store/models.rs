//! # Store Models
//!
//! Row types for the conversation, message, and task tables.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A two-party conversation, keyed by the id it shares with its
/// originating task.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participant_a: String,
    pub participant_b: String,
    /// Originating task, or `None` if the conversation was created
    /// independently.
    pub task_id: Option<String>,
    /// Latest message text, denormalized for list views.
    pub last_message: String,
    pub last_message_at: Option<String>,
}

impl Conversation {
    /// The two participant identity ids, in stored order.
    pub fn participants(&self) -> [&str; 2] {
        [&self.participant_a, &self.participant_b]
    }
}

/// A single immutable chat message.
///
/// `created_at` is assigned by the store at append time and is the sole
/// ordering key for replay. `status` is always `sent` in the current
/// delivery model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub text: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub created_at: String,
    pub status: String,
}

/// Fields supplied by the caller when appending a message; the store
/// assigns the rest.
#[derive(Debug, Clone)]
pub struct MessageForCreate {
    pub conversation_id: String,
    pub text: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
}

/// A marketplace task, consulted as the authorization fallback when a
/// conversation record does not exist yet.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub posted_by: String,
    /// Identity of the accepted service-provider, once one exists.
    pub accepted_by: Option<String>,
    pub title: String,
    pub status: String,
    pub created_at: String,
}

impl Task {
    /// Both chat-authorized identities, if the task has an accepted
    /// provider.
    pub fn participant_pair(&self) -> Option<[String; 2]> {
        self.accepted_by
            .as_ref()
            .filter(|provider| !provider.is_empty() && !self.posted_by.is_empty())
            .map(|provider| [self.posted_by.clone(), provider.clone()])
    }
}
