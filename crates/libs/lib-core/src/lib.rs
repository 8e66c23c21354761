//! # Core Library
//!
//! Core models, document store, configuration, and error type for the chat
//! subsystem.

pub mod config;
pub mod error;
pub mod model;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
pub use model::store::{create_pool, ChatStore, DbPool};
