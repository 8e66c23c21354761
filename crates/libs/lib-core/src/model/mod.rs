//! # Data Model
//!
//! Document store access for conversations, messages, and the task
//! fallback used by authorization.

pub mod store;
