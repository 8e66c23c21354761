//! # Shared Data Transfer Objects Library
//!
//! This library defines the wire contract between the chat client and the
//! backend channel server. All DTOs use JSON serialization via `serde`.
//!
//! ## Structure
//!
//! - **[`dto`]**: Data Transfer Objects for channel communication
//!   - **[`dto::chat`]**: Channel protocol events (join, typing, error)
//!
//! ## Wire Format
//!
//! Events travel in a tagged envelope: `{"type": "<event>", "data": {...}}`.
//! Payload field names are camelCase on the wire (`conversationId`,
//! `isTyping`, `senderId`); event names are snake_case. Client events that
//! target a room accept a legacy `taskId` alias for the conversation id,
//! with `conversationId` taking precedence.

pub mod dto;

// Re-export commonly used types for convenience
pub use dto::chat::{ClientEvent, JoinPayload, ServerEvent, TypingPayload};
