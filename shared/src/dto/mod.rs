//! # Data Transfer Objects
//!
//! Wire types shared between the chat client and the channel server.

pub mod chat;
