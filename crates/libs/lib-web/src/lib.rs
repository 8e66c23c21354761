//! # Web Library
//!
//! Channel server: websocket room/presence protocol, conversation access
//! control, and HTTP server setup.

pub mod chat;
pub mod server;

pub use server::{build_router, start_server, AppState, ServerConfig};
