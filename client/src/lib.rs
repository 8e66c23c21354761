//! # Chat Client
//!
//! Client side of the chat subsystem: a shared channel connection manager
//! and a per-conversation session facade.
//!
//! The session writes messages straight to the store and mirrors it with
//! live snapshots; the channel only carries room membership and typing
//! presence. The two pathways are independent and have no cross-ordering
//! guarantee.

// region: --- Modules
pub mod connection;
pub mod session;
// endregion: --- Modules

// region: --- Re-exports
pub use connection::{ConnectionManager, ConnectionState};
pub use session::{ConversationSession, SessionOptions, SessionPhase, SessionSnapshot};
// endregion: --- Re-exports
