//! # Chat Module
//!
//! Server side of the realtime chat channel: room membership, typing
//! presence broadcast, and per-operation participant authorization.
//!
//! Message persistence is not handled here — clients write messages to the
//! store directly and the store's live queries fan them out. The channel
//! carries only membership and presence.

// region: --- Modules
pub mod access;
pub mod state;
pub mod ws;
// endregion: --- Modules

// region: --- Re-exports
pub use access::{is_participant, resolve_participants, ParticipantSource, ResolvedParticipants};
pub use state::ChatAppState;
pub use ws::chat_ws;
// endregion: --- Re-exports
