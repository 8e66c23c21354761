//! # Authentication Library
//!
//! Bearer token management and the identity provider consumed by the
//! channel layer.

pub mod identity;
pub mod token;

// Re-export commonly used types
pub use identity::{AuthError, Identity, IdentityProvider, LocalIdentityProvider};
pub use token::{decode_jwt, encode_jwt, Claims};
