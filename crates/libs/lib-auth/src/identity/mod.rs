//! # Identity Provider
//!
//! Abstract source of the caller's identity and its short-lived bearer
//! tokens. The connection manager depends on this trait rather than any
//! concrete auth backend: it mints a fresh token per handshake and listens
//! for rotation so a stale credential is never presented.

use crate::token::encode_jwt;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::watch;

/// Errors produced while resolving identity or minting tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No identity is signed in; the channel cannot be established.
    #[error("not signed in")]
    NotSignedIn,

    /// Token signing or validation failed.
    #[error("token error: {0}")]
    Token(String),
}

/// A resolved caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, display_name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.map(str::to_string),
        }
    }
}

/// Issues short-lived bearer tokens for the current identity and notifies
/// subscribers when the credential rotates.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in identity, or `None`.
    fn current_identity(&self) -> Option<Identity>;

    /// Mint a bearer token for the current identity.
    ///
    /// With `force_refresh` the cached token is discarded and a fresh one
    /// signed, mirroring a handshake that always presents new credentials.
    async fn mint_token(&self, force_refresh: bool) -> Result<String, AuthError>;

    /// Subscribe to rotation notifications. The value is a rotation epoch;
    /// each bump means previously minted tokens should be considered
    /// stale.
    fn subscribe_rotation(&self) -> watch::Receiver<u64>;
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: i64,
}

/// Identity provider that signs its own JWTs with the shared secret.
///
/// Stands in for the external identity service: real deployments would
/// wrap that service behind the same trait.
pub struct LocalIdentityProvider {
    identity: Option<Identity>,
    secret: String,
    ttl_minutes: i64,
    cached: Mutex<Option<CachedToken>>,
    rotation_tx: watch::Sender<u64>,
}

/// Refuse to serve a cached token within this many seconds of its expiry.
const EXPIRY_MARGIN_SECS: i64 = 30;

impl LocalIdentityProvider {
    pub fn new(identity: Option<Identity>, secret: impl Into<String>, ttl_minutes: i64) -> Self {
        let (rotation_tx, _) = watch::channel(0);
        Self {
            identity,
            secret: secret.into(),
            ttl_minutes,
            cached: Mutex::new(None),
            rotation_tx,
        }
    }

    /// Rotate the credential: drop the cached token and bump the epoch so
    /// subscribers pick up a fresh one on their next handshake.
    pub fn rotate(&self) {
        self.cached
            .lock()
            .expect("token cache lock poisoned")
            .take();
        self.rotation_tx.send_modify(|epoch| *epoch += 1);
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.clone()
    }

    async fn mint_token(&self, force_refresh: bool) -> Result<String, AuthError> {
        let identity = self.identity.as_ref().ok_or(AuthError::NotSignedIn)?;

        let mut cached = self.cached.lock().expect("token cache lock poisoned");
        let now = Utc::now().timestamp();

        if !force_refresh {
            if let Some(entry) = cached.as_ref() {
                if entry.expires_at - now > EXPIRY_MARGIN_SECS {
                    return Ok(entry.token.clone());
                }
            }
        }

        let token = encode_jwt(
            &identity.id,
            identity.display_name.as_deref(),
            &self.secret,
            self.ttl_minutes,
        )
        .map_err(AuthError::Token)?;

        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: now + self.ttl_minutes * 60,
        });

        Ok(token)
    }

    fn subscribe_rotation(&self) -> watch::Receiver<u64> {
        self.rotation_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::decode_jwt;

    const SECRET: &str = "test-secret-key-must-be-at-least-32-chars-long!";

    fn provider() -> LocalIdentityProvider {
        LocalIdentityProvider::new(Some(Identity::new("user-a", Some("Alice"))), SECRET, 30)
    }

    #[tokio::test]
    async fn test_minted_token_carries_identity() {
        let provider = provider();
        let token = provider.mint_token(false).await.unwrap();
        let claims = decode_jwt(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "user-a");
        assert_eq!(claims.name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_cached_until_forced() {
        let provider = provider();
        let first = provider.mint_token(false).await.unwrap();
        let second = provider.mint_token(false).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_rotation_notifies_and_invalidates_cache() {
        let provider = provider();
        let mut rotation = provider.subscribe_rotation();
        let before = *rotation.borrow();

        provider.mint_token(false).await.unwrap();
        provider.rotate();

        rotation.changed().await.unwrap();
        assert_eq!(*rotation.borrow(), before + 1);
    }

    #[tokio::test]
    async fn test_signed_out_cannot_mint() {
        let provider = LocalIdentityProvider::new(None, SECRET, 30);
        assert!(matches!(
            provider.mint_token(true).await,
            Err(AuthError::NotSignedIn)
        ));
    }
}
