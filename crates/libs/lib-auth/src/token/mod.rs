//! # JWT Token Management
//!
//! Short-lived bearer token generation and validation. Tokens prove the
//! caller's identity at channel handshake time and are never persisted.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT Claims structure containing user authentication information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (identity id)
    pub sub: String,
    /// Display name, denormalized onto outgoing messages
    pub name: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Encode a JWT token with identity claims.
pub fn encode_jwt(
    identity_id: &str,
    display_name: Option<&str>,
    secret: &str,
    ttl_minutes: i64,
) -> Result<String, String> {
    let now = Utc::now();
    let exp = now + Duration::minutes(ttl_minutes);

    let claims = Claims {
        sub: identity_id.to_string(),
        name: display_name.map(str::to_string),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to encode JWT: {}", e))
}

/// Decode and validate a JWT token.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| format!("Failed to decode JWT: {}", e))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-must-be-at-least-32-chars-long!";

    #[test]
    fn test_jwt_encoding_decoding() {
        let token = encode_jwt("user-42", Some("Pat"), SECRET, 30)
            .expect("JWT encoding should succeed");
        let claims = decode_jwt(&token, SECRET).expect("JWT decoding should succeed");

        assert_eq!(claims.sub, "user-42");
        assert_eq!(claims.name.as_deref(), Some("Pat"));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = encode_jwt("user-42", None, SECRET, 30).unwrap();
        assert!(decode_jwt(&token, "another-secret-also-32-characters!!").is_err());
    }
}
