//! # Application Configuration
//!
//! This module manages application configuration loaded from environment
//! variables. All configuration is validated on startup to fail fast if
//! misconfigured.

use lib_utils::envs::get_env_opt;
use std::env;

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    /// SQLite database connection URL
    pub database_url: String,

    /// Secret key for JWT token signing and verification
    ///
    /// **Must be at least 32 characters long** for security.
    pub jwt_secret: String,

    /// Bearer token validity period in minutes
    ///
    /// Channel tokens are deliberately short-lived; the identity provider
    /// re-mints them on rotation. Valid range: 1-1440 minutes.
    pub jwt_ttl_minutes: i64,

    /// Maximum number of messages a live subscription replays
    ///
    /// Valid range: 1-500.
    pub chat_page_size: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:data/taskchat.db".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| "JWT_SECRET must be set in environment")?;

        let jwt_ttl_minutes = get_env_opt("JWT_TTL_MINUTES")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .map_err(|e| format!("JWT_TTL_MINUTES must be a valid number: {}", e))?;

        let chat_page_size = get_env_opt("CHAT_PAGE_SIZE")
            .unwrap_or_else(|| "500".to_string())
            .parse()
            .map_err(|e| format!("CHAT_PAGE_SIZE must be a valid number: {}", e))?;

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_ttl_minutes,
            chat_page_size,
        })
    }

    /// Validate configuration values against security and business rules.
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.len() < 32 {
            return Err("JWT_SECRET must be at least 32 characters long".to_string());
        }

        if self.jwt_ttl_minutes < 1 || self.jwt_ttl_minutes > 1440 {
            return Err("JWT_TTL_MINUTES must be between 1 and 1440 (24 hours)".to_string());
        }

        if self.chat_page_size < 1 || self.chat_page_size > 500 {
            return Err("CHAT_PAGE_SIZE must be between 1 and 500".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret-key-must-be-at-least-32-characters-long!".to_string(),
            jwt_ttl_minutes: 30,
            chat_page_size: 500,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = base_config();
        config.jwt_secret = "too-short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        let mut config = base_config();
        config.chat_page_size = 0;
        assert!(config.validate().is_err());
        config.chat_page_size = 501;
        assert!(config.validate().is_err());
    }
}
