//! # Environment Variables
//!
//! Utilities for reading environment variables.

use std::env;

/// Get an environment variable, or `None` when unset.
pub fn get_env_opt(name: &'static str) -> Option<String> {
    env::var(name).ok()
}
