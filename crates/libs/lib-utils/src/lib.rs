//! # Utilities Library
//!
//! Shared utility functions for environment variables, time, and input
//! normalization.

pub mod envs;
pub mod time;
pub mod validation;

// Re-export commonly used functions
pub use envs::get_env_opt;
pub use time::{format_store_time, now_utc, parse_utc};
pub use validation::normalize_text;
