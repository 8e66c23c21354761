//! # Validation Utilities
//!
//! Input normalization helpers.

/// Normalize user-authored message text.
///
/// Returns the trimmed text, or `None` when the input trims to empty.
/// Empty sends are rejected before they reach the store.
pub fn normalize_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_trims() {
        assert_eq!(normalize_text("  hi there "), Some("hi there".to_string()));
    }

    #[test]
    fn test_normalize_text_rejects_whitespace() {
        assert_eq!(normalize_text("   "), None);
        assert_eq!(normalize_text(""), None);
    }
}
