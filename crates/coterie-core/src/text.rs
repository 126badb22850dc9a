//! Message text sanitation.
//!
//! The gateway accepts raw text from clients and normalizes it before
//! persisting: truncate first, then trim, then drop if nothing remains.

/// Maximum message length in characters.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Truncate a string to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Sanitize raw message text.
///
/// Truncates to [`MAX_MESSAGE_LEN`] characters, then trims surrounding
/// whitespace. Returns `None` if nothing remains; the caller drops the
/// message silently.
#[must_use]
pub fn sanitize_message(raw: &str) -> Option<String> {
    let trimmed = truncate_chars(raw, MAX_MESSAGE_LEN).trim();
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
    fn test_sanitize_passes_normal_text() {
        assert_eq!(sanitize_message("hi"), Some("hi".to_string()));
        assert_eq!(sanitize_message("  padded  "), Some("padded".to_string()));
    }

    #[test]
    fn test_sanitize_drops_empty() {
        assert_eq!(sanitize_message(""), None);
        assert_eq!(sanitize_message("   \n\t  "), None);
    }

    #[test]
    fn test_sanitize_truncates_before_trimming() {
        let long = "a".repeat(MAX_MESSAGE_LEN + 100);
        let clean = sanitize_message(&long).unwrap();
        assert_eq!(clean.chars().count(), MAX_MESSAGE_LEN);

        // Truncation happens first, so text that is all whitespace within
        // the first 4000 chars is dropped even if content follows.
        let mut padded = " ".repeat(MAX_MESSAGE_LEN);
        padded.push_str("tail");
        assert_eq!(sanitize_message(&padded), None);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        assert_eq!(truncate_chars(s, 4), "héll");
        assert_eq!(truncate_chars(s, 100), s);
    }
}
