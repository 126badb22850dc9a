//! Room slug validation.
//!
//! Slugs are the URL-safe room identifiers used in events and routes,
//! distinct from display names. Validated when an admin creates a room.

/// Maximum slug length.
pub const MAX_SLUG_LEN: usize = 64;

/// Validate a room slug.
///
/// # Errors
///
/// Returns an error message if the slug is invalid.
pub fn validate_slug(slug: &str) -> Result<(), &'static str> {
    if slug.is_empty() {
        return Err("Slug cannot be empty");
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err("Slug too long");
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Slug may only contain lowercase letters, digits, and '-'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_slugs() {
        assert!(validate_slug("general").is_ok());
        assert!(validate_slug("q3-planning").is_ok());
        assert!(validate_slug("room2").is_ok());
    }

    #[test]
    fn test_invalid_slugs() {
        assert!(validate_slug("").is_err());
        assert!(validate_slug("General").is_err());
        assert!(validate_slug("has space").is_err());
        assert!(validate_slug("emoji💬").is_err());

        let long = "a".repeat(MAX_SLUG_LEN + 1);
        assert!(validate_slug(&long).is_err());
    }
}
