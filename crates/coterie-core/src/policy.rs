//! Write policy for read-only rooms.
//!
//! Read-only rooms are configured by slug; only admins may post in them.
//! Enforcement happens at write time in the gateway, never at read time.

use crate::identity::UserIdentity;

/// The configured set of read-only room slugs.
#[derive(Debug, Clone, Default)]
pub struct ReadOnlyRooms {
    slugs: Vec<String>,
}

impl ReadOnlyRooms {
    /// Build from an iterator of slugs.
    #[must_use]
    pub fn new<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slugs: slugs.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated list, trimming whitespace and dropping
    /// empty entries (the environment-variable form).
    #[must_use]
    pub fn from_csv(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        )
    }

    /// Whether the slug is configured read-only.
    #[must_use]
    pub fn contains(&self, slug: &str) -> bool {
        self.slugs.iter().any(|s| s == slug)
    }

    /// Whether the room is read-only for this user.
    ///
    /// Admins bypass the restriction.
    #[must_use]
    pub fn is_read_only_for(&self, slug: &str, user: &UserIdentity) -> bool {
        self.contains(slug) && !user.is_admin
    }

    /// The configured slugs, in configuration order.
    #[must_use]
    pub fn slugs(&self) -> &[String] {
        &self.slugs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_csv() {
        let rooms = ReadOnlyRooms::from_csv(" announcements , events ,,");
        assert_eq!(rooms.slugs(), &["announcements", "events"]);
        assert!(rooms.contains("announcements"));
        assert!(!rooms.contains("general"));
    }

    #[test]
    fn test_empty_csv() {
        assert!(ReadOnlyRooms::from_csv("").slugs().is_empty());
    }

    #[test]
    fn test_admin_bypasses() {
        let rooms = ReadOnlyRooms::from_csv("announcements");
        let member = UserIdentity::new("u1", "Alice", false);
        let admin = UserIdentity::new("u2", "Bob", true);

        assert!(rooms.is_read_only_for("announcements", &member));
        assert!(!rooms.is_read_only_for("announcements", &admin));
        assert!(!rooms.is_read_only_for("general", &member));
    }
}
