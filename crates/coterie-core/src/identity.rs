//! User identity as held by a gateway connection.
//!
//! Identities live in the client-held session token and in per-connection
//! state; the server keeps no user table. Display names are normalized at
//! every boundary where an identity is constructed.

use serde::{Deserialize, Serialize};

use crate::text::truncate_chars;
use coterie_protocol::UserInfo;

/// Maximum display name length in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 40;

/// Fallback display name for clients that announce without one.
pub const GUEST_NAME: &str = "Guest";

/// A user identity bound to a session or connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Opaque user identifier.
    pub id: String,
    /// Display name, at most [`MAX_DISPLAY_NAME_LEN`] characters.
    pub display_name: String,
    /// Whether this session holds admin rights.
    pub is_admin: bool,
}

impl UserIdentity {
    /// Create an identity, normalizing the display name.
    ///
    /// Names are truncated to [`MAX_DISPLAY_NAME_LEN`] characters; blank
    /// names fall back to [`GUEST_NAME`].
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: &str, is_admin: bool) -> Self {
        Self {
            id: id.into(),
            display_name: normalize_display_name(display_name),
            is_admin,
        }
    }
}

/// Normalize a display name: truncate to the cap, fall back to `Guest`.
#[must_use]
pub fn normalize_display_name(name: &str) -> String {
    let name = truncate_chars(name.trim(), MAX_DISPLAY_NAME_LEN);
    if name.is_empty() {
        GUEST_NAME.to_string()
    } else {
        name.to_string()
    }
}

impl From<UserIdentity> for UserInfo {
    fn from(user: UserIdentity) -> Self {
        UserInfo {
            id: user.id,
            display_name: user.display_name,
            is_admin: user.is_admin,
        }
    }
}

impl From<UserInfo> for UserIdentity {
    fn from(info: UserInfo) -> Self {
        UserIdentity::new(info.id, &info.display_name, info.is_admin)
    }
}
