//! Session tokens.
//!
//! Sessions live entirely in a client-held signed token; the server keeps
//! no session table. The token claims carry the user identity and admin
//! flag, so elevating a session means re-issuing the token - a rejoin
//! always starts non-admin.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use coterie_core::UserIdentity;

/// Session lifetime: thirty days.
const SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Display name
    pub name: String,
    /// Admin flag
    pub admin: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

impl SessionKeys {
    /// Create session keys from the configured signing secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a signed token binding the identity to the client.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue(&self, user: &UserIdentity) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            name: user.display_name.clone(),
            admin: user.is_admin,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(SESSION_TTL_SECS)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Verify a token and recover the identity it binds.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is expired, tampered with, or signed
    /// with a different secret.
    pub fn verify(&self, token: &str) -> Result<UserIdentity, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(UserIdentity::new(
            data.claims.sub,
            &data.claims.name,
            data.claims.admin,
        ))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ").map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new("test-secret")
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let user = UserIdentity::new("u1", "Alice", false);
        let token = keys().issue(&user).unwrap();
        let verified = keys().verify(&token).unwrap();

        assert_eq!(verified, user);
    }

    #[test]
    fn test_admin_flag_survives() {
        let admin = UserIdentity::new("u1", "Alice", true);
        let token = keys().issue(&admin).unwrap();
        assert!(keys().verify(&token).unwrap().is_admin);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let user = UserIdentity::new("u1", "Alice", false);
        let mut token = keys().issue(&user).unwrap();
        token.push('x');

        assert!(keys().verify(&token).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let user = UserIdentity::new("u1", "Alice", false);
        let token = keys().issue(&user).unwrap();

        assert!(SessionKeys::new("other-secret").verify(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token(""), None);
    }
}
