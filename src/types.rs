use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Seconds before `expires_at` at which a session is already treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 10;

/// Backend user identifier (the `sub` claim of the access token).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

/// User record returned alongside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_sign_in_at: Option<OffsetDateTime>,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            email: None,
            user_metadata: serde_json::Value::Null,
            last_sign_in_at: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// The token pair mirrored into server-readable cookies.
///
/// Also the shape of implicit-flow tokens carried in a URL fragment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl SessionTokens {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Both tokens are non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// An authenticated session as held by the backend auth service.
///
/// The client keeps a cached copy; the server keeps a cookie mirror of
/// [`tokens`](Session::tokens).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".into()
}

impl Session {
    #[must_use]
    pub fn new(tokens: SessionTokens, user: User) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: None,
            token_type: default_token_type(),
            user,
        }
    }

    #[must_use]
    pub fn with_expires_at(mut self, expires_at: Option<i64>) -> Self {
        self.expires_at = expires_at;
        self
    }

    #[must_use]
    pub fn tokens(&self) -> SessionTokens {
        SessionTokens::new(self.access_token.clone(), self.refresh_token.clone())
    }

    /// Sessions without a known expiry never expire locally.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .is_some_and(|at| now.unix_timestamp() + EXPIRY_MARGIN_SECS >= at)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("user", &self.user.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_deserializes_backend_shape() {
        let json = r#"{
            "access_token": "at",
            "refresh_token": "rt",
            "expires_at": 1700000000,
            "token_type": "bearer",
            "user": {
                "id": "6b1c2f10-0000-4000-8000-000000000001",
                "email": "someone@example.com",
                "last_sign_in_at": "2024-05-01T12:00:00Z"
            }
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();

        assert_eq!(session.tokens(), SessionTokens::new("at", "rt"));
        assert_eq!(session.expires_at, Some(1_700_000_000));
        assert_eq!(session.user.email.as_deref(), Some("someone@example.com"));
        assert!(session.user.last_sign_in_at.is_some());
    }

    #[test]
    fn token_type_defaults_to_bearer() {
        let json = r#"{"access_token":"a","refresh_token":"r","user":{"id":"u"}}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.token_type, "bearer");
        assert_eq!(session.expires_at, None);
    }

    #[test]
    fn expiry_respects_margin() {
        let now = OffsetDateTime::from_unix_timestamp(1_000).unwrap();
        let session = Session::new(SessionTokens::new("a", "r"), User::new("u"));

        assert!(!session.is_expired_at(now));
        assert!(session.clone().with_expires_at(Some(1_005)).is_expired_at(now));
        assert!(!session.with_expires_at(Some(1_100)).is_expired_at(now));
    }

    #[test]
    fn debug_redacts_tokens() {
        let tokens = SessionTokens::new("secret-access", "secret-refresh");
        let session = Session::new(tokens.clone(), User::new("u"));

        assert!(!format!("{tokens:?}").contains("secret"));
        assert!(!format!("{session:?}").contains("secret"));
    }

    #[test]
    fn incomplete_tokens_detected() {
        assert!(SessionTokens::new("a", "r").is_complete());
        assert!(!SessionTokens::new("", "r").is_complete());
        assert!(!SessionTokens::new("a", "").is_complete());
    }
}
