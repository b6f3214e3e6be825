use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;

use super::cookies;
use super::error::MirrorRejection;
use super::state::AuthState;
use super::traits::OAuthBackend;
use crate::types::SessionTokens;

/// Session tokens read back from the server-side cookie mirror.
///
/// Use as an Axum extractor on routes sharing [`AuthState`]. Returns
/// `401 Unauthorized` if either mirror cookie is missing or undecryptable.
///
/// # Example
///
/// ```rust,ignore
/// async fn status(session: Result<MirroredSession, MirrorRejection>) -> impl IntoResponse {
///     if session.is_ok() { "signed in" } else { "guest" }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MirroredSession {
    pub tokens: SessionTokens,
}

impl<B: OAuthBackend> FromRequestParts<AuthState<B>> for MirroredSession {
    type Rejection = MirrorRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthState<B>,
    ) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| MirrorRejection::Unauthenticated)?;

        resolve_mirror(
            &jar,
            &state.settings.access_cookie_name,
            &state.settings.refresh_cookie_name,
        )
        .map(|tokens| Self { tokens })
        .ok_or(MirrorRejection::Unauthenticated)
    }
}

/// Read the cookie mirror from a jar, for apps with their own router state.
#[must_use]
pub fn resolve_mirror(
    jar: &PrivateCookieJar,
    access_cookie: &str,
    refresh_cookie: &str,
) -> Option<SessionTokens> {
    cookies::read_mirror(jar, access_cookie, refresh_cookie)
}
