use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use super::config::AuthSettings;
use crate::types::SessionTokens;

const PKCE_COOKIE_NAME: &str = "__recovery_pkce";

/// PKCE verifier cookie for the authorization request.
pub(super) fn pkce_cookie(code_verifier: &str, secure: bool, auth_path: &str) -> Cookie<'static> {
    Cookie::build((PKCE_COOKIE_NAME, code_verifier.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(auth_path.to_string())
        .max_age(Duration::minutes(10))
        .build()
}

/// Removal cookie for the PKCE verifier.
pub(super) fn clear_pkce_cookie(auth_path: &str) -> Cookie<'static> {
    expired(PKCE_COOKIE_NAME.to_string(), auth_path.to_string())
}

/// Get the PKCE verifier from cookies.
pub(super) fn get_pkce_verifier(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(PKCE_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Overwrite both mirror cookies with `tokens`.
///
/// Writing the same tokens twice leaves the jar in the same state.
pub(super) fn write_mirror(
    jar: PrivateCookieJar,
    tokens: &SessionTokens,
    settings: &AuthSettings,
) -> PrivateCookieJar {
    let access = mirror_cookie(
        &settings.access_cookie_name,
        &tokens.access_token,
        settings.access_cookie_ttl,
        settings.secure_cookies,
    );
    let refresh = mirror_cookie(
        &settings.refresh_cookie_name,
        &tokens.refresh_token,
        settings.refresh_cookie_ttl,
        settings.secure_cookies,
    );
    jar.add(access).add(refresh)
}

/// Remove both mirror cookies. Only cookies the request carried produce a removal.
pub(super) fn clear_mirror(jar: PrivateCookieJar, settings: &AuthSettings) -> PrivateCookieJar {
    jar.remove(expired(settings.access_cookie_name.clone(), "/".into()))
        .remove(expired(settings.refresh_cookie_name.clone(), "/".into()))
}

/// Both mirror cookies, if present and non-empty.
pub(crate) fn read_mirror(
    jar: &PrivateCookieJar,
    access_cookie: &str,
    refresh_cookie: &str,
) -> Option<SessionTokens> {
    let access = jar.get(access_cookie)?;
    let refresh = jar.get(refresh_cookie)?;
    Some(SessionTokens::new(access.value(), refresh.value())).filter(SessionTokens::is_complete)
}

fn mirror_cookie(name: &str, value: &str, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), value.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(ttl)
        .build()
}

fn expired(name: String, path: String) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path(path)
        .max_age(Duration::ZERO)
        .build()
}
