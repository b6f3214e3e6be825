use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::PrivateCookieJar;
use serde_json::json;

use super::config::RecoveryConfig;
use super::cookies;
use super::error::{MirrorRejection, fail, redirect};
use super::extractor::MirroredSession;
use super::state::AuthState;
use super::traits::OAuthBackend;
use crate::callback::{CallbackContext, RecoveryStrategy};
use crate::outcome::{AuthError, Destination, ErrorCode};
use crate::types::SessionTokens;

/// Create the auth router: sign-in initiation, OAuth callback and cookie mirror.
pub fn auth_routes<B: OAuthBackend>(config: RecoveryConfig<B>) -> Router {
    let settings = config.settings;
    let auth_path = settings.auth_path.clone();
    let callback_path = settings.callback_path();
    let api_path = settings.cookie_api_path.clone();

    let state = AuthState {
        backend: Arc::new(config.backend),
        settings,
    };

    Router::new()
        .route(&format!("{auth_path}/authorize"), get(authorize::<B>))
        .route(&callback_path, get(callback::<B>))
        .route(&format!("{api_path}/set-cookies"), post(set_cookies::<B>))
        .route(&format!("{api_path}/clear-cookies"), post(clear_cookies::<B>))
        .route(&format!("{api_path}/status"), get(status))
        .with_state(state)
}

// ── Authorize ──────────────────────────────────────────────────────

async fn authorize<B: OAuthBackend>(
    State(state): State<AuthState<B>>,
    jar: PrivateCookieJar,
) -> Response {
    let request = match state.backend.authorization_url() {
        Ok(request) => request,
        Err(e) => {
            return fail(
                AuthError::new(ErrorCode::ConfigError, e.to_string()),
                &state.settings.paths,
            );
        }
    };

    let pkce = cookies::pkce_cookie(
        &request.code_verifier,
        state.settings.secure_cookies,
        &state.settings.auth_path,
    );

    tracing::info!("Redirecting to OAuth provider");
    (jar.add(pkce), Redirect::to(&request.url)).into_response()
}

// ── Callback ───────────────────────────────────────────────────────

async fn callback<B: OAuthBackend>(
    State(state): State<AuthState<B>>,
    jar: PrivateCookieJar,
    RawQuery(query): RawQuery,
) -> Response {
    let context = CallbackContext::from_query(query.as_deref());
    let paths = &state.settings.paths;

    match context.strategy() {
        RecoveryStrategy::ProviderError { error, details } => {
            tracing::warn!(error = %error, description = %details, "OAuth error from provider");
            fail(
                AuthError::new(ErrorCode::OAuthError, error).with_details(details),
                paths,
            )
        }
        RecoveryStrategy::ExchangeCode(code) => {
            let verifier = cookies::get_pkce_verifier(&jar);
            let backend = Arc::clone(&state.backend);
            let exchange = tokio::spawn(async move {
                backend
                    .exchange_code_for_session(&code, verifier.as_deref())
                    .await
            });

            match exchange.await {
                Ok(Ok(Some(session))) => {
                    let jar = cookies::write_mirror(jar, &session.tokens(), &state.settings)
                        .add(cookies::clear_pkce_cookie(&state.settings.auth_path));
                    tracing::info!(user_id = %session.user.id, "OAuth code exchange successful");
                    (jar, redirect(&Destination::Home, paths)).into_response()
                }
                Ok(Ok(None)) => fail(
                    AuthError::new(ErrorCode::NoSession, "exchange returned no session"),
                    paths,
                ),
                Ok(Err(e)) if e.is_config() => {
                    fail(AuthError::new(ErrorCode::ConfigError, e.to_string()), paths)
                }
                Ok(Err(e)) => fail(
                    AuthError::new(ErrorCode::ExchangeFailed, e.to_string()),
                    paths,
                ),
                Err(e) => fail(
                    AuthError::new(ErrorCode::CallbackFailed, e.to_string()),
                    paths,
                ),
            }
        }
        RecoveryStrategy::ClientHandoff => {
            tracing::info!("No code in callback query, handing off to client recoverer");
            let target = context.handoff_target(&state.settings.recoverer_path);
            (
                [(header::CACHE_CONTROL, "no-store")],
                handoff_page(&target),
            )
                .into_response()
        }
    }
}

/// Page whose only job is to re-navigate with the fragment intact.
///
/// A `Location` redirect would drop the fragment, so the browser does it.
fn handoff_page(target: &str) -> Html<String> {
    let target = serde_json::to_string(target)
        .unwrap_or_else(|_| "\"/\"".to_string())
        .replace("</", "<\\/");
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="robots" content="noindex"><title>Signing in</title></head>
<body>
<script>window.location.replace({target} + window.location.hash);</script>
<noscript>JavaScript is required to finish signing in.</noscript>
</body>
</html>
"#
    ))
}

// ── Cookie mirror ──────────────────────────────────────────────────

async fn set_cookies<B: OAuthBackend>(
    State(state): State<AuthState<B>>,
    jar: PrivateCookieJar,
    body: Bytes,
) -> Result<(PrivateCookieJar, Json<serde_json::Value>), MirrorRejection> {
    if body.iter().all(u8::is_ascii_whitespace) {
        tracing::debug!("Empty cookie payload, clearing mirror");
        return Ok((
            cookies::clear_mirror(jar, &state.settings),
            Json(json!({ "success": true })),
        ));
    }

    let tokens: SessionTokens = serde_json::from_slice(&body)
        .map_err(|e| MirrorRejection::InvalidPayload(e.to_string()))?;
    if !tokens.is_complete() {
        return Err(MirrorRejection::InvalidPayload(
            "access_token and refresh_token are required".into(),
        ));
    }

    tracing::debug!("Cookie mirror updated");
    Ok((
        cookies::write_mirror(jar, &tokens, &state.settings),
        Json(json!({ "success": true })),
    ))
}

async fn clear_cookies<B: OAuthBackend>(
    State(state): State<AuthState<B>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Json<serde_json::Value>) {
    tracing::debug!("Cookie mirror cleared");
    (
        cookies::clear_mirror(jar, &state.settings),
        Json(json!({ "success": true })),
    )
}

async fn status(session: Result<MirroredSession, MirrorRejection>) -> Json<serde_json::Value> {
    Json(json!({ "authenticated": session.is_ok() }))
}
