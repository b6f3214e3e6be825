use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

use crate::outcome::{AuthError, Destination, ErrorKind, RoutePaths};

/// Rejections from the cookie-mirror endpoints and extractor.
#[derive(Debug, thiserror::Error)]
pub enum MirrorRejection {
    /// No complete cookie mirror on the request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Body of a cookie-mirror write could not be used.
    #[error("Invalid cookie payload: {0}")]
    InvalidPayload(String),
}

impl IntoResponse for MirrorRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
            Self::InvalidPayload(_) => {
                tracing::warn!(error = %self, "Rejected cookie mirror write");
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "success": false, "error": self.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

/// Redirect for a finished flow.
pub(super) fn redirect(destination: &Destination, paths: &RoutePaths) -> Response {
    Redirect::to(&destination.to_location(paths)).into_response()
}

/// Log `error` and send the user to the login page with its code.
pub(super) fn fail(error: AuthError, paths: &RoutePaths) -> Response {
    match error.kind {
        ErrorKind::Configuration | ErrorKind::Unexpected => {
            tracing::error!(code = %error.code, error = %error.message, "Auth callback failed");
        }
        ErrorKind::Provider | ErrorKind::MissingInput | ErrorKind::Exchange => {
            tracing::warn!(code = %error.code, error = %error.message, "Auth callback failed");
        }
    }
    redirect(&error.destination(), paths)
}
