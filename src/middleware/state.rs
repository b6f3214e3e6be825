use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::AuthSettings;
use super::traits::OAuthBackend;

/// Shared state for the auth route handlers.
pub struct AuthState<B> {
    pub(super) backend: Arc<B>,
    pub(super) settings: AuthSettings,
}

// Manual Clone: avoid derive adding a `B: Clone` bound.
impl<B> Clone for AuthState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<B: OAuthBackend> FromRef<AuthState<B>> for Key {
    fn from_ref(state: &AuthState<B>) -> Self {
        state.settings.cookie_key.clone()
    }
}
