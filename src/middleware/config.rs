use axum_extra::extract::cookie::Key;
use time::Duration;
use url::Url;

use super::traits::OAuthBackend;
use crate::api::{AuthClient, BackendConfig};
use crate::error::Error;
use crate::outcome::RoutePaths;

/// Route and cookie settings shared by config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) recoverer_path: String,
    pub(crate) cookie_api_path: String,
    pub(crate) paths: RoutePaths,
    pub(crate) access_cookie_name: String,
    pub(crate) refresh_cookie_name: String,
    pub(crate) access_cookie_ttl: Duration,
    pub(crate) refresh_cookie_ttl: Duration,
}

impl AuthSettings {
    pub(crate) fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            secure_cookies: true,
            auth_path: "/auth".into(),
            recoverer_path: "/auth/callback-client".into(),
            cookie_api_path: "/api/auth".into(),
            paths: RoutePaths::default(),
            access_cookie_name: "sb-access-token".into(),
            refresh_cookie_name: "sb-refresh-token".into(),
            access_cookie_ttl: Duration::hours(1),
            refresh_cookie_ttl: Duration::days(30),
        }
    }

    pub(crate) fn callback_path(&self) -> String {
        format!("{}/callback", self.auth_path)
    }
}

/// Configuration for the redirect handler and cookie-mirror endpoints.
///
/// The backend is a constructor parameter; everything else has a default and a
/// `with_*` override. Use [`from_env()`](RecoveryConfig::from_env) for the
/// HTTP backend configured from the environment.
pub struct RecoveryConfig<B = AuthClient> {
    pub(super) backend: B,
    pub(super) settings: AuthSettings,
}

impl<B: OAuthBackend> RecoveryConfig<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            settings: AuthSettings::defaults(),
        }
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Prefix of the authorize and callback routes (default `/auth`).
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    /// Page hosting the client session recoverer (default `/auth/callback-client`).
    #[must_use]
    pub fn with_recoverer_path(mut self, path: impl Into<String>) -> Self {
        self.settings.recoverer_path = path.into();
        self
    }

    /// Prefix of the cookie-mirror endpoints (default `/api/auth`).
    #[must_use]
    pub fn with_cookie_api_path(mut self, path: impl Into<String>) -> Self {
        self.settings.cookie_api_path = path.into();
        self
    }

    #[must_use]
    pub fn with_home_path(mut self, path: impl Into<String>) -> Self {
        self.settings.paths.home = path.into();
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.settings.paths.login = path.into();
        self
    }

    #[must_use]
    pub fn with_mirror_cookie_names(
        mut self,
        access: impl Into<String>,
        refresh: impl Into<String>,
    ) -> Self {
        self.settings.access_cookie_name = access.into();
        self.settings.refresh_cookie_name = refresh.into();
        self
    }

    #[must_use]
    pub fn with_mirror_cookie_ttls(mut self, access: Duration, refresh: Duration) -> Self {
        self.settings.access_cookie_ttl = access;
        self.settings.refresh_cookie_ttl = refresh;
        self
    }

    #[must_use]
    pub fn paths(&self) -> &RoutePaths {
        &self.settings.paths
    }

    #[must_use]
    pub fn callback_path(&self) -> String {
        self.settings.callback_path()
    }
}

impl RecoveryConfig<AuthClient> {
    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `SUPABASE_URL`: backend project URL
    /// - `SUPABASE_ANON_KEY`: backend public API key
    /// - `SITE_URL`: public origin of this app; the callback URI is derived from it
    ///
    /// # Optional env vars
    /// - `OAUTH_PROVIDER`: provider name (default `google`)
    /// - `OAUTH_SCOPES`: comma-separated provider scopes
    /// - `AUTH_HOME_PATH` / `AUTH_LOGIN_PATH`: terminal redirect targets
    /// - `DEV_AUTH`: `"1"` or `"true"` disables secure cookies for plain-HTTP development
    /// - `COOKIE_KEY`: cookie encryption key bytes (at least 64)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required variables are missing or values are invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is required")))
        };
        let parse_url = |key: &str, value: &str| {
            value
                .parse::<Url>()
                .map_err(|e| Error::Config(format!("{key}: {e}")))
        };

        let project_url = parse_url("SUPABASE_URL", &require("SUPABASE_URL")?)?;
        let anon_key = require("SUPABASE_ANON_KEY")?;
        let site_url = parse_url("SITE_URL", &require("SITE_URL")?)?;

        let mut settings = AuthSettings::defaults();
        if let Some(path) = lookup("AUTH_HOME_PATH") {
            settings.paths.home = path;
        }
        if let Some(path) = lookup("AUTH_LOGIN_PATH") {
            settings.paths.login = path;
        }

        let redirect_uri = site_url
            .join(&settings.callback_path())
            .map_err(|e| Error::Config(format!("SITE_URL: {e}")))?;

        let mut backend = BackendConfig::new(project_url, anon_key, redirect_uri);
        if let Some(provider) = lookup("OAUTH_PROVIDER") {
            backend = backend.with_provider(provider);
        }
        if let Some(scopes) = lookup("OAUTH_SCOPES") {
            backend = backend.with_scopes(
                scopes
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }

        let dev_auth = matches!(lookup("DEV_AUTH").as_deref(), Some("1" | "true"));

        settings.cookie_key = match lookup("COOKIE_KEY") {
            Some(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                Error::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            None => Key::generate(),
        };
        settings.secure_cookies = !dev_auth;

        Ok(Self {
            backend: AuthClient::new(backend),
            settings,
        })
    }
}
