use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use time::OffsetDateTime;
use url::Url;

use crate::error::Error;
use crate::pkce::{self, PkceChallenge};
use crate::types::{Session, SessionTokens, User};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the backend auth service.
///
/// Required fields are constructor parameters; everything else has a default.
///
/// ```rust,ignore
/// use oauth_recovery::BackendConfig;
///
/// let config = BackendConfig::new(
///     "https://project.supabase.co".parse()?,
///     anon_key,
///     "https://my-app.com/auth/callback".parse()?,
/// )
/// .with_provider("github");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct BackendConfig {
    pub(crate) project_url: Url,
    pub(crate) anon_key: String,
    pub(crate) redirect_uri: Url,
    pub(crate) provider: String,
    pub(crate) scopes: Vec<String>,
    pub(crate) request_timeout: Duration,
}

impl BackendConfig {
    #[must_use]
    pub fn new(project_url: Url, anon_key: impl Into<String>, redirect_uri: Url) -> Self {
        Self {
            project_url,
            anon_key: anon_key.into(),
            redirect_uri,
            provider: "google".into(),
            scopes: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the OAuth provider (default: `google`).
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Upper bound for each backend request (default: 10 seconds).
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Extra provider scopes requested at sign-in.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn project_url(&self) -> &Url {
        &self.project_url
    }

    /// Where the provider sends the user back to (the callback path).
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Authorize URL plus the PKCE verifier the caller must keep until the callback.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: String,
    pub code_verifier: String,
}

impl AuthorizationRequest {
    #[must_use]
    pub fn new(url: impl Into<String>, code_verifier: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            code_verifier: code_verifier.into(),
        }
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self, now: OffsetDateTime) -> Session {
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .and_then(|secs| now.unix_timestamp().checked_add(secs))
        });
        let mut session = Session::new(
            SessionTokens::new(self.access_token, self.refresh_token),
            self.user,
        )
        .with_expires_at(expires_at);
        if let Some(token_type) = self.token_type {
            session.token_type = token_type;
        }
        session
    }
}

/// Stateless REST client for the backend auth service (`/auth/v1`).
///
/// Holds no session; callers own whatever it returns.
#[derive(Clone)]
pub struct AuthClient {
    config: BackendConfig,
    http: reqwest::Client,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Builds the provider sign-in URL with a fresh S256 challenge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the project URL cannot carry a path.
    pub fn authorization_url(&self) -> Result<AuthorizationRequest, Error> {
        let pkce = PkceChallenge::generate();
        let mut url = self.endpoint("authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", &self.config.provider)
            .append_pair("redirect_to", self.config.redirect_uri.as_str())
            .append_pair("code_challenge", pkce.challenge())
            .append_pair("code_challenge_method", pkce::CHALLENGE_METHOD);
        if !self.config.scopes.is_empty() {
            url.query_pairs_mut()
                .append_pair("scopes", &self.config.scopes.join(" "));
        }

        Ok(AuthorizationRequest::new(url, pkce.into_verifier()))
    }

    /// Exchanges an authorization code for a session (PKCE grant).
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the anon key is missing, [`Error::Http`] on network
    /// failure, [`Error::Backend`] if the backend rejects the code.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<Session, Error> {
        self.ensure_configured()?;
        let url = self.token_endpoint("pkce")?;
        let body = serde_json::json!({
            "auth_code": code,
            "code_verifier": code_verifier,
        });

        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .timeout(self.config.request_timeout)
            .json(&body)
            .send()
            .await?;

        let response = ensure_success(response, "code exchange").await?;
        let token = response.json::<TokenResponse>().await?;
        Ok(token.into_session(OffsetDateTime::now_utc()))
    }

    /// Exchanges a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Same as [`exchange_code`](Self::exchange_code).
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, Error> {
        self.ensure_configured()?;
        let url = self.token_endpoint("refresh_token")?;
        let body = serde_json::json!({ "refresh_token": refresh_token });

        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .timeout(self.config.request_timeout)
            .json(&body)
            .send()
            .await?;

        let response = ensure_success(response, "session refresh").await?;
        let token = response.json::<TokenResponse>().await?;
        Ok(token.into_session(OffsetDateTime::now_utc()))
    }

    /// Fetches the user an access token belongs to; doubles as token validation.
    ///
    /// # Errors
    ///
    /// [`Error::Backend`] with status 401/403 when the token is not accepted.
    pub async fn get_user(&self, access_token: &str) -> Result<User, Error> {
        self.ensure_configured()?;
        let response = self
            .http
            .get(self.endpoint("user")?)
            .header("apikey", &self.config.anon_key)
            .timeout(self.config.request_timeout)
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = ensure_success(response, "user request").await?;
        response.json::<User>().await.map_err(Into::into)
    }

    /// Revokes the session behind `access_token`.
    ///
    /// # Errors
    ///
    /// [`Error::Http`] or [`Error::Backend`].
    pub async fn sign_out(&self, access_token: &str) -> Result<(), Error> {
        self.ensure_configured()?;
        let response = self
            .http
            .post(self.endpoint("logout")?)
            .header("apikey", &self.config.anon_key)
            .timeout(self.config.request_timeout)
            .bearer_auth(access_token)
            .send()
            .await?;

        ensure_success(response, "sign out").await?;
        Ok(())
    }

    fn ensure_configured(&self) -> Result<(), Error> {
        if self.config.anon_key.trim().is_empty() {
            return Err(Error::Config("backend anon key is not set".into()));
        }
        Ok(())
    }

    fn endpoint(&self, name: &str) -> Result<Url, Error> {
        let mut url = self.config.project_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::Config(format!(
                    "project URL cannot carry a path: {}",
                    self.config.project_url
                ))
            })?
            .pop_if_empty()
            .extend(["auth", "v1", name]);
        Ok(url)
    }

    fn token_endpoint(&self, grant_type: &str) -> Result<Url, Error> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }
}

/// Checks HTTP response status; returns the response on success or an error with details.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let detail = response.text().await.unwrap_or_default();
    Err(Error::Backend {
        operation,
        status: Some(status),
        detail,
    })
}

/// Reads the `exp` claim of a JWT access token without verifying it.
///
/// Only used to decide whether to refresh before talking to the backend,
/// which performs the real verification.
#[must_use]
pub fn access_token_expiry(access_token: &str) -> Option<i64> {
    let payload = access_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}
