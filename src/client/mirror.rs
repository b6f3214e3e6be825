use std::future::Future;
use std::time::Duration;

use url::Url;

use crate::api::ensure_success;
use crate::error::Error;
use crate::types::SessionTokens;

/// Server-readable copy of the session tokens.
pub trait CookieMirror: Send + Sync + 'static {
    /// Overwrite the mirror with `tokens`. Idempotent.
    fn write(&self, tokens: &SessionTokens) -> impl Future<Output = Result<(), Error>> + Send;

    /// Remove the mirror.
    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send;
}

/// [`CookieMirror`] backed by the server's cookie-mirror endpoints.
#[derive(Clone)]
pub struct HttpCookieMirror {
    http: reqwest::Client,
    set_url: Url,
    clear_url: Url,
    timeout: Duration,
}

impl HttpCookieMirror {
    /// Mirror endpoints under `/api/auth` on `origin`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `origin` cannot be joined with a path.
    pub fn new(origin: &Url) -> Result<Self, Error> {
        Self::with_api_path(origin, "/api/auth")
    }

    /// Mirror endpoints under a custom prefix.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `origin` cannot be joined with `api_path`.
    pub fn with_api_path(origin: &Url, api_path: &str) -> Result<Self, Error> {
        let join = |name: &str| {
            origin
                .join(&format!("{}/{name}", api_path.trim_end_matches('/')))
                .map_err(|e| Error::Config(format!("cookie mirror URL: {e}")))
        };
        Ok(Self {
            http: reqwest::Client::new(),
            set_url: join("set-cookies")?,
            clear_url: join("clear-cookies")?,
            timeout: Duration::from_secs(10),
        })
    }

    /// Upper bound for each mirror request (default: 10 seconds).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a custom HTTP client, e.g. one with a cookie store.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }
}

impl CookieMirror for HttpCookieMirror {
    async fn write(&self, tokens: &SessionTokens) -> Result<(), Error> {
        let response = self
            .http
            .post(self.set_url.clone())
            .timeout(self.timeout)
            .json(tokens)
            .send()
            .await?;
        ensure_success(response, "cookie mirror write").await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        let response = self
            .http
            .post(self.clear_url.clone())
            .timeout(self.timeout)
            .send()
            .await?;
        ensure_success(response, "cookie mirror clear").await?;
        Ok(())
    }
}
