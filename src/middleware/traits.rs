use std::future::Future;

use crate::api::{AuthClient, AuthorizationRequest};
use crate::error::Error;
use crate::types::Session;

/// The part of the backend auth service the redirect handler talks to.
///
/// [`AuthClient`] is the production implementation; tests substitute their own.
///
/// # Example
///
/// ```rust,ignore
/// impl OAuthBackend for MyBackend {
///     fn authorization_url(&self) -> Result<AuthorizationRequest, Error> {
///         self.client.authorization_url()
///     }
///
///     async fn exchange_code_for_session(
///         &self,
///         code: &str,
///         code_verifier: Option<&str>,
///     ) -> Result<Option<Session>, Error> {
///         self.client.exchange_code(code, code_verifier.unwrap_or_default()).await.map(Some)
///     }
/// }
/// ```
pub trait OAuthBackend: Send + Sync + 'static {
    /// Provider sign-in URL plus the PKCE verifier to keep until the callback.
    fn authorization_url(&self) -> Result<AuthorizationRequest, Error>;

    /// One network call exchanging `code` for a session.
    ///
    /// `Ok(None)` means the backend answered but produced no session.
    fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> impl Future<Output = Result<Option<Session>, Error>> + Send;
}

impl OAuthBackend for AuthClient {
    fn authorization_url(&self) -> Result<AuthorizationRequest, Error> {
        AuthClient::authorization_url(self)
    }

    async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Option<Session>, Error> {
        let code_verifier = code_verifier
            .ok_or_else(|| Error::OAuth("missing PKCE code verifier".into()))?;
        let session = self.exchange_code(code, code_verifier).await?;
        Ok(Some(session).filter(|s| !s.access_token.is_empty()))
    }
}
