use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};

use super::backend::{AuthBackend, AuthEvent, EventBus, Subscription};
use crate::api::{AuthClient, AuthorizationRequest, access_token_expiry};
use crate::error::Error;
use crate::types::{Session, SessionTokens};

/// Stateful auth client over [`AuthClient`], holding the current session.
///
/// Create one per application shell and share it (behind an `Arc`) between
/// the recoverer and the synchronizer.
pub struct HttpSessionClient {
    client: AuthClient,
    session: RwLock<Option<Session>>,
    pending_verifier: Mutex<Option<String>>,
    events: EventBus,
}

impl HttpSessionClient {
    #[must_use]
    pub fn new(client: AuthClient) -> Self {
        Self {
            client,
            session: RwLock::new(None),
            pending_verifier: Mutex::new(None),
            events: EventBus::new(),
        }
    }

    /// Start from a previously persisted session. No event is emitted for it.
    #[must_use]
    pub fn with_session(self, session: Session) -> Self {
        Self {
            session: RwLock::new(Some(session)),
            ..self
        }
    }

    /// Provider sign-in URL. The verifier is kept for the later code exchange.
    ///
    /// # Errors
    ///
    /// See [`AuthClient::authorization_url`].
    pub async fn authorization_url(&self) -> Result<AuthorizationRequest, Error> {
        let request = self.client.authorization_url()?;
        *self.pending_verifier.lock().await = Some(request.code_verifier.clone());
        Ok(request)
    }

    /// Refresh the held session and emit `TokenRefreshed`.
    ///
    /// # Errors
    ///
    /// [`Error::OAuth`] without a session, otherwise the backend error.
    pub async fn refresh_session(&self) -> Result<Session, Error> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or_else(|| Error::OAuth("no session to refresh".into()))?;

        let session = self.client.refresh_session(&refresh_token).await?;
        *self.session.write().await = Some(session.clone());
        tracing::debug!(user_id = %session.user.id, "Session refreshed");
        self.events.emit(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    async fn install(&self, session: Session) -> Session {
        *self.session.write().await = Some(session.clone());
        tracing::info!(user_id = %session.user.id, "Signed in");
        self.events.emit(AuthEvent::SignedIn(session.clone()));
        session
    }
}

impl AuthBackend for HttpSessionClient {
    async fn get_session(&self) -> Result<Option<Session>, Error> {
        let cached = self.session.read().await.clone();
        match cached {
            None => Ok(None),
            Some(session) if !session.is_expired_at(OffsetDateTime::now_utc()) => Ok(Some(session)),
            Some(_) => {
                tracing::debug!("Cached session expired, refreshing");
                self.refresh_session().await.map(Some)
            }
        }
    }

    async fn set_session(&self, tokens: &SessionTokens) -> Result<Session, Error> {
        if !tokens.is_complete() {
            return Err(Error::Token("access and refresh tokens are required".into()));
        }

        let expires_at = access_token_expiry(&tokens.access_token);
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let session = match expires_at {
            Some(exp) if exp <= now => {
                tracing::debug!("Access token already expired, refreshing");
                self.client.refresh_session(&tokens.refresh_token).await?
            }
            _ => {
                let user = self.client.get_user(&tokens.access_token).await?;
                Session::new(tokens.clone(), user).with_expires_at(expires_at)
            }
        };

        Ok(self.install(session).await)
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, Error> {
        let verifier = self
            .pending_verifier
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::OAuth("no pending PKCE code verifier".into()))?;

        let session = self.client.exchange_code(code, &verifier).await?;
        Ok(self.install(session).await)
    }

    async fn sign_out(&self) -> Result<(), Error> {
        let previous = self.session.write().await.take();
        let result = match &previous {
            Some(session) => self.client.sign_out(&session.access_token).await,
            None => Ok(()),
        };
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Backend sign out failed, local session cleared anyway");
        }
        self.events.emit(AuthEvent::SignedOut);
        result
    }

    fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;
    use crate::api::BackendConfig;
    use crate::types::User;

    fn unconfigured() -> HttpSessionClient {
        let config = BackendConfig::new(
            "https://project.example.co".parse().unwrap(),
            "",
            "https://app.example.com/auth/callback".parse().unwrap(),
        );
        HttpSessionClient::new(AuthClient::new(config))
    }

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
        format!("{header}.{payload}.sig")
    }

    #[tokio::test]
    async fn restored_session_is_returned_without_event() {
        let session = Session::new(SessionTokens::new("a", "r"), User::new("u1"));
        let client = unconfigured().with_session(session.clone());
        let mut events = client.subscribe();

        assert_eq!(client.get_session().await.unwrap(), Some(session));
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(10), events.next_event())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn no_session_is_none() {
        assert_eq!(unconfigured().get_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_session_triggers_refresh() {
        let session = Session::new(SessionTokens::new("a", "r"), User::new("u1"))
            .with_expires_at(Some(0));
        let client = unconfigured().with_session(session);

        let err = client.get_session().await.unwrap_err();
        assert!(err.is_config(), "{err}");
    }

    #[tokio::test]
    async fn exchange_without_pending_verifier_fails() {
        let err = unconfigured()
            .exchange_code_for_session("abc")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OAuth(_)), "{err}");
    }

    #[tokio::test]
    async fn authorization_url_keeps_verifier() {
        let client = unconfigured();
        let request = client.authorization_url().await.unwrap();
        assert_eq!(
            client.pending_verifier.lock().await.as_deref(),
            Some(request.code_verifier.as_str())
        );
    }

    #[tokio::test]
    async fn set_session_rejects_incomplete_tokens() {
        let err = unconfigured()
            .set_session(&SessionTokens::new("a", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Token(_)), "{err}");
    }

    #[tokio::test]
    async fn set_session_validates_against_backend() {
        let live = jwt_with_exp(OffsetDateTime::now_utc().unix_timestamp() + 3600);
        let err = unconfigured()
            .set_session(&SessionTokens::new(live, "r"))
            .await
            .unwrap_err();
        assert!(err.is_config(), "{err}");

        let stale = jwt_with_exp(1);
        let err = unconfigured()
            .set_session(&SessionTokens::new(stale, "r"))
            .await
            .unwrap_err();
        assert!(err.is_config(), "{err}");
    }

    #[tokio::test]
    async fn sign_out_without_session_emits_event() {
        let client = unconfigured();
        let mut events = client.subscribe();

        client.sign_out().await.unwrap();
        assert_eq!(events.next_event().await, Some(AuthEvent::SignedOut));
    }
}
