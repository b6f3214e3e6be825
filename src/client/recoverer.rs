use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use url::Url;

use super::backend::AuthBackend;
use super::mirror::CookieMirror;
use super::wait::{SessionWait, await_session};
use crate::callback::{CallbackContext, RecoveryStrategy};
use crate::outcome::{AuthError, Destination, ErrorCode, ErrorKind};
use crate::types::Session;

/// Where a recovery attempt currently stands, for status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Checking,
    ParsingFragment,
    ExchangingCode,
    AwaitingSession,
    Established,
    NotFound,
    Failed,
}

/// Delays used by [`SessionRecoverer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryTimings {
    /// Pause before the first session check, giving the auth client time to
    /// pick up a session on its own.
    pub detect_delay: Duration,
    /// How long the "nothing found" state is shown before redirecting.
    pub not_found_delay: Duration,
    /// Window for a session to show up after tokens were not accepted.
    pub session_wait: Duration,
}

impl Default for RecoveryTimings {
    fn default() -> Self {
        Self {
            detect_delay: Duration::from_millis(300),
            not_found_delay: Duration::from_millis(1200),
            session_wait: Duration::from_secs(5),
        }
    }
}

impl RecoveryTimings {
    /// No delays at all.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            detect_delay: Duration::ZERO,
            not_found_delay: Duration::ZERO,
            session_wait: Duration::ZERO,
        }
    }
}

/// Establishes a session on the recoverer page from whatever the provider
/// redirect carried: an existing session, fragment tokens or a code.
pub struct SessionRecoverer<B, M> {
    backend: Arc<B>,
    mirror: Arc<M>,
    timings: RecoveryTimings,
    state: watch::Sender<RecoveryState>,
}

impl<B: AuthBackend, M: CookieMirror> SessionRecoverer<B, M> {
    #[must_use]
    pub fn new(backend: Arc<B>, mirror: Arc<M>) -> Self {
        let (state, _) = watch::channel(RecoveryState::Checking);
        Self {
            backend,
            mirror,
            timings: RecoveryTimings::default(),
            state,
        }
    }

    #[must_use]
    pub fn with_timings(mut self, timings: RecoveryTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Follow state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<RecoveryState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> RecoveryState {
        *self.state.borrow()
    }

    /// Run one recovery for the page at `url` and return where to go next.
    ///
    /// Always produces exactly one destination, even if the flow panics.
    pub async fn recover(self: &Arc<Self>, url: &Url) -> Destination {
        let context = CallbackContext::from_url(url);
        let this = Arc::clone(self);

        match tokio::spawn(async move { this.run(context).await }).await {
            Ok(destination) => destination,
            Err(e) => self.fail(AuthError::new(ErrorCode::UnexpectedError, e.to_string())),
        }
    }

    async fn run(&self, context: CallbackContext) -> Destination {
        if let RecoveryStrategy::ProviderError { error, details } = context.strategy() {
            return self.fail(AuthError::new(ErrorCode::OAuthError, error).with_details(details));
        }

        self.set_state(RecoveryState::Checking);
        if !self.timings.detect_delay.is_zero() {
            tokio::time::sleep(self.timings.detect_delay).await;
        }
        match self.backend.get_session().await {
            Ok(Some(session)) => {
                tracing::info!("Existing session detected");
                return self.establish(session).await;
            }
            Ok(None) => {}
            Err(e) if e.is_config() => {
                return self.fail(AuthError::new(ErrorCode::ConfigError, e.to_string()));
            }
            Err(e) => tracing::warn!(error = %e, "Session check failed, continuing recovery"),
        }

        let subscription = self.backend.subscribe();
        let mut attempted = false;

        if let Some(tokens) = &context.fragment_tokens {
            self.set_state(RecoveryState::ParsingFragment);
            attempted = true;
            match self.backend.set_session(tokens).await {
                Ok(session) => {
                    subscription.unsubscribe();
                    return self.establish(session).await;
                }
                Err(e) => tracing::warn!(error = %e, "Fragment tokens not accepted"),
            }
        }

        if let Some(code) = &context.authorization_code {
            self.set_state(RecoveryState::ExchangingCode);
            let exchanged = self.backend.exchange_code_for_session(code).await;
            subscription.unsubscribe();
            return match exchanged {
                Ok(session) => self.establish(session).await,
                Err(e) => self.fail(AuthError::new(ErrorCode::ExchangeFailed, e.to_string())),
            };
        }

        if attempted {
            self.set_state(RecoveryState::AwaitingSession);
            let wait = await_session(&*self.backend, subscription, self.timings.session_wait).await;
            if let SessionWait::Established(session) = wait {
                return self.establish(session).await;
            }
            let code = wait.destination().error_code().unwrap_or(ErrorCode::Timeout);
            return self.fail(AuthError::new(code, "no session after waiting"));
        }

        subscription.unsubscribe();
        self.set_state(RecoveryState::NotFound);
        tracing::info!("No session, code or tokens found");
        if !self.timings.not_found_delay.is_zero() {
            tokio::time::sleep(self.timings.not_found_delay).await;
        }
        Destination::login(ErrorCode::NoCode)
    }

    async fn establish(&self, session: Session) -> Destination {
        self.set_state(RecoveryState::Established);
        if let Err(e) = self.mirror.write(&session.tokens()).await {
            tracing::warn!(error = %e, "Cookie mirror write failed");
        }
        tracing::info!(user_id = %session.user.id, "Session established");
        Destination::Home
    }

    fn fail(&self, error: AuthError) -> Destination {
        match error.kind {
            ErrorKind::Configuration | ErrorKind::Unexpected => {
                tracing::error!(code = %error.code, error = %error.message, "Session recovery failed");
            }
            ErrorKind::Provider | ErrorKind::MissingInput | ErrorKind::Exchange => {
                tracing::warn!(code = %error.code, error = %error.message, "Session recovery failed");
            }
        }
        self.set_state(RecoveryState::Failed);
        error.destination()
    }

    fn set_state(&self, state: RecoveryState) {
        tracing::debug!(?state, "Recovery state");
        self.state.send_replace(state);
    }
}
