use std::future::Future;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::error::Error;
use crate::types::{Session, SessionTokens};

const EVENT_CAPACITY: usize = 32;

/// Session change notifications, delivered in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    UserUpdated(Session),
}

impl AuthEvent {
    /// Event name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed(_) => "TOKEN_REFRESHED",
            Self::UserUpdated(_) => "USER_UPDATED",
        }
    }
}

/// Fan-out of [`AuthEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AuthEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Emit to current subscribers. Nobody listening is not an error.
    pub fn emit(&self, event: AuthEvent) {
        tracing::debug!(event = event.name(), "Auth event");
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }
}

/// A live registration on an [`EventBus`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<AuthEvent>,
}

impl Subscription {
    /// Next event, or `None` once the bus is gone.
    ///
    /// Events missed because the subscriber fell behind are skipped.
    pub async fn next_event(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Cancel the registration.
    pub fn unsubscribe(self) {}
}

/// The browser-side auth client the recoverer and synchronizer drive.
///
/// [`HttpSessionClient`](super::HttpSessionClient) is the production
/// implementation; tests substitute their own.
pub trait AuthBackend: Send + Sync + 'static {
    /// Currently held session, if any. May refresh an expired one.
    fn get_session(&self) -> impl Future<Output = Result<Option<Session>, Error>> + Send;

    /// Install a session from bare tokens (implicit flow).
    fn set_session(
        &self,
        tokens: &SessionTokens,
    ) -> impl Future<Output = Result<Session, Error>> + Send;

    /// Exchange an authorization code using the verifier held since sign-in started.
    fn exchange_code_for_session(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Session, Error>> + Send;

    fn sign_out(&self) -> impl Future<Output = Result<(), Error>> + Send;

    fn subscribe(&self) -> Subscription;
}
