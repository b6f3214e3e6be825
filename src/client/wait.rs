use std::time::Duration;

use super::backend::{AuthBackend, AuthEvent, Subscription};
use crate::outcome::{Destination, ErrorCode};
use crate::types::Session;

/// Result of waiting for a session to appear.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionWait {
    Established(Session),
    SignedOut,
    TimedOut,
}

impl SessionWait {
    #[must_use]
    pub fn destination(&self) -> Destination {
        match self {
            Self::Established(_) => Destination::Home,
            Self::SignedOut => Destination::login(ErrorCode::NoSession),
            Self::TimedOut => Destination::login(ErrorCode::Timeout),
        }
    }
}

/// Wait up to `window` for a sign-in event on `subscription`.
///
/// A sign-out ends the wait immediately. If the window elapses (or the event
/// source goes away) the subscription is dropped and the backend is asked
/// once more before giving up.
pub async fn await_session<B: AuthBackend>(
    backend: &B,
    mut subscription: Subscription,
    window: Duration,
) -> SessionWait {
    let settled = {
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                event = subscription.next_event() => match event {
                    Some(AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session)) => {
                        break Some(SessionWait::Established(session));
                    }
                    Some(AuthEvent::SignedOut) => break Some(SessionWait::SignedOut),
                    Some(AuthEvent::UserUpdated(_)) => {}
                    None => {
                        tracing::debug!("Auth events closed while waiting for a session");
                        break None;
                    }
                },
                () = &mut deadline => {
                    tracing::debug!(?window, "Session wait window elapsed");
                    break None;
                }
            }
        }
    };
    subscription.unsubscribe();

    if let Some(settled) = settled {
        return settled;
    }

    match backend.get_session().await {
        Ok(Some(session)) => {
            tracing::info!("Session found on final check");
            SessionWait::Established(session)
        }
        Ok(None) => SessionWait::TimedOut,
        Err(e) => {
            tracing::warn!(error = %e, "Final session check failed");
            SessionWait::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::EventBus;
    use crate::client::testing::{MockBackend, session};

    const WINDOW: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn sign_in_event_ends_wait() {
        let backend = Arc::new(MockBackend::new());
        let subscription = backend.subscribe();

        let emitter = backend.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            emitter.sign_in_elsewhere(session("late"));
        });

        let outcome = await_session(&*backend, subscription, WINDOW).await;
        assert_eq!(outcome, SessionWait::Established(session("late")));
        assert_eq!(backend.count("get_session"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_event_means_no_session() {
        let backend = MockBackend::new();
        let subscription = backend.subscribe();
        backend.events.emit(AuthEvent::SignedOut);

        let outcome = await_session(&backend, subscription, WINDOW).await;
        assert_eq!(outcome.destination(), Destination::login(ErrorCode::NoSession));
    }

    #[tokio::test(start_paused = true)]
    async fn window_elapsed_without_session_times_out() {
        let backend = MockBackend::new();
        let subscription = backend.subscribe();

        let started = tokio::time::Instant::now();
        let outcome = await_session(&backend, subscription, WINDOW).await;

        assert_eq!(outcome, SessionWait::TimedOut);
        assert_eq!(outcome.destination(), Destination::login(ErrorCode::Timeout));
        assert!(started.elapsed() >= WINDOW);
        assert_eq!(backend.count("get_session"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn final_check_finds_quiet_session() {
        let backend = MockBackend::new().with_session(session("quiet"));
        let subscription = backend.subscribe();

        let outcome = await_session(&backend, subscription, WINDOW).await;
        assert!(outcome.destination().is_home());
    }

    #[tokio::test(start_paused = true)]
    async fn user_updates_do_not_end_wait() {
        let backend = MockBackend::new();
        let subscription = backend.subscribe();
        backend.events.emit(AuthEvent::UserUpdated(session("x")));

        let outcome = await_session(&backend, subscription, WINDOW).await;
        assert_eq!(outcome, SessionWait::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_event_source_rechecks_immediately() {
        let backend = MockBackend::new();
        let bus = EventBus::new();
        let subscription = bus.subscribe();
        drop(bus);

        let started = tokio::time::Instant::now();
        let outcome = await_session(&backend, subscription, WINDOW).await;

        assert_eq!(outcome, SessionWait::TimedOut);
        assert!(started.elapsed() < WINDOW);
        assert_eq!(backend.calls(), vec!["get_session"]);
    }
}
