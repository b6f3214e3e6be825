//! In-memory backend and mirror shared by the client tests.

use std::sync::Mutex;

use tokio::sync::mpsc;

use super::backend::{AuthBackend, AuthEvent, EventBus, Subscription};
use super::mirror::CookieMirror;
use crate::error::Error;
use crate::types::{Session, SessionTokens, User};

pub(crate) fn session(access: &str) -> Session {
    Session::new(SessionTokens::new(access, format!("{access}-refresh")), User::new("user-1"))
}

#[derive(Default)]
pub(crate) struct MockBackend {
    pub(crate) events: EventBus,
    session: Mutex<Option<Session>>,
    accept_tokens: bool,
    accept_code: bool,
    misconfigured: bool,
    session_check_fails: bool,
    panics: bool,
    calls: Mutex<Vec<&'static str>>,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_session(self, session: Session) -> Self {
        *self.session.lock().unwrap() = Some(session);
        self
    }

    pub(crate) fn accepting_tokens(mut self) -> Self {
        self.accept_tokens = true;
        self
    }

    pub(crate) fn accepting_code(mut self) -> Self {
        self.accept_code = true;
        self
    }

    pub(crate) fn misconfigured(mut self) -> Self {
        self.misconfigured = true;
        self
    }

    pub(crate) fn failing_session_check(mut self) -> Self {
        self.session_check_fails = true;
        self
    }

    pub(crate) fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Install a session as if another code path signed in.
    pub(crate) fn sign_in_elsewhere(&self, session: Session) {
        *self.session.lock().unwrap() = Some(session.clone());
        self.events.emit(AuthEvent::SignedIn(session));
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AuthBackend for MockBackend {
    async fn get_session(&self) -> Result<Option<Session>, Error> {
        self.record("get_session");
        if self.panics {
            panic!("backend exploded");
        }
        if self.misconfigured {
            return Err(Error::Config("anon key missing".into()));
        }
        if self.session_check_fails {
            return Err(Error::Backend {
                operation: "session refresh",
                status: Some(503),
                detail: "unavailable".into(),
            });
        }
        Ok(self.session.lock().unwrap().clone())
    }

    async fn set_session(&self, tokens: &SessionTokens) -> Result<Session, Error> {
        self.record("set_session");
        if !self.accept_tokens {
            return Err(Error::Backend {
                operation: "user request",
                status: Some(401),
                detail: "invalid JWT".into(),
            });
        }
        let session = Session::new(tokens.clone(), User::new("user-1"));
        self.sign_in_elsewhere(session.clone());
        Ok(session)
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, Error> {
        self.record("exchange_code_for_session");
        if !self.accept_code {
            return Err(Error::Backend {
                operation: "code exchange",
                status: Some(400),
                detail: format!("invalid code {code}"),
            });
        }
        let session = session(&format!("from-{code}"));
        self.sign_in_elsewhere(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), Error> {
        self.record("sign_out");
        self.session.lock().unwrap().take();
        self.events.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MirrorOp {
    Write(SessionTokens),
    Clear,
}

/// Records every mirror call on a channel, in call order.
pub(crate) struct RecordingMirror {
    ops: mpsc::UnboundedSender<MirrorOp>,
    failing: bool,
}

impl RecordingMirror {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<MirrorOp>) {
        let (ops, rx) = mpsc::unbounded_channel();
        (Self { ops, failing: false }, rx)
    }

    pub(crate) fn failing() -> (Self, mpsc::UnboundedReceiver<MirrorOp>) {
        let (mut mirror, rx) = Self::new();
        mirror.failing = true;
        (mirror, rx)
    }

    fn result(&self) -> Result<(), Error> {
        if self.failing {
            return Err(Error::Backend {
                operation: "cookie mirror write",
                status: Some(500),
                detail: String::new(),
            });
        }
        Ok(())
    }
}

impl CookieMirror for RecordingMirror {
    async fn write(&self, tokens: &SessionTokens) -> Result<(), Error> {
        let _ = self.ops.send(MirrorOp::Write(tokens.clone()));
        self.result()
    }

    async fn clear(&self) -> Result<(), Error> {
        let _ = self.ops.send(MirrorOp::Clear);
        self.result()
    }
}
