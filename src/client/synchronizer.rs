use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::backend::{AuthBackend, AuthEvent, Subscription};
use super::mirror::CookieMirror;

/// Keeps the server cookie mirror in step with the client session.
///
/// Runs for the lifetime of the application shell. Mirror failures are
/// logged and never retried; the next event overwrites the mirror anyway.
pub struct SessionSynchronizer<B, M> {
    backend: Arc<B>,
    mirror: Arc<M>,
}

/// Running synchronizer. Dropping it stops the task as well.
#[derive(Debug)]
pub struct SyncHandle {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Stop processing events and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.cancel.send(());
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Session synchronizer task ended abnormally");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<B: AuthBackend, M: CookieMirror> SessionSynchronizer<B, M> {
    #[must_use]
    pub fn new(backend: Arc<B>, mirror: Arc<M>) -> Self {
        Self { backend, mirror }
    }

    /// Subscribe, mirror the current session, then follow auth events.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(self) -> SyncHandle {
        let subscription = self.backend.subscribe();
        let (cancel, cancelled) = oneshot::channel();
        let task = tokio::spawn(self.run(subscription, cancelled));
        SyncHandle { cancel, task }
    }

    async fn run(self, mut subscription: Subscription, mut cancelled: oneshot::Receiver<()>) {
        self.initial_sync().await;

        loop {
            tokio::select! {
                biased;
                _ = &mut cancelled => break,
                event = subscription.next_event() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
            }
        }

        subscription.unsubscribe();
        tracing::debug!("Session synchronizer stopped");
    }

    async fn initial_sync(&self) {
        match self.backend.get_session().await {
            Ok(Some(session)) => {
                if let Err(e) = self.mirror.write(&session.tokens()).await {
                    tracing::warn!(error = %e, "Initial cookie mirror write failed");
                }
            }
            Ok(None) => tracing::debug!("No session to mirror at startup"),
            Err(e) => tracing::warn!(error = %e, "Initial session check failed"),
        }
    }

    async fn handle(&self, event: AuthEvent) {
        let name = event.name();
        let result = match event {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                self.mirror.write(&session.tokens()).await
            }
            AuthEvent::SignedOut => self.mirror.clear().await,
            AuthEvent::UserUpdated(_) => return,
        };

        match result {
            Ok(()) => tracing::debug!(event = name, "Cookie mirror synced"),
            Err(e) => tracing::warn!(event = name, error = %e, "Cookie mirror sync failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{MirrorOp, MockBackend, RecordingMirror, session};

    #[tokio::test]
    async fn initial_sync_writes_existing_session() {
        let backend = Arc::new(MockBackend::new().with_session(session("boot")));
        let (mirror, mut ops) = RecordingMirror::new();
        let handle = SessionSynchronizer::new(backend, Arc::new(mirror)).start();

        assert_eq!(
            ops.recv().await,
            Some(MirrorOp::Write(session("boot").tokens()))
        );
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn events_are_mirrored_in_order() {
        let backend = Arc::new(MockBackend::new());
        let (mirror, mut ops) = RecordingMirror::new();
        let handle = SessionSynchronizer::new(backend.clone(), Arc::new(mirror)).start();

        backend.events.emit(AuthEvent::SignedIn(session("one")));
        backend.events.emit(AuthEvent::UserUpdated(session("ignored")));
        backend.events.emit(AuthEvent::TokenRefreshed(session("two")));
        backend.events.emit(AuthEvent::SignedOut);

        assert_eq!(ops.recv().await, Some(MirrorOp::Write(session("one").tokens())));
        assert_eq!(ops.recv().await, Some(MirrorOp::Write(session("two").tokens())));
        assert_eq!(ops.recv().await, Some(MirrorOp::Clear));

        handle.shutdown().await;
        assert_eq!(ops.recv().await, None);
    }

    #[tokio::test]
    async fn failures_do_not_stop_sync() {
        let backend = Arc::new(MockBackend::new());
        let (mirror, mut ops) = RecordingMirror::failing();
        let handle = SessionSynchronizer::new(backend.clone(), Arc::new(mirror)).start();

        backend.events.emit(AuthEvent::SignedIn(session("one")));
        backend.events.emit(AuthEvent::SignedOut);

        assert_eq!(ops.recv().await, Some(MirrorOp::Write(session("one").tokens())));
        assert_eq!(ops.recv().await, Some(MirrorOp::Clear));
        assert!(!handle.is_finished());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn sign_out_through_backend_clears_mirror() {
        let backend = Arc::new(MockBackend::new().with_session(session("s")));
        let (mirror, mut ops) = RecordingMirror::new();
        let handle = SessionSynchronizer::new(backend.clone(), Arc::new(mirror)).start();
        assert!(matches!(ops.recv().await, Some(MirrorOp::Write(_))));

        backend.sign_out().await.unwrap();
        assert_eq!(ops.recv().await, Some(MirrorOp::Clear));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn dropping_handle_stops_task() {
        let backend = Arc::new(MockBackend::new());
        let (mirror, mut ops) = RecordingMirror::new();
        let handle = SessionSynchronizer::new(backend.clone(), Arc::new(mirror)).start();
        drop(handle);

        // The mirror is released once the task exits.
        assert_eq!(ops.recv().await, None);
        backend.events.emit(AuthEvent::SignedOut);
    }
}
