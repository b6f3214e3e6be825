//! Application-shell side of the recovery protocol.
//!
//! [`SessionRecoverer`] runs once on the recoverer page the redirect handler
//! hands off to. [`SessionSynchronizer`] runs for the lifetime of the shell and
//! mirrors every session change into the server's cookies.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oauth_recovery::client::{HttpCookieMirror, HttpSessionClient, SessionRecoverer, SessionSynchronizer};
//!
//! let backend = Arc::new(HttpSessionClient::new(auth_client));
//! let mirror = Arc::new(HttpCookieMirror::new(&origin)?);
//! let sync = SessionSynchronizer::new(backend.clone(), mirror.clone()).start();
//!
//! let recoverer = Arc::new(SessionRecoverer::new(backend, mirror));
//! let destination = recoverer.recover(&page_url).await;
//! ```

mod backend;
mod http;
mod mirror;
mod recoverer;
mod synchronizer;
mod wait;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{AuthBackend, AuthEvent, EventBus, Subscription};
pub use http::HttpSessionClient;
pub use mirror::{CookieMirror, HttpCookieMirror};
pub use recoverer::{RecoveryState, RecoveryTimings, SessionRecoverer};
pub use synchronizer::{SessionSynchronizer, SyncHandle};
pub use wait::{SessionWait, await_session};
