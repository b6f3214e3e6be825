//! Server side of the recovery protocol for Axum.
//!
//! Mounts the OAuth callback (the redirect handler), the sign-in initiation
//! route and the cookie-mirror endpoints the client synchronizer writes to.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use oauth_recovery::middleware::{RecoveryConfig, auth_routes};
//!
//! let config = RecoveryConfig::from_env()?;
//! let app = axum::Router::new().merge(auth_routes(config));
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;
mod traits;

pub use config::RecoveryConfig;
pub use error::MirrorRejection;
pub use extractor::{MirroredSession, resolve_mirror};
pub use routes::auth_routes;
pub use state::AuthState;
pub use traits::OAuthBackend;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
