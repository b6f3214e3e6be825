#![doc = include_str!("../README.md")]

pub mod api;
pub mod callback;
#[cfg(feature = "client")]
pub mod client;
pub mod error;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod outcome;
pub mod pkce;
pub mod types;

// Re-exports for convenient access
pub use api::{AuthClient, AuthorizationRequest, BackendConfig, access_token_expiry};
pub use callback::{CallbackContext, CallbackParams, RecoveryStrategy};
pub use error::Error;
pub use outcome::{
    AuthError, Destination, ErrorCode, ErrorKind, Locale, RoutePaths, UnknownErrorCode,
    login_message,
};
pub use pkce::PkceChallenge;
pub use types::{Session, SessionTokens, User, UserId};
