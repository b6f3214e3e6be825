#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Protocol-level problem detected before or after talking to the backend.
    #[error("OAuth error: {0}")]
    OAuth(String),
    /// The backend answered with a non-success status.
    #[error("{operation} failed (status {status:?}): {detail}")]
    Backend {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid token: {0}")]
    Token(String),
}

impl Error {
    /// Whether the error can only be fixed by an operator, not by the user.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
