//! Terminal outcomes of the recovery flows and the login error vocabulary.

use std::fmt;
use std::str::FromStr;

use time::OffsetDateTime;

/// Machine-readable `error` query parameter handed to the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    NoCode,
    OAuthError,
    ExchangeFailed,
    NoSession,
    ConfigError,
    CallbackFailed,
    UnexpectedError,
    Timeout,
}

/// Failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The provider denied or was misconfigured.
    Provider,
    /// No code and no fragment tokens arrived.
    MissingInput,
    /// The backend rejected or never produced a session.
    Exchange,
    /// Required settings are missing; an operator has to act.
    Configuration,
    Unexpected,
}

/// Login page language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Ja,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoCode => "no_code",
            Self::OAuthError => "oauth_error",
            Self::ExchangeFailed => "exchange_failed",
            Self::NoSession => "no_session",
            Self::ConfigError => "config_error",
            Self::CallbackFailed => "callback_failed",
            Self::UnexpectedError => "unexpected_error",
            Self::Timeout => "timeout",
        }
    }

    #[must_use]
    pub fn kind(self) -> ErrorKind {
        match self {
            Self::OAuthError => ErrorKind::Provider,
            Self::NoCode => ErrorKind::MissingInput,
            Self::ExchangeFailed | Self::NoSession | Self::Timeout => ErrorKind::Exchange,
            Self::ConfigError => ErrorKind::Configuration,
            Self::CallbackFailed | Self::UnexpectedError => ErrorKind::Unexpected,
        }
    }

    /// Whether restarting sign-in can help. Nothing is retried automatically.
    #[must_use]
    pub fn retryable(self) -> bool {
        self.kind() != ErrorKind::Configuration
    }

    /// Human-readable message for the login page.
    #[must_use]
    pub fn message(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::NoCode, Locale::En) => "No sign-in information was received. Please try again.",
            (Self::NoCode, Locale::Ja) => "認証情報が見つかりませんでした。もう一度お試しください。",
            (Self::OAuthError, Locale::En) => "The sign-in provider reported an error.",
            (Self::OAuthError, Locale::Ja) => "認証プロバイダでエラーが発生しました。",
            (Self::ExchangeFailed, Locale::En) => "We could not complete sign-in. Please try again.",
            (Self::ExchangeFailed, Locale::Ja) => "認証に失敗しました。もう一度お試しください。",
            (Self::NoSession, Locale::En) => "No session could be established. Please sign in again.",
            (Self::NoSession, Locale::Ja) => "セッションを作成できませんでした。再度ログインしてください。",
            (Self::ConfigError, Locale::En) => "Sign-in is temporarily unavailable due to a server configuration problem.",
            (Self::ConfigError, Locale::Ja) => "サーバー設定に問題があるため、現在ログインできません。",
            (Self::CallbackFailed, Locale::En) => "Something went wrong while processing the sign-in.",
            (Self::CallbackFailed, Locale::Ja) => "ログイン処理中にエラーが発生しました。",
            (Self::UnexpectedError, Locale::En) => "An unexpected error occurred. Please try again.",
            (Self::UnexpectedError, Locale::Ja) => "予期しないエラーが発生しました。もう一度お試しください。",
            (Self::Timeout, Locale::En) => "Sign-in took too long. Please try again.",
            (Self::Timeout, Locale::Ja) => "認証がタイムアウトしました。もう一度お試しください。",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown code in the `error` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown login error code: {0}")]
pub struct UnknownErrorCode(pub String);

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    /// Accepts the canonical codes and the legacy aliases still found in old links.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "no_code" => Self::NoCode,
            "oauth_error" => Self::OAuthError,
            "exchange_failed" | "auth_failed" => Self::ExchangeFailed,
            "no_session" => Self::NoSession,
            "config_error" | "server_config_error" => Self::ConfigError,
            "callback_failed" => Self::CallbackFailed,
            "unexpected_error" | "server_error" => Self::UnexpectedError,
            "timeout" => Self::Timeout,
            other => return Err(UnknownErrorCode(other.to_string())),
        })
    }
}

/// Login page message derived from nothing but the `error` query parameter.
///
/// Unknown codes fall back to the generic message; no code means no message.
#[must_use]
pub fn login_message(query: Option<&str>, locale: Locale) -> Option<&'static str> {
    let code = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .find(|(key, _)| key == "error")
        .map(|(_, value)| value.into_owned())?;
    let code = code.parse().unwrap_or(ErrorCode::UnexpectedError);
    Some(code.message(locale))
}

/// A failed protocol step. Never persisted; surfaced only as a login redirect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AuthError {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    /// Internal detail for logs; never shown to the user.
    pub message: String,
    pub retryable: bool,
    pub timestamp: OffsetDateTime,
    /// Provider-supplied description, forwarded as `details`.
    pub details: Option<String>,
}

impl AuthError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: code.kind(),
            code,
            message: message.into(),
            retryable: code.retryable(),
            timestamp: OffsetDateTime::now_utc(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn destination(&self) -> Destination {
        Destination::Login {
            error: Some(self.code),
            details: self.details.clone(),
        }
    }
}

/// Where a flow ends up. Every flow produces exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Home,
    Login {
        error: Option<ErrorCode>,
        details: Option<String>,
    },
}

impl Destination {
    #[must_use]
    pub fn login(code: ErrorCode) -> Self {
        Self::Login {
            error: Some(code),
            details: None,
        }
    }

    #[must_use]
    pub fn is_home(&self) -> bool {
        matches!(self, Self::Home)
    }

    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Home => None,
            Self::Login { error, .. } => *error,
        }
    }

    /// Relative URL to navigate to.
    #[must_use]
    pub fn to_location(&self, paths: &RoutePaths) -> String {
        match self {
            Self::Home => paths.home.clone(),
            Self::Login { error, details } => {
                let mut location = paths.login.clone();
                let mut separator = if location.contains('?') { '&' } else { '?' };
                if let Some(code) = error {
                    location.push(separator);
                    location.push_str("error=");
                    location.push_str(code.as_str());
                    separator = '&';
                }
                if let Some(details) = details {
                    location.push(separator);
                    location.push_str("details=");
                    location.push_str(&urlencoding::encode(details));
                }
                location
            }
        }
    }
}

/// The two terminal paths of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePaths {
    pub home: String,
    pub login: String,
}

impl Default for RoutePaths {
    fn default() -> Self {
        Self {
            home: "/".into(),
            login: "/auth/login".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ErrorCode; 8] = [
        ErrorCode::NoCode,
        ErrorCode::OAuthError,
        ErrorCode::ExchangeFailed,
        ErrorCode::NoSession,
        ErrorCode::ConfigError,
        ErrorCode::CallbackFailed,
        ErrorCode::UnexpectedError,
        ErrorCode::Timeout,
    ];

    #[test]
    fn codes_parse_back() {
        for code in ALL {
            assert_eq!(code.as_str().parse::<ErrorCode>(), Ok(code));
        }
    }

    #[test]
    fn aliases_parse() {
        assert_eq!("auth_failed".parse::<ErrorCode>(), Ok(ErrorCode::ExchangeFailed));
        assert_eq!("server_config_error".parse::<ErrorCode>(), Ok(ErrorCode::ConfigError));
        assert_eq!("server_error".parse::<ErrorCode>(), Ok(ErrorCode::UnexpectedError));
        assert!("bogus".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn every_code_has_messages() {
        for code in ALL {
            assert!(!code.message(Locale::En).is_empty());
            assert!(!code.message(Locale::Ja).is_empty());
        }
    }

    #[test]
    fn only_config_errors_are_not_retryable() {
        for code in ALL {
            assert_eq!(code.retryable(), code != ErrorCode::ConfigError, "{code}");
        }
    }

    #[test]
    fn login_message_uses_error_param_only() {
        assert_eq!(
            login_message(Some("error=timeout&details=boom"), Locale::En),
            Some(ErrorCode::Timeout.message(Locale::En))
        );
        assert_eq!(
            login_message(Some("error=whatever"), Locale::En),
            Some(ErrorCode::UnexpectedError.message(Locale::En))
        );
        assert_eq!(login_message(Some("details=x"), Locale::En), None);
        assert_eq!(login_message(None, Locale::Ja), None);
    }

    #[test]
    fn login_location_with_details() {
        let paths = RoutePaths::default();
        let destination = AuthError::new(ErrorCode::OAuthError, "access_denied")
            .with_details("User cancelled")
            .destination();

        assert_eq!(
            destination.to_location(&paths),
            "/auth/login?error=oauth_error&details=User%20cancelled"
        );
    }

    #[test]
    fn home_and_plain_login_locations() {
        let paths = RoutePaths::default();
        assert_eq!(Destination::Home.to_location(&paths), "/");
        assert_eq!(
            Destination::login(ErrorCode::NoCode).to_location(&paths),
            "/auth/login?error=no_code"
        );

        let paths = RoutePaths {
            home: "/feed".into(),
            login: "/login?lang=ja".into(),
        };
        assert_eq!(
            Destination::login(ErrorCode::Timeout).to_location(&paths),
            "/login?lang=ja&error=timeout"
        );
    }

    #[test]
    fn auth_error_carries_taxonomy() {
        let err = AuthError::new(ErrorCode::ConfigError, "SUPABASE_ANON_KEY missing");
        assert_eq!(err.kind, ErrorKind::Configuration);
        assert!(!err.retryable);
        assert_eq!(err.destination().error_code(), Some(ErrorCode::ConfigError));
        assert_eq!(err.to_string(), "config_error: SUPABASE_ANON_KEY missing");
    }
}
