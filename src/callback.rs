//! Parsing of the OAuth provider's redirect into a [`CallbackContext`].
//!
//! Query parameters reach the server; the fragment only ever reaches the
//! browser. The server-side handler therefore builds its context from the
//! query alone and hands anything else over to the client recoverer.

use url::Url;
use url::form_urlencoded;

use crate::types::SessionTokens;

/// Raw callback parameters, as found in a query string or fragment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl CallbackParams {
    /// Lenient `application/x-www-form-urlencoded` parse; never fails.
    ///
    /// Empty values are dropped and the first occurrence of a key wins.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(input.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                "access_token" => &mut params.access_token,
                "refresh_token" => &mut params.refresh_token,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    fn tokens(&self) -> Option<SessionTokens> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some(SessionTokens::new(access, refresh)),
            _ => None,
        }
    }
}

/// Everything a single redirect tells us. Built once, consumed immediately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackContext {
    pub authorization_code: Option<String>,
    pub fragment_tokens: Option<SessionTokens>,
    pub provider_error: Option<String>,
    pub provider_error_description: Option<String>,
    pub state: Option<String>,
}

/// What the server-side handler does with a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// The provider refused; `details` is its description (or the bare code).
    ProviderError { error: String, details: String },
    /// Exchange this authorization code for a session.
    ExchangeCode(String),
    /// Nothing usable in the query; tokens may sit in the fragment.
    ClientHandoff,
}

impl CallbackContext {
    /// Server view: only the query string is available.
    #[must_use]
    pub fn from_query(query: Option<&str>) -> Self {
        let params = CallbackParams::parse(query.unwrap_or_default());
        Self {
            authorization_code: params.code,
            fragment_tokens: None,
            provider_error: params.error,
            provider_error_description: params.error_description,
            state: params.state,
        }
    }

    /// Browser view: query and fragment. Query values win over fragment values.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let query = CallbackParams::parse(url.query().unwrap_or_default());
        let fragment = CallbackParams::parse(url.fragment().unwrap_or_default());

        Self {
            fragment_tokens: fragment.tokens(),
            authorization_code: query.code.or(fragment.code),
            provider_error: query.error.or(fragment.error),
            provider_error_description: query.error_description.or(fragment.error_description),
            state: query.state.or(fragment.state),
        }
    }

    #[must_use]
    pub fn strategy(&self) -> RecoveryStrategy {
        if let Some(error) = &self.provider_error {
            let details = self
                .provider_error_description
                .clone()
                .unwrap_or_else(|| error.clone());
            return RecoveryStrategy::ProviderError {
                error: error.clone(),
                details,
            };
        }
        match &self.authorization_code {
            Some(code) => RecoveryStrategy::ExchangeCode(code.clone()),
            None => RecoveryStrategy::ClientHandoff,
        }
    }

    /// Recoverer path the handoff page navigates to, carrying `state` along.
    ///
    /// The fragment is appended by the browser, not here.
    #[must_use]
    pub fn handoff_target(&self, recoverer_path: &str) -> String {
        match &self.state {
            Some(state) => format!("{recoverer_path}?state={}", urlencoding::encode(state)),
            None => recoverer_path.to_string(),
        }
    }
}
