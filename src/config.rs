//! Client configuration shared by every backend call.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Backend address used when none is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
/// Default snapshot poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Default TCP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default idle read timeout for streamed responses, in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 90;
/// Default whole-request timeout for non-streaming calls, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default push reconnect delay in seconds.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 3;
/// Default number of search results requested.
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The base URL is not an absolute http(s) URL.
    #[error("invalid API URL '{0}'\n  Suggestion: Use an absolute URL such as {DEFAULT_API_URL}")]
    InvalidApiUrl(String),

    /// A duration that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// The search limit is out of range.
    #[error("search limit must be between 1 and 100, got {0}")]
    SearchLimit(u32),
}

/// Connection settings for the audiobook backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `http://localhost:8000`.
    pub api_url: Url,
    /// Bearer token; push subscriptions are disabled without one.
    pub token: Option<String>,
    /// Interval between authoritative queue snapshots.
    pub poll_interval: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Maximum idle time between reads on a streamed response.
    pub read_timeout: Duration,
    /// Whole-request timeout for non-streaming calls.
    pub request_timeout: Duration,
    /// Base delay before the push stream reconnects.
    pub reconnect_delay: Duration,
    /// Number of search results requested.
    pub search_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `api_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidApiUrl`] when `api_url` is not an
    /// absolute http(s) URL.
    pub fn with_api_url(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url(api_url)?,
            ..Self::default()
        })
    }

    /// Sets the bearer token; blank tokens are treated as absent.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.api_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidApiUrl(self.api_url.to_string()));
        }
        for (name, value) in [
            ("poll interval", self.poll_interval),
            ("connect timeout", self.connect_timeout),
            ("read timeout", self.read_timeout),
            ("request timeout", self.request_timeout),
            ("reconnect delay", self.reconnect_delay),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        if !(1..=100).contains(&self.search_limit) {
            return Err(ConfigError::SearchLimit(self.search_limit));
        }
        Ok(())
    }

    /// Resolves `path` (e.g. `/api/queue`) against the base URL.
    ///
    /// A path prefix on the base URL is kept, so `http://host/app` resolves
    /// `/api/queue` to `http://host/app/api/queue`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.api_url.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}/{}", path.trim_start_matches('/')));
        url.set_query(None);
        url
    }
}

/// Parses and checks a backend base URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidApiUrl`] for relative or non-http(s) URLs.
pub fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(url),
        _ => Err(ConfigError::InvalidApiUrl(trimmed.to_string())),
    }
}

#[allow(clippy::expect_used)]
fn default_api_url() -> Url {
    parse_api_url(DEFAULT_API_URL).expect("default API URL is a valid absolute URL")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url.as_str(), "http://localhost:8000/");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_api_url_rejects_relative_and_other_schemes() {
        assert!(matches!(
            ClientConfig::with_api_url("localhost:8000"),
            Err(ConfigError::InvalidApiUrl(_))
        ));
        assert!(matches!(
            ClientConfig::with_api_url("ftp://example.com"),
            Err(ConfigError::InvalidApiUrl(_))
        ));
        assert!(ClientConfig::with_api_url(" https://books.example.com ").is_ok());
    }

    #[test]
    fn test_with_token_drops_blank_values() {
        let config = ClientConfig::default().with_token(Some("   ".into()));
        assert!(config.token.is_none());
        let config = ClientConfig::default().with_token(Some(" abc \n".into()));
        assert_eq!(config.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_validate_rejects_zero_durations_and_bad_limit() {
        let config = ClientConfig {
            poll_interval: Duration::ZERO,
            ..ClientConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("poll interval"))
        );

        let config = ClientConfig {
            search_limit: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::SearchLimit(0)));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let config = ClientConfig::with_api_url("http://host:9000/app/").unwrap();
        assert_eq!(
            config.endpoint("/api/queue").as_str(),
            "http://host:9000/app/api/queue"
        );
        let config = ClientConfig::with_api_url("http://host:9000").unwrap();
        assert_eq!(
            config.endpoint("api/queue/5/retry").as_str(),
            "http://host:9000/api/queue/5/retry"
        );
    }
}
