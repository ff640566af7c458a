//! Client configuration.

use std::time::Duration;

use geohub_core::RetryPolicy;

use crate::CredentialSource;

/// Default Hub endpoint.
pub const DEFAULT_BASE_URL: &str = "https://xyz.api.here.com";

/// Default user agent for Hub requests.
pub const DEFAULT_USER_AGENT: &str = concat!("geohub-rs/", env!("CARGO_PKG_VERSION"));

/// Default number of features requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration consumed when building a [`HubClient`](crate::HubClient).
///
/// ```
/// use std::time::Duration;
/// use geohub_client::{ClientConfig, CredentialSource};
///
/// let config = ClientConfig::new("http://localhost:8080")
///     .with_credentials(CredentialSource::Explicit { token: "t".into() })
///     .with_page_size(500)
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(config.page_size, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the Hub, without the `/hub` prefix.
    pub base_url: String,
    /// Where the bearer token comes from.
    pub credentials: CredentialSource,
    /// Page size used by [`HubClient::search`](crate::HubClient::search).
    pub page_size: usize,
    /// Rate-limit backoff.
    pub retry: RetryPolicy,
    /// Per-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            credentials: CredentialSource::default(),
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Configuration for the Hub at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the credential source.
    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialSource) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the default page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the maximum number of attempts per request.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
