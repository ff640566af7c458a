//! Single-request transport seam.
//!
//! A [`Transport`] sends one [`HubRequest`] and hands back the raw
//! [`HubResponse`] whatever its status. Interpreting the status is left to
//! the layers above: [`Retrying`](crate::Retrying) handles rate limiting and
//! [`HubResponse::ensure_success`] turns the remaining failures into
//! [`HubError::Http`].

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::HubError;

/// Value sent as the `clientId` query parameter on every request.
pub const CLIENT_ID: &str = "geohub-rs";

/// HTTP method of a Hub request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Media type of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    /// `application/json`
    #[default]
    Json,
    /// `application/geo+json`, used for feature payloads.
    GeoJson,
}

impl ContentType {
    /// MIME string for the `Content-Type` header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::GeoJson => "application/geo+json",
        }
    }
}

/// One request against the Hub, relative to the configured base URL.
///
/// Path segments are stored unencoded; transports percent-encode them when
/// building the final URL, so identifiers containing reserved characters
/// cannot escape their segment.
#[derive(Debug, Clone, PartialEq)]
pub struct HubRequest {
    /// HTTP method.
    pub method: Method,
    /// Unencoded path segments, for example `["hub", "spaces", "abc"]`.
    pub segments: Vec<String>,
    /// Query parameters in the order they are sent.
    pub query: Vec<(String, String)>,
    /// Optional JSON body.
    pub body: Option<Value>,
    /// Media type of `body`.
    pub content_type: ContentType,
}

impl HubRequest {
    /// Create a request with the given method and path segments.
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
            content_type: ContentType::Json,
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Get, segments)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_param(key, value);
        self
    }

    /// Append a query parameter in place.
    pub fn push_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self.content_type = ContentType::Json;
        self
    }

    /// Attach a GeoJSON body.
    #[must_use]
    pub fn with_geojson(mut self, body: Value) -> Self {
        self.body = Some(body);
        self.content_type = ContentType::GeoJson;
        self
    }

    /// Path as it appears in logs and errors, e.g. `/hub/spaces/abc`.
    #[must_use]
    pub fn path(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            path.push_str(segment);
        }
        if path.is_empty() {
            path.push('/');
        }
        path
    }

    /// First value of the query parameter `key`.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response returned by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers as received.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HubResponse {
    /// Create a response without headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Whether the server asked the client to slow down.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Delay requested through `Retry-After`, in seconds.
    ///
    /// Zero, negative and non-finite values yield `Some(Duration::ZERO)` so
    /// the retry policy can clamp them; unparsable values are ignored.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        let seconds: f64 = self.header("retry-after")?.trim().parse().ok()?;
        if seconds.is_finite() && seconds > 0.0 {
            Duration::try_from_secs_f64(seconds).ok()
        } else {
            Some(Duration::ZERO)
        }
    }

    /// Body decoded as lossy UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Return the response unchanged when successful, or an
    /// [`HubError::Http`] carrying the status and body otherwise.
    ///
    /// # Errors
    ///
    /// Fails for every status outside the 2xx range.
    pub fn ensure_success(self, path: &str) -> Result<Self, HubError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HubError::Http {
                path: path.to_owned(),
                status: self.status,
                body: self.text(),
            })
        }
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::MalformedResponse`] when the body does not decode
    /// into `T`.
    pub fn json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HubError> {
        serde_json::from_slice(&self.body).map_err(|err| HubError::MalformedResponse {
            path: path.to_owned(),
            message: err.to_string(),
        })
    }
}

/// Sends a single request to the Hub.
///
/// Implementations return `Ok` for every response the server produced,
/// including error statuses, and `Err` only when no response was obtained.
pub trait Transport {
    /// Execute `request` once.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Network`], [`HubError::Timeout`] or
    /// [`HubError::Cancelled`] when no response was received.
    fn execute(&self, request: &HubRequest) -> Result<HubResponse, HubError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HubRequest) -> Result<HubResponse, HubError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HubRequest) -> Result<HubResponse, HubError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: &HubRequest) -> Result<HubResponse, HubError> {
        (**self).execute(request)
    }
}
