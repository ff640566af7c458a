//! One page of a paginated result set.

use std::fmt;

use serde::Deserialize;
use serde_json::Number;

use crate::{Feature, HubError, HubResponse};

/// Opaque token returned by the server to request the next page.
///
/// The client never interprets the token. Numeric handles keep the textual
/// form the server sent, so they are echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationHandle(String);

impl ContinuationHandle {
    /// Wrap a raw handle.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Handle as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawHandle {
    Text(String),
    Number(Number),
}

#[derive(Deserialize)]
struct RawPage {
    features: Vec<Feature>,
    #[serde(default)]
    handle: Option<RawHandle>,
}

/// Features returned by one request plus the handle for the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Features in server order.
    pub features: Vec<Feature>,
    /// Handle for the next page; `None` ends the result set.
    pub handle: Option<ContinuationHandle>,
}

impl Page {
    /// Decode a page from a successful response body.
    ///
    /// The body must be a JSON object with a `features` array. An empty
    /// string handle is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::MalformedResponse`] if the body is not JSON or
    /// lacks the page shape.
    pub fn from_response(response: &HubResponse, path: &str) -> Result<Self, HubError> {
        let raw: RawPage = response.json(path)?;
        let handle = raw.handle.and_then(|handle| match handle {
            RawHandle::Text(text) if text.is_empty() => None,
            RawHandle::Text(text) => Some(ContinuationHandle(text)),
            RawHandle::Number(number) => Some(ContinuationHandle(number.to_string())),
        });
        Ok(Self {
            features: raw.features,
            handle,
        })
    }

    /// Whether this page ends the result set.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.handle.is_none()
    }
}
