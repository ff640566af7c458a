//! Core model and paging protocol for the geohub client.
//!
//! The crate knows how to describe a feature query, turn it into Hub
//! requests, and walk a paginated result set one page at a time. It does not
//! perform any I/O itself: requests go through the [`Transport`] trait and
//! backoff waits through the [`Sleeper`] trait, so the whole protocol can be
//! exercised against in-memory fakes from [`test_support`].
//!
//! # Example
//!
//! ```
//! use geohub_core::test_support::{PagedHub, sample_features};
//! use geohub_core::{SearchQuery, SpaceId, search};
//!
//! # fn main() -> Result<(), geohub_core::HubError> {
//! let hub = PagedHub::new(sample_features(10));
//! let query = SearchQuery::new(SpaceId::new("countries"));
//! let ids: Vec<String> = search(&hub, query, 4, Some(7))?
//!     .map(|feature| feature.map(|f| f.id().unwrap_or_default()))
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(ids.len(), 7);
//! assert_eq!(hub.requests().len(), 2);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod error;
mod feature;
mod fetch;
mod iter;
mod page;
pub mod query;
mod retry;
mod transport;

#[doc(hidden)]
pub mod test_support;

pub use error::HubError;
pub use feature::{Feature, TAGS_NAMESPACE};
pub use fetch::{MAX_PAGE_SIZE, PageFetcher};
pub use iter::{DedupById, FeatureIter, search};
pub use page::{ContinuationHandle, Page};
pub use query::{
    Area, BoundingBox, Endpoint, PropertyOp, PropertyPredicate, QueryError, SearchQuery, SpaceId, TagFilter,
    TileKind,
};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_HINT, Interrupted, RetryPolicy, RetryState, Retrying, Sleeper,
};
pub use transport::{CLIENT_ID, ContentType, HubRequest, HubResponse, Method, Transport};

/// Cancellation signal shared between an iterator and its backoff sleeps.
pub use tokio_util::sync::CancellationToken;
