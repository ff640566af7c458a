//! HTTP client for the geohub feature store.
//!
//! [`HubClient`] wraps the paging and retry machinery of [`geohub_core`]
//! around a `reqwest` transport. Calls are blocking: an internal Tokio
//! runtime drives each request, or the caller's multi-threaded runtime when
//! there is one.
//!
//! ```no_run
//! use geohub_client::{ClientConfig, HubClient};
//! use geohub_core::{SearchQuery, SpaceId, TagFilter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HubClient::new(ClientConfig::default())?;
//! let query = SearchQuery::new("countries".parse::<SpaceId>()?)
//!     .with_tags(TagFilter::any(["europe"]));
//! for feature in client.search(query)? {
//!     println!("{:?}", feature?.id());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
mod config;
mod convert;
mod credentials;
mod error;
mod http;
mod model;
mod runtime;

pub use client::{ClientTransport, HubClient, SharedSleeper, SharedTransport};
pub use config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, DEFAULT_USER_AGENT};
pub use convert::{CsvColumns, read_csv_features, read_geojson_features};
#[cfg(feature = "wkt")]
#[cfg_attr(docsrs, doc(cfg(feature = "wkt")))]
pub use convert::{read_wkt_features, wkt_to_feature};
pub use credentials::{BearerToken, CredentialSource, DEFAULT_TOKEN_ENV};
pub use error::{ClientBuildError, ConvertError, CredentialsError};
pub use http::HttpTransport;
pub use model::{
    Clustering, HexbinParams, NewSpace, QuadbinParams, Space, SpaceOwner, SpaceStatistics,
    SpaceUpdate, TagChanges, VirtualOperation, VirtualSpace,
};
pub use runtime::BlockingRuntime;
