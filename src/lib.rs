//! Facade crate for the geohub feature store client.
//!
//! This crate re-exports the query and paging types from `geohub-core` and,
//! behind the `client` feature, the HTTP client from `geohub-client`.

#![forbid(unsafe_code)]

pub use geohub_core::{
    Area, BoundingBox, CancellationToken, ContentType, ContinuationHandle, DedupById, Endpoint, Feature,
    FeatureIter, HubError, HubRequest, HubResponse, MAX_PAGE_SIZE, Method, Page, PageFetcher,
    PropertyOp, PropertyPredicate, QueryError, RetryPolicy, Retrying, SearchQuery, Sleeper,
    SpaceId, TagFilter, TileKind, Transport, search,
};

#[cfg(feature = "client")]
pub use geohub_client::{
    ClientBuildError, ClientConfig, Clustering, CredentialSource, CredentialsError, CsvColumns,
    HexbinParams, HubClient, NewSpace, QuadbinParams, Space, SpaceOwner, SpaceStatistics,
    SpaceUpdate, TagChanges, VirtualOperation, VirtualSpace, read_csv_features,
    read_geojson_features,
};

#[cfg(feature = "wkt")]
pub use geohub_client::{read_wkt_features, wkt_to_feature};
