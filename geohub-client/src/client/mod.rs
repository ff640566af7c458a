//! Blocking Hub client.

use std::sync::Arc;

use geohub_core::{
    Area, CLIENT_ID, CancellationToken, Feature, FeatureIter, HubError, HubRequest, HubResponse,
    MAX_PAGE_SIZE, Method, Page, QueryError, RetryPolicy, Retrying, SearchQuery, Sleeper,
    SpaceId, TagFilter, Transport, search,
};
use log::{debug, info};
use serde_json::{Value, json};

use crate::http::HttpTransport;
use crate::runtime::BlockingRuntime;
use crate::{
    ClientBuildError, ClientConfig, Clustering, NewSpace, Space, SpaceOwner, SpaceStatistics,
    SpaceUpdate, TagChanges,
};

/// Transport shared by every request of a client.
pub type SharedTransport = Arc<dyn Transport + Send + Sync>;

/// Sleeper shared by every request of a client.
pub type SharedSleeper = Arc<dyn Sleeper + Send + Sync>;

/// Transport stack used for each call: rate-limit retries over the shared
/// transport.
pub type ClientTransport = Retrying<SharedTransport, SharedSleeper>;

/// Synchronous client for one Hub deployment.
///
/// Each call blocks until the Hub has answered, retrying rate-limited
/// requests according to the configured [`RetryPolicy`]. Searches return
/// lazy iterators that fetch one page at a time.
///
/// [`HubClient::cancel`] aborts backoff waits and pending pages of every
/// call and iterator created from this client.
#[derive(Clone)]
pub struct HubClient {
    transport: SharedTransport,
    sleeper: SharedSleeper,
    retry: RetryPolicy,
    page_size: usize,
    cancel: CancellationToken,
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("retry", &self.retry)
            .field("page_size", &self.page_size)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl HubClient {
    /// Build a client talking HTTP to `config.base_url`.
    ///
    /// # Errors
    ///
    /// Fails when the credentials cannot be resolved, the base URL is
    /// invalid, or the HTTP client or runtime cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ClientBuildError> {
        let token = config.credentials.resolve()?;
        let runtime = Arc::new(BlockingRuntime::new()?);
        let transport = HttpTransport::new(&config, token, Arc::clone(&runtime))?;
        info!("Hub client ready for {}", transport.base_url());
        Ok(Self::with_transport(&config, Arc::new(transport), runtime))
    }

    /// Build a client over an arbitrary transport and sleeper.
    ///
    /// Credentials and base URL in `config` are ignored; the transport is
    /// expected to handle both.
    #[must_use]
    pub fn with_transport(
        config: &ClientConfig,
        transport: SharedTransport,
        sleeper: SharedSleeper,
    ) -> Self {
        Self {
            transport,
            sleeper,
            retry: config.retry,
            page_size: config.page_size,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancel every in-flight wait and iterator of this client.
    ///
    /// Calls made afterwards fail with [`HubError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Default page size used by [`HubClient::search`].
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    fn stack(&self, cancel: CancellationToken) -> ClientTransport {
        Retrying::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.sleeper),
            self.retry,
        )
        .with_cancellation(cancel)
    }

    fn call(&self, request: &HubRequest) -> Result<HubResponse, HubError> {
        debug!("{} {}", request.method.as_str(), request.path());
        self.stack(self.cancel.child_token()).execute(request)
    }

    fn call_json<T: serde::de::DeserializeOwned>(
        &self,
        request: &HubRequest,
    ) -> Result<T, HubError> {
        self.call(request)?.json(&request.path())
    }

    fn call_features(&self, request: &HubRequest) -> Result<Vec<Feature>, HubError> {
        let response = self.call(request)?;
        Ok(Page::from_response(&response, &request.path())?.features)
    }

    /// Metadata of the Hub itself.
    ///
    /// # Errors
    ///
    /// Any [`HubError`] raised by the request.
    pub fn hub_info(&self) -> Result<Value, HubError> {
        self.call_json(&request(Method::Get, vec!["hub".to_owned()]))
    }

    /// Spaces visible to the caller.
    ///
    /// # Errors
    ///
    /// Any [`HubError`] raised by the request.
    pub fn list_spaces(
        &self,
        owner: SpaceOwner,
        include_rights: bool,
    ) -> Result<Vec<Space>, HubError> {
        let mut req = request(Method::Get, vec!["hub".to_owned(), "spaces".to_owned()])
            .with_param("owner", owner.as_str());
        if include_rights {
            req.push_param("includeRights", "true");
        }
        self.call_json(&req)
    }

    /// Metadata of one space.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] for an invalid id, or any error
    /// raised by the request.
    pub fn space(&self, space: &SpaceId) -> Result<Space, HubError> {
        self.call_json(&request(Method::Get, space_segments(space, &[])?))
    }

    /// Create a space.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] for a virtual space without
    /// upstream spaces, or any [`HubError`] raised by the request.
    pub fn create_space(&self, new_space: &NewSpace) -> Result<Space, HubError> {
        new_space.validate()?;
        let req = request(Method::Post, vec!["hub".to_owned(), "spaces".to_owned()])
            .with_json(new_space.to_body());
        self.call_json(&req)
    }

    /// Change attributes of a space.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] when `update` changes nothing.
    pub fn update_space(&self, space: &SpaceId, update: &SpaceUpdate) -> Result<Space, HubError> {
        let body = update.to_body()?;
        let req = request(Method::Patch, space_segments(space, &[])?).with_json(body);
        self.call_json(&req)
    }

    /// Delete a space and all of its features.
    ///
    /// # Errors
    ///
    /// Any [`HubError`] raised by the request.
    pub fn delete_space(&self, space: &SpaceId) -> Result<(), HubError> {
        self.call(&request(Method::Delete, space_segments(space, &[])?))?;
        Ok(())
    }

    /// Feature count, byte size and bounding box of a space.
    ///
    /// # Errors
    ///
    /// Any [`HubError`] raised by the request.
    pub fn statistics(&self, space: &SpaceId) -> Result<SpaceStatistics, HubError> {
        let raw: Value = self.call_json(&request(
            Method::Get,
            space_segments(space, &["statistics"])?,
        ))?;
        Ok(SpaceStatistics::from_value(raw))
    }

    /// Number of features stored in a space.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::MalformedResponse`] if the body has no numeric
    /// `count`.
    pub fn count(&self, space: &SpaceId) -> Result<u64, HubError> {
        let req = request(Method::Get, space_segments(space, &["count"])?);
        let body: Value = self.call_json(&req)?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| HubError::MalformedResponse {
                path: req.path(),
                message: "missing numeric \"count\"".to_owned(),
            })
    }

    /// One feature by id.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Http`] (status 404) when the feature does not
    /// exist.
    pub fn feature(
        &self,
        space: &SpaceId,
        feature_id: &str,
        force_2d: bool,
    ) -> Result<Feature, HubError> {
        let mut req = request(Method::Get, feature_segments(space, feature_id)?);
        if force_2d {
            req.push_param("force2D", "true");
        }
        self.call_json(&req)
    }

    /// Features with the given ids; missing ids are skipped by the Hub.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] when `ids` is empty.
    pub fn features_by_id<S: AsRef<str>>(
        &self,
        space: &SpaceId,
        ids: &[S],
    ) -> Result<Vec<Feature>, HubError> {
        let req = request(Method::Get, space_segments(space, &["features"])?)
            .with_param("id", join_ids(ids)?);
        self.call_features(&req)
    }

    /// Create or replace one feature.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] for an empty id or invalid tags.
    pub fn put_feature(
        &self,
        space: &SpaceId,
        feature_id: &str,
        feature: &Feature,
        tags: &TagChanges,
    ) -> Result<Feature, HubError> {
        let req = feature_write(
            Method::Put,
            feature_segments(space, feature_id)?,
            feature_body(feature)?,
            tags,
        )?;
        self.call_json(&req)
    }

    /// Merge `patch` into one feature.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] for an empty id or invalid tags.
    pub fn patch_feature(
        &self,
        space: &SpaceId,
        feature_id: &str,
        patch: Value,
        tags: &TagChanges,
    ) -> Result<Feature, HubError> {
        let req = feature_write(
            Method::Patch,
            feature_segments(space, feature_id)?,
            patch,
            tags,
        )?;
        self.call_json(&req)
    }

    /// Delete one feature.
    ///
    /// # Errors
    ///
    /// Any [`HubError`] raised by the request.
    pub fn delete_feature(&self, space: &SpaceId, feature_id: &str) -> Result<(), HubError> {
        self.call(&request(Method::Delete, feature_segments(space, feature_id)?))?;
        Ok(())
    }

    /// Create or replace several features in one request.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] for invalid tags.
    pub fn put_features(
        &self,
        space: &SpaceId,
        features: &[Feature],
        tags: &TagChanges,
    ) -> Result<Vec<Feature>, HubError> {
        self.write_features(Method::Put, space, features, tags)
    }

    /// Create or merge several features in one request.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] for invalid tags.
    pub fn post_features(
        &self,
        space: &SpaceId,
        features: &[Feature],
        tags: &TagChanges,
    ) -> Result<Vec<Feature>, HubError> {
        self.write_features(Method::Post, space, features, tags)
    }

    fn write_features(
        &self,
        method: Method,
        space: &SpaceId,
        features: &[Feature],
        tags: &TagChanges,
    ) -> Result<Vec<Feature>, HubError> {
        let body = json!({ "type": "FeatureCollection", "features": features });
        let req = feature_write(method, space_segments(space, &["features"])?, body, tags)?;
        self.call_features(&req)
    }

    /// Delete features by id, by tag, or both.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] when neither ids nor tags are
    /// given.
    pub fn delete_features<S: AsRef<str>>(
        &self,
        space: &SpaceId,
        ids: &[S],
        tags: Option<&TagFilter>,
    ) -> Result<(), HubError> {
        if ids.is_empty() && tags.is_none() {
            return Err(QueryError::EmptyDeleteSelector.into());
        }
        let mut req = request(Method::Delete, space_segments(space, &["features"])?);
        if !ids.is_empty() {
            req.push_param("id", join_ids(ids)?);
        }
        if let Some(tags) = tags {
            tags.validate()?;
            req.push_param("tags", tags.to_string());
        }
        self.call(&req)?;
        Ok(())
    }

    /// Write `features` in chunks of `chunk_size`, one `PUT` per chunk.
    ///
    /// Chunks are sent in order and the first failure stops the upload;
    /// chunks already written stay written. Returns the number of features
    /// sent.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] for a zero chunk size, or the
    /// error of the first failing chunk.
    pub fn upload_features(
        &self,
        space: &SpaceId,
        features: &[Feature],
        chunk_size: usize,
        tags: &TagChanges,
    ) -> Result<usize, HubError> {
        if chunk_size == 0 {
            return Err(QueryError::ZeroChunkSize.into());
        }
        space.validate()?;
        tags.validate()?;
        let mut written = 0;
        for (index, chunk) in features.chunks(chunk_size).enumerate() {
            self.put_features(space, chunk, tags)?;
            written += chunk.len();
            debug!(
                "uploaded chunk {} to {space} ({written}/{} features)",
                index + 1,
                features.len()
            );
        }
        Ok(written)
    }

    /// Iterate every feature matching `query` with the default page size.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] for an invalid query; request
    /// failures surface through the iterator.
    pub fn search(&self, query: SearchQuery) -> Result<FeatureIter<ClientTransport>, HubError> {
        self.search_with(query, self.page_size, None)
    }

    /// Iterate features matching `query`, `page_size` at a time, stopping
    /// after `limit` features if given.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] for an invalid query or page size.
    pub fn search_with(
        &self,
        query: SearchQuery,
        page_size: usize,
        limit: Option<usize>,
    ) -> Result<FeatureIter<ClientTransport>, HubError> {
        let cancel = self.cancel.child_token();
        let iter = search(self.stack(cancel.clone()), query, page_size, limit)?;
        Ok(iter.with_cancellation(cancel))
    }

    /// Cluster the features of a space over its whole bounding box.
    ///
    /// # Errors
    ///
    /// Fails with [`HubError::Validation`] for invalid clustering parameters
    /// or when the space statistics report no bounding box.
    pub fn cluster(&self, space: &SpaceId, clustering: &Clustering) -> Result<Vec<Feature>, HubError> {
        clustering.validate()?;
        let bbox = self
            .statistics(space)?
            .bbox
            .ok_or_else(|| QueryError::MissingBoundingBox {
                space: space.to_string(),
            })?;
        let mut req = SearchQuery::new(space.clone())
            .with_area(Area::BoundingBox(bbox))
            .to_request(MAX_PAGE_SIZE, None);
        req.push_param("clustering", clustering.name());
        req.query.extend(clustering.params());
        self.call_features(&req)
    }
}

fn request(method: Method, segments: Vec<String>) -> HubRequest {
    HubRequest::new(method, segments).with_param("clientId", CLIENT_ID)
}

fn space_segments(space: &SpaceId, rest: &[&str]) -> Result<Vec<String>, QueryError> {
    space.validate()?;
    Ok(space.segments(rest))
}

fn feature_segments(space: &SpaceId, feature_id: &str) -> Result<Vec<String>, QueryError> {
    if feature_id.is_empty() {
        return Err(QueryError::EmptyFeatureId);
    }
    space_segments(space, &["features", feature_id])
}

fn join_ids<S: AsRef<str>>(ids: &[S]) -> Result<String, QueryError> {
    if ids.is_empty() {
        return Err(QueryError::EmptyIdList);
    }
    if ids.iter().any(|id| id.as_ref().is_empty()) {
        return Err(QueryError::EmptyFeatureId);
    }
    Ok(ids.iter().map(AsRef::as_ref).collect::<Vec<&str>>().join(","))
}

fn feature_body(feature: &Feature) -> Result<Value, HubError> {
    serde_json::to_value(feature).map_err(|err| {
        HubError::from(QueryError::InvalidGeometry {
            message: err.to_string(),
        })
    })
}

fn feature_write(
    method: Method,
    segments: Vec<String>,
    body: Value,
    tags: &TagChanges,
) -> Result<HubRequest, QueryError> {
    tags.validate()?;
    let mut req = request(method, segments).with_geojson(body);
    req.query.extend(tags.params());
    Ok(req)
}
