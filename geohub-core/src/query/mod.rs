//! Feature queries and their translation into Hub requests.
//!
//! A [`SearchQuery`] is validated once, before the first page is requested,
//! and then rendered into a [`HubRequest`] per page. The only thing that
//! changes from page to page is the continuation handle.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::{CLIENT_ID, ContinuationHandle, HubRequest, Method};

mod area;
mod error;
mod filter;

pub use area::{Area, BoundingBox, TileKind};
pub use error::QueryError;
pub use filter::{PropertyOp, PropertyPredicate, TagFilter};

/// Identifier of a space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpaceId(String);

impl SpaceId {
    /// Wrap an identifier; call [`SpaceId::validate`] or use [`str::parse`]
    /// to check it.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the identifier can be used as a single path segment.
    ///
    /// # Errors
    ///
    /// Fails when empty or when it contains `/`, `?`, `#` or whitespace.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.0.is_empty() {
            return Err(QueryError::EmptySpaceId);
        }
        if self
            .0
            .chars()
            .any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace())
        {
            return Err(QueryError::InvalidSpaceId { id: self.0.clone() });
        }
        Ok(())
    }

    /// Request path segments for a sub-resource of this space.
    #[must_use]
    pub fn segments(&self, rest: &[&str]) -> Vec<String> {
        let mut segments = vec!["hub".to_owned(), "spaces".to_owned(), self.0.clone()];
        segments.extend(rest.iter().map(|segment| (*segment).to_owned()));
        segments
    }
}

impl FromStr for SpaceId {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Self::new(s);
        id.validate()?;
        Ok(id)
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hub endpoint a query is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /iterate`: every feature of the space.
    Iterate,
    /// `GET /search`: tag and property filters only.
    Search,
    /// `GET /bbox`.
    BoundingBox,
    /// `GET /tile/{kind}/{id}`.
    Tile,
    /// `GET /spatial`: point or referenced feature.
    Spatial,
    /// `POST /spatial`: geometry in the request body.
    SpatialGeometry,
}

/// Enumerated options of a paginated feature query.
///
/// ```
/// use geohub_core::{Endpoint, SearchQuery, SpaceId, TagFilter};
///
/// let query = SearchQuery::new(SpaceId::new("countries"))
///     .with_tags(TagFilter::any(["europe"]))
///     .with_force_2d(true);
/// assert_eq!(query.endpoint(), Endpoint::Search);
/// let request = query.to_request(100, None);
/// assert_eq!(request.path(), "/hub/spaces/countries/search");
/// assert_eq!(request.query_value("tags"), Some("europe"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Space to read from.
    pub space: SpaceId,
    /// Spatial restriction.
    pub area: Option<Area>,
    /// Tag filter.
    pub tags: Option<TagFilter>,
    /// Property predicates; all must hold.
    pub properties: Vec<PropertyPredicate>,
    /// Property paths to return, e.g. `p.name`. Empty returns everything.
    pub selection: Vec<String>,
    /// Clip geometries to the area.
    pub clip: bool,
    /// Bypass the server cache.
    pub skip_cache: bool,
    /// Drop the third coordinate.
    pub force_2d: bool,
}

impl SearchQuery {
    /// Query every feature of `space`.
    #[must_use]
    pub const fn new(space: SpaceId) -> Self {
        Self {
            space,
            area: None,
            tags: None,
            properties: Vec::new(),
            selection: Vec::new(),
            clip: false,
            skip_cache: false,
            force_2d: false,
        }
    }

    /// Restrict to an area.
    #[must_use]
    pub fn with_area(mut self, area: Area) -> Self {
        self.area = Some(area);
        self
    }

    /// Restrict to a tag filter.
    #[must_use]
    pub fn with_tags(mut self, tags: TagFilter) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Add a property predicate.
    #[must_use]
    pub fn with_property(mut self, predicate: PropertyPredicate) -> Self {
        self.properties.push(predicate);
        self
    }

    /// Return only the given property paths.
    #[must_use]
    pub fn with_selection<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Clip geometries to the area.
    #[must_use]
    pub const fn with_clip(mut self, clip: bool) -> Self {
        self.clip = clip;
        self
    }

    /// Bypass the server cache.
    #[must_use]
    pub const fn with_skip_cache(mut self, skip_cache: bool) -> Self {
        self.skip_cache = skip_cache;
        self
    }

    /// Drop the third coordinate.
    #[must_use]
    pub const fn with_force_2d(mut self, force_2d: bool) -> Self {
        self.force_2d = force_2d;
        self
    }

    /// Check every option.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), QueryError> {
        self.space.validate()?;
        if let Some(area) = &self.area {
            area.validate()?;
        }
        if self.clip && !self.area.as_ref().is_some_and(Area::supports_clip) {
            return Err(QueryError::ClipUnsupported);
        }
        if let Some(tags) = &self.tags {
            tags.validate()?;
        }
        for predicate in &self.properties {
            predicate.validate()?;
        }
        if self.selection.iter().any(|path| path.trim().is_empty()) {
            return Err(QueryError::EmptySelection);
        }
        Ok(())
    }

    /// Endpoint serving this query.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        match &self.area {
            Some(Area::BoundingBox(_)) => Endpoint::BoundingBox,
            Some(Area::Tile { .. }) => Endpoint::Tile,
            Some(Area::Radius { .. } | Area::Feature { .. }) => Endpoint::Spatial,
            Some(Area::Geometry { .. }) => Endpoint::SpatialGeometry,
            None if self.tags.is_some() || !self.properties.is_empty() => Endpoint::Search,
            None => Endpoint::Iterate,
        }
    }

    /// Render the request for one page.
    ///
    /// The query is assumed valid; [`PageFetcher`](crate::PageFetcher)
    /// validates it on construction.
    #[must_use]
    pub fn to_request(&self, page_size: usize, handle: Option<&ContinuationHandle>) -> HubRequest {
        let mut request = match &self.area {
            None if self.endpoint() == Endpoint::Search => {
                HubRequest::get(self.space.segments(&["search"]))
            }
            None => HubRequest::get(self.space.segments(&["iterate"])),
            Some(Area::BoundingBox(bbox)) => {
                HubRequest::get(self.space.segments(&["bbox"]))
                    .with_param("west", bbox.west.to_string())
                    .with_param("south", bbox.south.to_string())
                    .with_param("east", bbox.east.to_string())
                    .with_param("north", bbox.north.to_string())
            }
            Some(Area::Tile { kind, id, margin }) => {
                let mut request =
                    HubRequest::get(self.space.segments(&["tile", kind.as_str(), id.as_str()]));
                if let Some(margin) = margin {
                    request.push_param("margin", margin.to_string());
                }
                request
            }
            Some(Area::Radius { center, radius_m }) => {
                HubRequest::get(self.space.segments(&["spatial"]))
                    .with_param("lat", center.y.to_string())
                    .with_param("lon", center.x.to_string())
                    .with_param("radius", radius_m.to_string())
            }
            Some(Area::Feature {
                space,
                feature_id,
                radius_m,
            }) => {
                let mut request = HubRequest::get(self.space.segments(&["spatial"]))
                    .with_param("refSpaceId", space.as_str())
                    .with_param("refFeatureId", feature_id.as_str());
                if let Some(radius_m) = radius_m {
                    request.push_param("radius", radius_m.to_string());
                }
                request
            }
            Some(Area::Geometry { geometry, radius_m }) => {
                let body = serde_json::to_value(geometry).unwrap_or(Value::Null);
                let mut request = HubRequest::new(Method::Post, self.space.segments(&["spatial"]))
                    .with_geojson(body);
                if let Some(radius_m) = radius_m {
                    request.push_param("radius", radius_m.to_string());
                }
                request
            }
        };

        request.push_param("clientId", CLIENT_ID);
        request.push_param("limit", page_size.to_string());
        if let Some(handle) = handle {
            request.push_param("handle", handle.as_str());
        }
        if let Some(tags) = &self.tags {
            request.push_param("tags", tags.to_string());
        }
        for predicate in &self.properties {
            let (key, value) = predicate.to_param();
            request.push_param(key, value);
        }
        if !self.selection.is_empty() {
            request.push_param("selection", self.selection.join(","));
        }
        if self.clip {
            request.push_param("clip", "true");
        }
        if self.skip_cache {
            request.push_param("skipCache", "true");
        }
        if self.force_2d {
            request.push_param("force2D", "true");
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;
    use rstest::{fixture, rstest};

    #[fixture]
    fn space() -> SpaceId {
        SpaceId::new("s1")
    }

    #[rstest]
    #[case("", QueryError::EmptySpaceId)]
    #[case("a/b", QueryError::InvalidSpaceId { id: "a/b".to_owned() })]
    #[case("a b", QueryError::InvalidSpaceId { id: "a b".to_owned() })]
    #[case("a?b", QueryError::InvalidSpaceId { id: "a?b".to_owned() })]
    fn space_ids_are_checked(#[case] id: &str, #[case] expected: QueryError) {
        assert_eq!(id.parse::<SpaceId>(), Err(expected));
    }

    #[rstest]
    fn bare_query_iterates(space: SpaceId) {
        let query = SearchQuery::new(space);
        assert_eq!(query.endpoint(), Endpoint::Iterate);
        let request = query.to_request(50, None);
        assert_eq!(request.path(), "/hub/spaces/s1/iterate");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.query_value("clientId"), Some(CLIENT_ID));
        assert_eq!(request.query_value("limit"), Some("50"));
        assert_eq!(request.query_value("handle"), None);
    }

    #[rstest]
    fn handle_is_sent_verbatim(space: SpaceId) {
        let handle = ContinuationHandle::new("eyJvZmZzZXQiOjEwfQ==");
        let request = SearchQuery::new(space).to_request(10, Some(&handle));
        assert_eq!(request.query_value("handle"), Some("eyJvZmZzZXQiOjEwfQ=="));
    }

    #[rstest]
    fn predicates_route_to_search(space: SpaceId) {
        let query = SearchQuery::new(space)
            .with_property(PropertyPredicate::new("pop", PropertyOp::Gt, ["10"]))
            .with_selection(["p.name"]);
        assert_eq!(query.endpoint(), Endpoint::Search);
        let request = query.to_request(10, None);
        assert_eq!(request.path(), "/hub/spaces/s1/search");
        assert_eq!(request.query_value("p.pop"), Some("gt=10"));
        assert_eq!(request.query_value("selection"), Some("p.name"));
    }

    #[rstest]
    fn bounding_box_renders_edges(space: SpaceId) {
        let query = SearchQuery::new(space)
            .with_area(Area::BoundingBox(BoundingBox::new(-1.5, 50.0, 2.0, 51.25)))
            .with_clip(true);
        assert_eq!(query.validate(), Ok(()));
        let request = query.to_request(100, None);
        assert_eq!(request.path(), "/hub/spaces/s1/bbox");
        assert_eq!(request.query_value("west"), Some("-1.5"));
        assert_eq!(request.query_value("south"), Some("50"));
        assert_eq!(request.query_value("east"), Some("2"));
        assert_eq!(request.query_value("north"), Some("51.25"));
        assert_eq!(request.query_value("clip"), Some("true"));
    }

    #[rstest]
    fn antimeridian_box_is_sent_verbatim(space: SpaceId) {
        let query = SearchQuery::new(space)
            .with_area(Area::BoundingBox(BoundingBox::new(170.0, -10.0, -170.0, 10.0)));
        assert_eq!(query.validate(), Ok(()));
        let request = query.to_request(100, None);
        assert_eq!(request.query_value("west"), Some("170"));
        assert_eq!(request.query_value("east"), Some("-170"));
        assert_eq!(request.query_value("south"), Some("-10"));
        assert_eq!(request.query_value("north"), Some("10"));
    }

    #[rstest]
    fn inverted_box_fails_validation(space: SpaceId) {
        let query = SearchQuery::new(space)
            .with_area(Area::BoundingBox(BoundingBox::new(0.0, 20.0, 1.0, 10.0)));
        assert_eq!(
            query.validate(),
            Err(QueryError::InvertedBoundingBox {
                south: 20.0,
                north: 10.0
            })
        );
    }

    #[rstest]
    fn tile_renders_kind_and_margin(space: SpaceId) {
        let query = SearchQuery::new(space).with_area(Area::Tile {
            kind: TileKind::Web,
            id: "10_100_200".to_owned(),
            margin: Some(8),
        });
        let request = query.to_request(100, None);
        assert_eq!(request.path(), "/hub/spaces/s1/tile/web/10_100_200");
        assert_eq!(request.query_value("margin"), Some("8"));
    }

    #[rstest]
    fn radius_uses_spatial_get(space: SpaceId) {
        let query = SearchQuery::new(space).with_area(Area::Radius {
            center: Coord { x: 13.4, y: 52.5 },
            radius_m: 500.0,
        });
        let request = query.to_request(100, None);
        assert_eq!(query.endpoint(), Endpoint::Spatial);
        assert_eq!(request.path(), "/hub/spaces/s1/spatial");
        assert_eq!(request.query_value("lat"), Some("52.5"));
        assert_eq!(request.query_value("lon"), Some("13.4"));
        assert_eq!(request.query_value("radius"), Some("500"));
    }

    #[rstest]
    fn geometry_uses_spatial_post(space: SpaceId) {
        let geometry = geojson::Geometry::new(geojson::Value::Point(vec![1.0, 2.0]));
        let query = SearchQuery::new(space).with_area(Area::Geometry {
            geometry,
            radius_m: Some(25.0),
        });
        let request = query.to_request(100, None);
        assert_eq!(query.endpoint(), Endpoint::SpatialGeometry);
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.content_type, crate::ContentType::GeoJson);
        assert_eq!(
            request.body.as_ref().and_then(|b| b.get("type")),
            Some(&Value::from("Point"))
        );
        assert_eq!(request.query_value("radius"), Some("25"));
    }

    #[rstest]
    fn clip_requires_box_or_tile(space: SpaceId) {
        let query = SearchQuery::new(space.clone()).with_clip(true);
        assert_eq!(query.validate(), Err(QueryError::ClipUnsupported));

        let radius_query = SearchQuery::new(space)
            .with_area(Area::Radius {
                center: Coord { x: 0.0, y: 0.0 },
                radius_m: 1.0,
            })
            .with_clip(true);
        assert_eq!(radius_query.validate(), Err(QueryError::ClipUnsupported));
    }

    #[rstest]
    fn flags_are_rendered(space: SpaceId) {
        let request = SearchQuery::new(space)
            .with_tags(TagFilter::all(["a", "b"]).or_all(["c"]))
            .with_skip_cache(true)
            .with_force_2d(true)
            .to_request(1, None);
        assert_eq!(request.query_value("tags"), Some("a+b,c"));
        assert_eq!(request.query_value("skipCache"), Some("true"));
        assert_eq!(request.query_value("force2D"), Some("true"));
    }

    #[rstest]
    fn empty_selection_entries_are_rejected(space: SpaceId) {
        let query = SearchQuery::new(space).with_selection(["p.name", " "]);
        assert_eq!(query.validate(), Err(QueryError::EmptySelection));
    }
}
