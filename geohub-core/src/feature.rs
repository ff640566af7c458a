//! GeoJSON features as returned by the Hub.

use geojson::feature::Id;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property namespace under which the Hub stores tags and bookkeeping.
pub const TAGS_NAMESPACE: &str = "@ns:com:here:xyz";

/// A GeoJSON feature stored in a space.
///
/// The wrapper keeps the server representation intact, including foreign
/// members and the Hub namespace, so a feature read from one space can be
/// written to another unchanged.
///
/// # Examples
///
/// ```
/// use geohub_core::Feature;
/// use serde_json::json;
///
/// let feature: Feature = serde_json::from_value(json!({
///     "type": "Feature",
///     "id": "DEU",
///     "geometry": { "type": "Point", "coordinates": [13.4, 52.5] },
///     "properties": {
///         "name": "Germany",
///         "@ns:com:here:xyz": { "tags": ["europe", "eu"] }
///     }
/// }))
/// .expect("valid feature");
/// assert_eq!(feature.id().as_deref(), Some("DEU"));
/// assert_eq!(feature.tags(), vec!["europe", "eu"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feature(geojson::Feature);

impl Feature {
    /// Wrap an existing GeoJSON feature.
    #[must_use]
    pub const fn new(inner: geojson::Feature) -> Self {
        Self(inner)
    }

    /// Build a feature from a geometry, an identifier and properties.
    #[must_use]
    pub fn from_parts(
        id: Option<String>,
        geometry: Option<geojson::Geometry>,
        properties: Map<String, Value>,
    ) -> Self {
        Self(geojson::Feature {
            bbox: None,
            geometry,
            id: id.map(Id::String),
            properties: Some(properties),
            foreign_members: None,
        })
    }

    /// Identifier of the feature; numeric identifiers are rendered as text.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        match self.0.id.as_ref()? {
            Id::String(value) => Some(value.clone()),
            Id::Number(value) => Some(value.to_string()),
        }
    }

    /// Geometry of the feature, if any.
    #[must_use]
    pub const fn geometry(&self) -> Option<&geojson::Geometry> {
        self.0.geometry.as_ref()
    }

    /// Look up a single property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.0.properties.as_ref()?.get(key)
    }

    /// Property mapping, if present.
    #[must_use]
    pub const fn properties(&self) -> Option<&Map<String, Value>> {
        self.0.properties.as_ref()
    }

    /// Tags attached by the Hub, in server order.
    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        self.property(TAGS_NAMESPACE)
            .and_then(|ns| ns.get("tags"))
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Convert the geometry into a [`geo::Geometry`].
    ///
    /// Returns `None` for features without geometry.
    pub fn to_geo(&self) -> Option<Result<geo::Geometry<f64>, geojson::Error>> {
        self.0.geometry.clone().map(geo::Geometry::try_from)
    }

    /// Borrow the underlying GeoJSON feature.
    #[must_use]
    pub const fn as_geojson(&self) -> &geojson::Feature {
        &self.0
    }

    /// Unwrap into the underlying GeoJSON feature.
    #[must_use]
    pub fn into_inner(self) -> geojson::Feature {
        self.0
    }
}

impl From<geojson::Feature> for Feature {
    fn from(value: geojson::Feature) -> Self {
        Self(value)
    }
}

impl From<Feature> for geojson::Feature {
    fn from(value: Feature) -> Self {
        value.0
    }
}
