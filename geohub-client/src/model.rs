//! Space metadata, statistics and clustering options.

use geohub_core::{BoundingBox, QueryError, SpaceId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A space as returned by the Hub.
///
/// Fields the client does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    /// Space identifier.
    pub id: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owner identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Whether the space is readable by other accounts.
    #[serde(default)]
    pub shared: bool,
    /// Remaining attributes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which spaces [`HubClient::list_spaces`](crate::HubClient::list_spaces)
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpaceOwner {
    /// Spaces owned by the caller.
    #[default]
    Me,
    /// Spaces shared by other accounts.
    Others,
    /// Both.
    All,
}

impl SpaceOwner {
    /// Value of the `owner` query parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Me => "me",
            Self::Others => "others",
            Self::All => "*",
        }
    }
}

/// How a virtual space combines the features of its upstream spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualOperation {
    /// Features of every upstream space side by side.
    Group,
    /// Features with the same id merged into one.
    Merge,
    /// Later upstream spaces replace features of earlier ones.
    Override,
}

impl VirtualOperation {
    /// Key of the operation in the storage parameters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Merge => "merge",
            Self::Override => "override",
        }
    }
}

/// Storage of a virtual space: a view over existing spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualSpace {
    /// Combination applied to the upstream spaces.
    pub operation: VirtualOperation,
    /// Upstream spaces, in order.
    pub upstream: Vec<SpaceId>,
}

impl VirtualSpace {
    fn to_storage(&self) -> Value {
        let upstream: Vec<&str> = self.upstream.iter().map(SpaceId::as_str).collect();
        json!({
            "id": "virtualspace",
            "params": { self.operation.as_str(): upstream },
        })
    }
}

/// Attributes of a space to create.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewSpace {
    /// Title, required by the Hub.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Requested identifier; the Hub assigns one when absent.
    pub id: Option<String>,
    /// Share the space with other accounts.
    pub shared: bool,
    /// JSON schema enforced through the `schema-validator` processor.
    pub schema: Option<Value>,
    /// Upstream spaces when the new space is virtual.
    pub storage: Option<VirtualSpace>,
}

impl NewSpace {
    /// Space with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Virtual space presenting `upstream` combined through `operation`.
    ///
    /// Queries against the new space read the upstream spaces; it stores no
    /// features of its own.
    #[must_use]
    pub fn virtual_space<I>(title: impl Into<String>, operation: VirtualOperation, upstream: I) -> Self
    where
        I: IntoIterator<Item = SpaceId>,
    {
        Self {
            storage: Some(VirtualSpace {
                operation,
                upstream: upstream.into_iter().collect(),
            }),
            ..Self::new(title)
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Request a specific identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the shared flag.
    #[must_use]
    pub const fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Validate features against `schema`.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Check the space can be created.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptyVirtualSpace`] for a virtual space without
    /// upstream spaces.
    pub fn validate(&self) -> Result<(), QueryError> {
        match &self.storage {
            Some(storage) if storage.upstream.is_empty() => Err(QueryError::EmptyVirtualSpace),
            _ => Ok(()),
        }
    }

    /// Request body for `POST /hub/spaces`.
    #[must_use]
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("title".to_owned(), Value::from(self.title.as_str()));
        if let Some(description) = &self.description {
            body.insert("description".to_owned(), Value::from(description.as_str()));
        }
        if let Some(id) = &self.id {
            body.insert("id".to_owned(), Value::from(id.as_str()));
        }
        if self.shared {
            body.insert("shared".to_owned(), Value::Bool(true));
        }
        if let Some(schema) = &self.schema {
            body.insert("processors".to_owned(), schema_processor(schema));
        }
        if let Some(storage) = &self.storage {
            body.insert("storage".to_owned(), storage.to_storage());
        }
        Value::Object(body)
    }
}

fn schema_processor(schema: &Value) -> Value {
    json!({
        "schema-validator": [{
            "eventTypes": ["ModifyFeaturesEvent.request"],
            "params": { "schema": schema.to_string() },
            "order": 0
        }]
    })
}

/// Changes applied by `PATCH /hub/spaces/{id}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpaceUpdate {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New shared flag.
    pub shared: Option<bool>,
    /// Replacement schema for the `schema-validator` processor.
    pub schema: Option<Value>,
    /// Tagging rules for the `rule-tagger` processor, as `(tag, rule)` pairs.
    pub tagging_rules: Vec<(String, String)>,
}

impl SpaceUpdate {
    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the shared flag.
    #[must_use]
    pub const fn with_shared(mut self, shared: bool) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Replace the schema.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Tag features matching `rule` with `tag`.
    #[must_use]
    pub fn with_tagging_rule(mut self, tag: impl Into<String>, rule: impl Into<String>) -> Self {
        self.tagging_rules.push((tag.into(), rule.into()));
        self
    }

    /// Whether no attribute would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.shared.is_none()
            && self.schema.is_none()
            && self.tagging_rules.is_empty()
    }

    /// Request body for the patch.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptySpaceUpdate`] when nothing is set.
    pub fn to_body(&self) -> Result<Value, QueryError> {
        if self.is_empty() {
            return Err(QueryError::EmptySpaceUpdate);
        }
        let mut body = Map::new();
        if let Some(title) = &self.title {
            body.insert("title".to_owned(), Value::from(title.as_str()));
        }
        if let Some(description) = &self.description {
            body.insert("description".to_owned(), Value::from(description.as_str()));
        }
        if let Some(shared) = self.shared {
            body.insert("shared".to_owned(), Value::Bool(shared));
        }
        let mut processors = Map::new();
        if let Some(schema) = &self.schema {
            if let Value::Object(entry) = schema_processor(schema) {
                processors.extend(entry);
            }
        }
        if !self.tagging_rules.is_empty() {
            let rules: Map<String, Value> = self
                .tagging_rules
                .iter()
                .map(|(tag, rule)| (tag.clone(), Value::from(rule.as_str())))
                .collect();
            processors.insert(
                "rule-tagger".to_owned(),
                json!([{
                    "eventTypes": ["ModifyFeaturesEvent.request"],
                    "params": { "taggingRules": rules },
                    "order": 0
                }]),
            );
        }
        if !processors.is_empty() {
            body.insert("processors".to_owned(), Value::Object(processors));
        }
        Ok(Value::Object(body))
    }
}

/// Tags added to or removed from features on write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagChanges {
    /// Sent as `addTags`.
    pub add: Vec<String>,
    /// Sent as `removeTags`.
    pub remove: Vec<String>,
}

impl TagChanges {
    /// Add `tags` to every written feature.
    pub fn adding<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            add: tags.into_iter().map(Into::into).collect(),
            remove: Vec::new(),
        }
    }

    /// Also remove `tags` from every written feature.
    #[must_use]
    pub fn removing<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Reject empty tags and tags containing `,` or `+`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidTag`] for the first offending tag.
    pub fn validate(&self) -> Result<(), QueryError> {
        self.add
            .iter()
            .chain(&self.remove)
            .find(|tag| tag.is_empty() || tag.contains([',', '+']))
            .map_or(Ok(()), |tag| Err(QueryError::InvalidTag { tag: tag.clone() }))
    }

    /// `addTags` and `removeTags` parameters, omitting empty lists.
    #[must_use]
    pub fn params(&self) -> Vec<(String, String)> {
        [("addTags", &self.add), ("removeTags", &self.remove)]
            .into_iter()
            .filter(|(_, tags)| !tags.is_empty())
            .map(|(key, tags)| (key.to_owned(), tags.join(",")))
            .collect()
    }
}

/// Summary returned by `GET /hub/spaces/{id}/statistics`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpaceStatistics {
    /// Number of features, possibly estimated.
    pub count: u64,
    /// Storage used by the space, in bytes.
    pub byte_size: u64,
    /// Bounding box of all geometries; absent for an empty space.
    pub bbox: Option<BoundingBox>,
    /// Raw statistics document.
    pub raw: Value,
}

impl SpaceStatistics {
    /// Read the subset of fields the client uses from a statistics document.
    #[must_use]
    pub fn from_value(raw: Value) -> Self {
        let count = raw
            .pointer("/count/value")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        let byte_size = raw
            .pointer("/byteSize/value")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        let bbox = raw
            .pointer("/bbox/value")
            .and_then(Value::as_array)
            .and_then(|values| {
                let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
                match numbers.as_slice() {
                    [west, south, east, north] => {
                        Some(BoundingBox::new(*west, *south, *east, *north))
                    }
                    _ => None,
                }
            });
        Self {
            count,
            byte_size,
            bbox,
            raw,
        }
    }
}

/// Server-side clustering of a space's features.
#[derive(Debug, Clone, PartialEq)]
pub enum Clustering {
    /// Hexagonal bins.
    Hexbin(HexbinParams),
    /// Quadtree bins.
    Quadbin(QuadbinParams),
}

/// Parameters of hexbin clustering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HexbinParams {
    /// Fixed H3-like resolution, `0..=13`.
    pub absolute_resolution: Option<u8>,
    /// Resolution relative to the zoom level, `-2..=2`.
    pub relative_resolution: Option<i8>,
    /// Property aggregated per bin.
    pub property: Option<String>,
    /// Return bin centroids instead of hexagons.
    pub point_mode: bool,
}

/// Parameters of quadbin clustering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuadbinParams {
    /// Resolution relative to the zoom level, `0..=4`.
    pub relative_resolution: Option<u8>,
    /// Counting strategy: `real`, `estimated` or `mixed`.
    pub count_mode: Option<String>,
    /// Do not buffer bins at tile borders.
    pub no_buffer: bool,
}

const COUNT_MODES: [&str; 3] = ["real", "estimated", "mixed"];

impl Clustering {
    /// Value of the `clustering` query parameter.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hexbin(_) => "hexbin",
            Self::Quadbin(_) => "quadbin",
        }
    }

    /// Reject parameters outside the ranges the Hub accepts.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidClustering`] naming the offending field.
    pub fn validate(&self) -> Result<(), QueryError> {
        let invalid = |name: &'static str, message: String| {
            Err(QueryError::InvalidClustering { name, message })
        };
        match self {
            Self::Hexbin(params) => {
                if let Some(res) = params.absolute_resolution.filter(|res| *res > 13) {
                    return invalid("absoluteResolution", format!("{res} is not in 0..=13"));
                }
                if let Some(res) = params
                    .relative_resolution
                    .filter(|res| !(-2..=2).contains(res))
                {
                    return invalid("relativeResolution", format!("{res} is not in -2..=2"));
                }
                if params.property.as_deref().is_some_and(str::is_empty) {
                    return invalid("property", "must not be empty".to_owned());
                }
            }
            Self::Quadbin(params) => {
                if let Some(res) = params.relative_resolution.filter(|res| *res > 4) {
                    return invalid("relativeResolution", format!("{res} is not in 0..=4"));
                }
                if let Some(mode) = params
                    .count_mode
                    .as_deref()
                    .filter(|mode| !COUNT_MODES.contains(mode))
                {
                    return invalid(
                        "countmode",
                        format!("{mode:?} is not one of {}", COUNT_MODES.join(", ")),
                    );
                }
            }
        }
        Ok(())
    }

    /// `clustering.*` query parameters.
    #[must_use]
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        let mut push = |key: &str, value: String| {
            params.push((format!("clustering.{key}"), value));
        };
        match self {
            Self::Hexbin(hexbin) => {
                if let Some(res) = hexbin.absolute_resolution {
                    push("absoluteResolution", res.to_string());
                }
                if let Some(res) = hexbin.relative_resolution {
                    push("relativeResolution", res.to_string());
                }
                if let Some(property) = &hexbin.property {
                    push("property", property.clone());
                }
                if hexbin.point_mode {
                    push("pointmode", "true".to_owned());
                }
            }
            Self::Quadbin(quadbin) => {
                if let Some(res) = quadbin.relative_resolution {
                    push("relativeResolution", res.to_string());
                }
                if let Some(mode) = &quadbin.count_mode {
                    push("countmode", mode.clone());
                }
                if quadbin.no_buffer {
                    push("noBuffer", "true".to_owned());
                }
            }
        }
        params
    }
}
