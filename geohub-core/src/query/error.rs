//! Validation failures raised before any request is sent.

use thiserror::Error;

/// A caller-supplied parameter violates a constraint.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum QueryError {
    /// The space identifier is empty.
    #[error("space id must not be empty")]
    EmptySpaceId,
    /// The space identifier contains a path separator or whitespace.
    #[error("space id {id:?} contains a reserved character")]
    InvalidSpaceId {
        /// Offending identifier.
        id: String,
    },
    /// A feature identifier is empty.
    #[error("feature id must not be empty")]
    EmptyFeatureId,
    /// A list of feature identifiers is empty.
    #[error("at least one feature id is required")]
    EmptyIdList,
    /// The requested page size is zero or above the server maximum.
    #[error("page size {page_size} is outside 1..={max}")]
    PageSizeOutOfRange {
        /// Requested page size.
        page_size: usize,
        /// Largest page size the server accepts.
        max: usize,
    },
    /// A coordinate is not finite or outside the WGS84 range.
    #[error("{axis} {value} is outside the WGS84 range")]
    InvalidCoordinate {
        /// `longitude` or `latitude`.
        axis: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A GeoJSON geometry could not be interpreted.
    #[error("invalid geometry: {message}")]
    InvalidGeometry {
        /// Decoder message.
        message: String,
    },
    /// A search radius is zero, negative or not finite.
    #[error("radius must be a positive number of metres, got {radius_m}")]
    InvalidRadius {
        /// Offending radius.
        radius_m: f64,
    },
    /// A tile identifier is empty.
    #[error("tile id must not be empty")]
    EmptyTileId,
    /// A tag filter has no tags.
    #[error("tag filter must contain at least one tag")]
    EmptyTagFilter,
    /// A tag is empty or contains a separator.
    #[error("tag {tag:?} must be non-empty and free of ',' and '+'")]
    InvalidTag {
        /// Offending tag.
        tag: String,
    },
    /// A property predicate has an empty path.
    #[error("property path must not be empty")]
    EmptyPropertyPath,
    /// A property predicate has no values to compare against.
    #[error("property predicate on {path} has no values")]
    EmptyPropertyValues {
        /// Property path.
        path: String,
    },
    /// A selection entry is empty.
    #[error("selection entries must not be empty")]
    EmptySelection,
    /// Clipping was requested for an area other than a bounding box or tile.
    #[error("clip is only supported for bounding box and tile queries")]
    ClipUnsupported,
    /// A space update sets no field.
    #[error("space update must change at least one field")]
    EmptySpaceUpdate,
    /// A virtual space without upstream spaces.
    #[error("virtual space must reference at least one upstream space")]
    EmptyVirtualSpace,
    /// An upload chunk size of zero.
    #[error("chunk size must be positive")]
    ZeroChunkSize,
    /// A bulk delete names neither ids nor tags.
    #[error("bulk delete requires feature ids or tags")]
    EmptyDeleteSelector,
    /// A bounding box whose southern edge lies north of its northern edge.
    #[error("bounding box south edge {south} lies north of its north edge {north}")]
    InvertedBoundingBox {
        /// Southern edge.
        south: f64,
        /// Northern edge.
        north: f64,
    },
    /// Statistics for the space report no bounding box to cluster over.
    #[error("space {space} has no bounding box to cluster over")]
    MissingBoundingBox {
        /// Space identifier.
        space: String,
    },
    /// A clustering parameter is out of range.
    #[error("clustering parameter {name} is invalid: {message}")]
    InvalidClustering {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with it.
        message: String,
    },
}
