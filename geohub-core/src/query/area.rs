//! Spatial restrictions of a query.

use geo::{Coord, CoordsIter, Rect};

use super::{QueryError, SpaceId};

/// Tiling scheme of a tile query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    /// Bing-style quadkeys.
    Quadkey,
    /// Web Mercator `level_x_y`.
    Web,
    /// TMS `level_x_y` with the origin at the bottom left.
    Tms,
    /// HERE tile ids.
    Here,
}

impl TileKind {
    /// Path segment naming the scheme.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quadkey => "quadkeys",
            Self::Web => "web",
            Self::Tms => "tms",
            Self::Here => "here",
        }
    }
}

/// Box given by its four edges in WGS84 degrees.
///
/// Edges are kept in the order the caller gave them and sent unchanged. A
/// `west` edge greater than `east` selects a box crossing the antimeridian;
/// `south` must not exceed `north`.
///
/// ```
/// use geohub_core::BoundingBox;
///
/// let pacific = BoundingBox::new(170.0, -10.0, -170.0, 10.0);
/// assert!(pacific.crosses_antimeridian());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Western edge (longitude).
    pub west: f64,
    /// Southern edge (latitude).
    pub south: f64,
    /// Eastern edge (longitude).
    pub east: f64,
    /// Northern edge (latitude).
    pub north: f64,
}

impl BoundingBox {
    /// Box with the given edges.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Whether the box wraps around the 180th meridian.
    #[must_use]
    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// Check that every edge is a finite WGS84 value and that the box is not
    /// upside down.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidCoordinate`] for an edge out of range
    /// and [`QueryError::InvertedBoundingBox`] when `south > north`.
    pub fn validate(&self) -> Result<(), QueryError> {
        check_coord(Coord {
            x: self.west,
            y: self.south,
        })?;
        check_coord(Coord {
            x: self.east,
            y: self.north,
        })?;
        if self.south > self.north {
            return Err(QueryError::InvertedBoundingBox {
                south: self.south,
                north: self.north,
            });
        }
        Ok(())
    }
}

/// A `geo` rectangle has ordered corners, so it never crosses the
/// antimeridian.
impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// Area a query is restricted to.
#[derive(Debug, Clone, PartialEq)]
pub enum Area {
    /// Box in WGS84 degrees, possibly crossing the antimeridian.
    BoundingBox(BoundingBox),
    /// A single map tile, optionally grown by a margin in pixels.
    Tile {
        /// Tiling scheme.
        kind: TileKind,
        /// Tile identifier in that scheme.
        id: String,
        /// Margin in pixels.
        margin: Option<u32>,
    },
    /// Circle around a point.
    Radius {
        /// Centre in WGS84 degrees.
        center: Coord<f64>,
        /// Radius in metres.
        radius_m: f64,
    },
    /// Geometry of a feature stored in some space, optionally buffered.
    Feature {
        /// Space holding the reference feature.
        space: SpaceId,
        /// Identifier of the reference feature.
        feature_id: String,
        /// Buffer in metres.
        radius_m: Option<f64>,
    },
    /// Arbitrary GeoJSON geometry, optionally buffered.
    Geometry {
        /// Geometry to intersect with.
        geometry: geojson::Geometry,
        /// Buffer in metres.
        radius_m: Option<f64>,
    },
}

impl Area {
    /// Whether clipping results to the area is supported.
    #[must_use]
    pub const fn supports_clip(&self) -> bool {
        matches!(self, Self::BoundingBox(_) | Self::Tile { .. })
    }

    pub(crate) fn validate(&self) -> Result<(), QueryError> {
        match self {
            Self::BoundingBox(bbox) => bbox.validate(),
            Self::Tile { id, .. } if id.trim().is_empty() => Err(QueryError::EmptyTileId),
            Self::Tile { .. } => Ok(()),
            Self::Radius { center, radius_m } => {
                check_coord(*center)?;
                check_radius(*radius_m)
            }
            Self::Feature {
                space,
                feature_id,
                radius_m,
            } => {
                space.validate()?;
                if feature_id.is_empty() {
                    return Err(QueryError::EmptyFeatureId);
                }
                radius_m.map_or(Ok(()), check_radius)
            }
            Self::Geometry { geometry, radius_m } => {
                let converted = geo::Geometry::<f64>::try_from(geometry.clone()).map_err(|err| {
                    QueryError::InvalidGeometry {
                        message: err.to_string(),
                    }
                })?;
                converted.coords_iter().try_for_each(check_coord)?;
                radius_m.map_or(Ok(()), check_radius)
            }
        }
    }
}

fn check_coord(coord: Coord<f64>) -> Result<(), QueryError> {
    if !(coord.x.is_finite() && (-180.0..=180.0).contains(&coord.x)) {
        return Err(QueryError::InvalidCoordinate {
            axis: "longitude",
            value: coord.x,
        });
    }
    if !(coord.y.is_finite() && (-90.0..=90.0).contains(&coord.y)) {
        return Err(QueryError::InvalidCoordinate {
            axis: "latitude",
            value: coord.y,
        });
    }
    Ok(())
}

fn check_radius(radius_m: f64) -> Result<(), QueryError> {
    if radius_m.is_finite() && radius_m > 0.0 {
        Ok(())
    } else {
        Err(QueryError::InvalidRadius { radius_m })
    }
}
