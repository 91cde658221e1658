use geo::CoordsIter;
use rstar::AABB;

use crate::geofile::feature::Feature;

/// Axis-aligned box in WGS84 degrees. Longitudes are not wrapped, a shape crossing the
/// antimeridian gets a box spanning the whole width between its extreme longitudes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WgsBoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl WgsBoundingBox {
    /// Smallest box holding every coordinate of every ring of every feature, or `None` when
    /// there are no coordinates at all.
    pub fn from_features(features: &[Feature]) -> Option<Self> {
        Self::from_coords(
            features
                .iter()
                .flat_map(|feature| feature.geometry.coords_iter()),
        )
    }

    pub fn from_geometry(geometry: &geo::MultiPolygon) -> Option<Self> {
        Self::from_coords(geometry.coords_iter())
    }

    /// Same as `from_features` for a raw GeoJSON geometry, without validating its rings.
    /// Only polygonal geometries are considered.
    pub fn from_geojson_geometry(geometry: &geojson::Geometry) -> Option<Self> {
        let rings: Vec<&Vec<geojson::Position>> = match &geometry.value {
            geojson::Value::Polygon(rings) => rings.iter().collect(),
            geojson::Value::MultiPolygon(polygons) => polygons.iter().flatten().collect(),
            _ => return None,
        };
        Self::from_coords(
            rings
                .into_iter()
                .flatten()
                .filter(|position| position.len() >= 2)
                .map(|position| geo::Coord {
                    x: position[0],
                    y: position[1],
                })
                .filter(|coord| coord.x.is_finite() && coord.y.is_finite()),
        )
    }

    fn from_coords(coords: impl Iterator<Item = geo::Coord>) -> Option<Self> {
        coords.fold(None, |bbox: Option<Self>, coord| {
            Some(match bbox {
                None => Self {
                    min_lon: coord.x,
                    min_lat: coord.y,
                    max_lon: coord.x,
                    max_lat: coord.y,
                },
                Some(bbox) => Self {
                    min_lon: bbox.min_lon.min(coord.x),
                    min_lat: bbox.min_lat.min(coord.y),
                    max_lon: bbox.max_lon.max(coord.x),
                    max_lat: bbox.max_lat.max(coord.y),
                },
            })
        })
    }

    pub fn contains_coord(&self, coord: &geo::Coord) -> bool {
        self.min_lon <= coord.x
            && coord.x <= self.max_lon
            && self.min_lat <= coord.y
            && coord.y <= self.max_lat
    }

    /// Overlap test, boxes sharing only an edge or a corner count as intersecting.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    pub fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_lon, self.min_lat], [self.max_lon, self.max_lat])
    }
}
