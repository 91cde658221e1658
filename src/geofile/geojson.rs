use std::{fs, io, path::Path, str::FromStr};

use anyhow::{anyhow, Context};
use geojson::{GeoJson, PolygonType, Position};

use super::feature::{Feature, FeatureMap};
use crate::error::{Result, ZipMatchError};

/// A closed linear ring needs at least three distinct positions plus the repeated first one.
const MIN_RING_POSITIONS: usize = 4;

/// Geometry-bearing payload accepted by the resolver.
#[derive(Debug, Clone)]
pub enum ShapeInput {
    SingleFeature(geojson::Feature),
    BareGeometry(geojson::Geometry),
    Collection(geojson::FeatureCollection),
}

impl From<GeoJson> for ShapeInput {
    fn from(value: GeoJson) -> Self {
        match value {
            GeoJson::Feature(feature) => ShapeInput::SingleFeature(feature),
            GeoJson::Geometry(geometry) => ShapeInput::BareGeometry(geometry),
            GeoJson::FeatureCollection(collection) => ShapeInput::Collection(collection),
        }
    }
}

impl ShapeInput {
    pub fn from_json_value(value: geojson::JsonValue) -> Result<Self> {
        GeoJson::from_json_value(value)
            .map(ShapeInput::from)
            .map_err(|err| ZipMatchError::InvalidGeometry(err.to_string()))
    }
}

/// Turn any accepted payload into a list of polygonal features.
///
/// A collection keeps its features and their order, a single feature or bare geometry becomes a
/// one-element list. Every ring of every feature is checked; the first problem found fails the
/// whole input with `InvalidGeometry`.
pub fn normalize_shape_input(input: ShapeInput) -> Result<Vec<Feature>> {
    match input {
        ShapeInput::SingleFeature(feature) => Ok(vec![feature_from_geojson(&feature)?]),
        ShapeInput::BareGeometry(geometry) => {
            Ok(vec![Feature::from(multipolygon_from_geojson(&geometry)?)])
        }
        ShapeInput::Collection(collection) => collection
            .features
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                feature_from_geojson(feature).map_err(|err| match err {
                    ZipMatchError::InvalidGeometry(msg) => {
                        ZipMatchError::InvalidGeometry(format!("feature {}: {}", index, msg))
                    }
                    other => other,
                })
            })
            .collect(),
    }
}

pub fn feature_from_geojson(feature: &geojson::Feature) -> Result<Feature> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| ZipMatchError::InvalidGeometry("feature has no geometry".to_string()))?;
    let properties: Option<FeatureMap> = feature.properties.clone();
    Ok(Feature {
        geometry: multipolygon_from_geojson(geometry)?,
        properties,
    })
}

pub fn multipolygon_from_geojson(geometry: &geojson::Geometry) -> Result<geo::MultiPolygon> {
    match &geometry.value {
        geojson::Value::Polygon(rings) => Ok(geo::MultiPolygon::new(vec![polygon_from_rings(
            rings,
        )?])),
        geojson::Value::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                return Err(ZipMatchError::InvalidGeometry(
                    "MultiPolygon has no polygons".to_string(),
                ));
            }
            polygons
                .iter()
                .map(polygon_from_rings)
                .collect::<Result<Vec<geo::Polygon>>>()
                .map(geo::MultiPolygon::new)
        }
        other => Err(ZipMatchError::InvalidGeometry(format!(
            "unsupported geometry type {}, expected Polygon or MultiPolygon",
            geometry_type_name(other)
        ))),
    }
}

fn polygon_from_rings(rings: &PolygonType) -> Result<geo::Polygon> {
    let (exterior, interiors) = rings
        .split_first()
        .ok_or_else(|| ZipMatchError::InvalidGeometry("polygon has no rings".to_string()))?;
    Ok(geo::Polygon::new(
        ring_from_positions(exterior)?,
        interiors
            .iter()
            .map(|ring| ring_from_positions(ring))
            .collect::<Result<Vec<geo::LineString>>>()?,
    ))
}

fn ring_from_positions(ring: &[Position]) -> Result<geo::LineString> {
    if ring.len() < MIN_RING_POSITIONS {
        return Err(ZipMatchError::InvalidGeometry(format!(
            "ring has {} positions, at least {} are required",
            ring.len(),
            MIN_RING_POSITIONS
        )));
    }
    let coords = ring
        .iter()
        .map(coord_from_position)
        .collect::<Result<Vec<geo::Coord>>>()?;
    if coords.first() != coords.last() {
        return Err(ZipMatchError::InvalidGeometry(
            "ring is not closed".to_string(),
        ));
    }
    Ok(geo::LineString::new(coords))
}

fn coord_from_position(position: &Position) -> Result<geo::Coord> {
    match position.as_slice() {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(geo::Coord { x: *x, y: *y }),
        [_, _, ..] => Err(ZipMatchError::InvalidGeometry(format!(
            "position {:?} has a non-finite coordinate",
            position
        ))),
        _ => Err(ZipMatchError::InvalidGeometry(format!(
            "position {:?} needs a longitude and a latitude",
            position
        ))),
    }
}

pub(crate) fn geometry_type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

pub fn read_geojson_file(filepath: &Path) -> anyhow::Result<GeoJson> {
    let contents = fs::read_to_string(filepath)
        .with_context(|| format!("Reading GeoJSON file {:?}", filepath))?;
    GeoJson::from_str(&contents)
        .map_err(|err| anyhow!("Could not parse GeoJSON file {:?}, {}", filepath, err))
}

/// Write the dissolved coverage area as a single feature carrying the matched ZIP codes.
pub fn write_coverage_to_geojson(
    coverage: &geo::MultiPolygon,
    zips: &[String],
    output_filepath: &Path,
) -> io::Result<()> {
    let mut properties = FeatureMap::new();
    properties.insert("zips".to_string(), geojson::JsonValue::from(zips.to_vec()));
    let feature = geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::from(coverage)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    };
    let feature_collection: geojson::FeatureCollection = std::iter::once(feature).collect();
    let geojson_contents: GeoJson = GeoJson::from(feature_collection);
    fs::write(output_filepath, geojson_contents.to_string())
}
