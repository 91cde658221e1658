/// Property bag of a feature. Values are kept as raw JSON; only postal code keys are ever read.
pub type FeatureMap = geojson::JsonObject;

/// A polygonal feature. Polygons are stored as one-element multi-polygons so every stage of the
/// pipeline handles a single geometry type.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: geo::MultiPolygon,
    pub properties: Option<FeatureMap>,
}

impl Feature {
    pub fn property(&self, key: &str) -> Option<&geojson::JsonValue> {
        self.properties
            .as_ref()
            .and_then(|properties| properties.get(key))
    }
}

impl From<geo::MultiPolygon> for Feature {
    fn from(value: geo::MultiPolygon) -> Self {
        Self {
            geometry: value,
            properties: None,
        }
    }
}

impl From<geo::Polygon> for Feature {
    fn from(value: geo::Polygon) -> Self {
        Self::from(geo::MultiPolygon::new(vec![value]))
    }
}
