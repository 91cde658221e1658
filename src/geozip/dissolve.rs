use geo::{BooleanOps, CoordsIter};

use super::guard::run_guarded;
use crate::error::{Result, ZipMatchError};
use crate::geofile::feature::Feature;

/// Combined coverage area of several features.
#[derive(Debug, Clone, PartialEq)]
pub struct Dissolved {
    pub geometry: geo::MultiPolygon,
    /// Features left out because their union with the running result failed.
    pub skipped: usize,
}

/// Fold all features into one geometry by pairwise union, left to right, starting from the
/// first feature. A single feature is returned unchanged. When a union fails the running result
/// is kept as it was and the offending feature is skipped.
pub fn dissolve_features(features: &[Feature]) -> Option<Dissolved> {
    fold_unions(features, union_geometries)
}

pub fn union_geometries(
    accumulator: &geo::MultiPolygon,
    other: &geo::MultiPolygon,
) -> Result<geo::MultiPolygon> {
    let merged = run_guarded("union", || accumulator.union(other))?;
    if merged
        .coords_iter()
        .any(|coord| !coord.x.is_finite() || !coord.y.is_finite())
    {
        return Err(ZipMatchError::GeometryOperationFailure(
            "union produced non-finite coordinates".to_string(),
        ));
    }
    if merged.0.is_empty() && !(accumulator.0.is_empty() && other.0.is_empty()) {
        return Err(ZipMatchError::GeometryOperationFailure(
            "union of non-empty geometries came out empty".to_string(),
        ));
    }
    Ok(merged)
}

fn fold_unions<F>(features: &[Feature], union: F) -> Option<Dissolved>
where
    F: Fn(&geo::MultiPolygon, &geo::MultiPolygon) -> Result<geo::MultiPolygon>,
{
    let (first, rest) = features.split_first()?;
    let mut skipped = 0;
    let mut geometry = first.geometry.clone();
    for (index, feature) in rest.iter().enumerate() {
        match union(&geometry, &feature.geometry) {
            Ok(merged) => geometry = merged,
            Err(err) => {
                log::debug!("Leaving feature {} out of the union, {}", index + 1, err);
                skipped += 1;
            }
        }
    }
    Some(Dissolved { geometry, skipped })
}
