use super::bbox::WgsBoundingBox;
use super::dissolve::dissolve_features;
use super::matching::{match_candidates, PostalCodeKeys};
use crate::candidates::CandidateLoader;
use crate::error::{Result, ZipMatchError};
use crate::geofile::geojson::{normalize_shape_input, ShapeInput};

/// Result of resolving one input shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Matched postal codes, unique and in ascending order.
    pub zips: Vec<String>,
    /// Union of all input features, `None` for an empty input.
    pub coverage: Option<geo::MultiPolygon>,
    pub candidate_count: usize,
    pub skipped_unions: usize,
    pub skipped_candidates: usize,
}

/// Resolves user-drawn shapes to the postal codes whose boundaries they touch.
///
/// The pipeline is normalize, bound, load candidates, dissolve, match. Nothing is kept between
/// calls, so one resolver can serve any number of requests.
pub struct ZipResolver {
    loader: Box<dyn CandidateLoader>,
    postal_code_keys: PostalCodeKeys,
}

impl ZipResolver {
    pub fn new(loader: Box<dyn CandidateLoader>) -> Self {
        Self {
            loader,
            postal_code_keys: PostalCodeKeys::default(),
        }
    }

    pub fn with_postal_code_keys(mut self, postal_code_keys: PostalCodeKeys) -> Self {
        self.postal_code_keys = postal_code_keys;
        self
    }

    pub fn resolve(&self, input: ShapeInput) -> Result<Resolution> {
        let features = normalize_shape_input(input)?;
        if features.is_empty() {
            log::debug!("Input has no features, nothing to resolve");
            return Ok(Resolution::default());
        }

        let bbox = WgsBoundingBox::from_features(&features).ok_or_else(|| {
            ZipMatchError::InvalidGeometry("input has no coordinates".to_string())
        })?;
        log::info!("Resolving {} features within {:?}", features.len(), bbox);

        let candidates = self.loader.load_candidates(&bbox)?;
        log::info!("Loaded {} candidate boundaries", candidates.len());

        let dissolved = dissolve_features(&features).ok_or_else(|| {
            ZipMatchError::InvalidGeometry("input has no features".to_string())
        })?;
        let outcome = match_candidates(&dissolved.geometry, &candidates, &self.postal_code_keys);

        let failures = dissolved.skipped + outcome.skipped;
        if failures > 0 {
            log::warn!(
                "Skipped {} of {} input features in the union and {} of {} candidates",
                dissolved.skipped,
                features.len(),
                outcome.skipped,
                candidates.len()
            );
        }
        // Only failures that could have produced a match turn an empty result into an error.
        let relevant_failures = dissolved.skipped + outcome.skipped_near_coverage;
        if outcome.zips.is_empty() && relevant_failures > 0 {
            return Err(ZipMatchError::GeometryOperationFailure(format!(
                "no postal codes matched, {} geometry operations failed",
                relevant_failures
            )));
        }
        log::info!("Matched {} postal codes", outcome.zips.len());

        Ok(Resolution {
            zips: outcome.zips,
            coverage: Some(dissolved.geometry),
            candidate_count: candidates.len(),
            skipped_unions: dissolved.skipped,
            skipped_candidates: outcome.skipped,
        })
    }
}
