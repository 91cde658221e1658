pub mod geofile_index;
pub mod remote;

use crate::error::Result;
use crate::geozip::bbox::WgsBoundingBox;

/// A postal boundary as delivered by a dataset. Its geometry is validated only when it is
/// matched, so one broken record cannot fail a whole query.
pub type CandidateBoundary = geojson::Feature;

/// Source of postal boundary polygons.
///
/// Implementations return every boundary whose extent overlaps `bbox`. Extra boundaries are
/// fine, they are filtered by the exact intersection test; missing ones are lost matches.
/// Failures are reported as `ZipMatchError::CandidateSourceUnavailable`.
pub trait CandidateLoader {
    fn load_candidates(&self, bbox: &WgsBoundingBox) -> Result<Vec<CandidateBoundary>>;
}

impl<F> CandidateLoader for F
where
    F: Fn(&WgsBoundingBox) -> Result<Vec<CandidateBoundary>>,
{
    fn load_candidates(&self, bbox: &WgsBoundingBox) -> Result<Vec<CandidateBoundary>> {
        self(bbox)
    }
}
