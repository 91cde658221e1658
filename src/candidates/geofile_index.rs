use std::path::Path;

use anyhow::anyhow;
use geojson::GeoJson;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};

use super::{CandidateBoundary, CandidateLoader};
use crate::error::Result;
use crate::geofile::geojson::read_geojson_file;
use crate::geozip::bbox::WgsBoundingBox;

/// A boundary together with the extent of its raw coordinates.
#[derive(Debug)]
pub struct CandidateBbox {
    candidate: CandidateBoundary,
    bbox: AABB<[f64; 2]>,
}

impl RTreeObject for CandidateBbox {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.bbox
    }
}

/// Postal boundaries held in memory behind an R-tree of their extents.
pub struct GeofileCandidateIndex {
    rtree: RTree<CandidateBbox>,
}

impl GeofileCandidateIndex {
    /// Index every polygonal feature of a GeoJSON FeatureCollection file.
    pub fn load_from_geofile(filepath: &Path) -> anyhow::Result<Self> {
        log::info!("Reading postal boundaries from {:?}", filepath);
        match read_geojson_file(filepath)? {
            GeoJson::FeatureCollection(feature_collection) => {
                Ok(Self::from_features(feature_collection.features))
            }
            _ => Err(anyhow!(
                "Expected a FeatureCollection of postal boundaries in {:?}",
                filepath
            )),
        }
    }

    /// Features without a polygonal geometry have no extent and are left out.
    pub fn from_features(features: Vec<CandidateBoundary>) -> Self {
        let num_features = features.len();
        let bar = ProgressBar::new(num_features as u64);
        let indexed: Vec<CandidateBbox> = features
            .into_par_iter()
            .progress_with(bar)
            .filter_map(|candidate| {
                let bbox = candidate
                    .geometry
                    .as_ref()
                    .and_then(WgsBoundingBox::from_geojson_geometry)?;
                Some(CandidateBbox {
                    candidate,
                    bbox: bbox.envelope(),
                })
            })
            .collect();
        if indexed.len() != num_features {
            log::warn!(
                "Out of {} features read, only {} were polygonal boundaries.",
                num_features,
                indexed.len()
            )
        }
        log::info!("Indexed {} postal boundaries", indexed.len());
        Self {
            rtree: RTree::bulk_load(indexed),
        }
    }

    pub fn size(&self) -> usize {
        self.rtree.size()
    }
}

impl CandidateLoader for GeofileCandidateIndex {
    fn load_candidates(&self, bbox: &WgsBoundingBox) -> Result<Vec<CandidateBoundary>> {
        Ok(self
            .rtree
            .locate_in_envelope_intersecting(&bbox.envelope())
            .map(|candidate_bbox| candidate_bbox.candidate.clone())
            .collect())
    }
}
